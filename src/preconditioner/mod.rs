//! Preconditioners for the space-time systems.
//!
//! This module defines the [`Preconditioner`] trait together with the level smoothers used by
//! the multigrid hierarchy: a damped block Jacobi and a Vanka-type patch smoother.

use crate::error::KError;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError>;
    /// Optionally: setup/factorize from A
    fn setup(&mut self, _a: &M) -> Result<(), KError> {
        Ok(())
    }
}

/// A preconditioner whose action M⁻¹ may change at every iteration.
pub trait FlexiblePreconditioner<M, V> {
    /// Given the current residual `r`, produce `z ≈ Mₖ⁻¹ r`.
    fn apply(&mut self, r: &V, z: &mut V) -> Result<(), KError>;
}

/// Adapter presenting a fixed [`Preconditioner`] to a flexible Krylov method.
pub struct FixedPreconditioner<'a, P: ?Sized> {
    inner: &'a P,
}

impl<'a, P: ?Sized> FixedPreconditioner<'a, P> {
    pub fn new(inner: &'a P) -> Self {
        Self { inner }
    }
}

impl<M, V, P> FlexiblePreconditioner<M, V> for FixedPreconditioner<'_, P>
where
    P: Preconditioner<M, V> + ?Sized,
{
    fn apply(&mut self, r: &V, z: &mut V) -> Result<(), KError> {
        self.inner.apply(r, z)
    }
}

pub mod jacobi;
pub mod vanka;

pub use jacobi::BlockJacobi;
pub use vanka::{PatchType, PreconditionVanka};
