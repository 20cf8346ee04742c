//! Floating-point scalar abstraction shared by every component.
//!
//! The solver runs in one precision (`f64`) and the multigrid preconditioner may run in
//! another (`f32`). Every operator, smoother and hierarchy is generic over [`Scalar`] and
//! the only conversions happen explicitly at the preconditioner boundary.

use num_traits::{Float, FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Real scalar usable as vector entry type.
pub trait Scalar:
    Float + FromPrimitive + ToPrimitive + Default + Debug + Display + Sum + Send + Sync + 'static
{
    /// Rounding conversion from `f64`.
    fn cast_from(v: f64) -> Self;
    /// Widening (or identity) conversion to `f64`.
    fn as_f64(self) -> f64;
    /// `sqrt(machine epsilon)` of this precision; diagonal entries below it are clamped.
    fn sqrt_epsilon() -> Self {
        Self::epsilon().sqrt()
    }
    /// Conversion between two scalar precisions.
    fn convert<U: Scalar>(self) -> U {
        U::cast_from(self.as_f64())
    }
}

impl Scalar for f64 {
    #[inline]
    fn cast_from(v: f64) -> Self {
        v
    }
    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    #[inline]
    fn cast_from(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}
