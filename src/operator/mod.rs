//! Spatial operators and their space-time tensor-product composition.
//!
//! [`SpatialOperator`] is the seam between the time coupling and the spatial discretization:
//! the block operator, the smoothers and the multigrid hierarchy only see this trait, so a
//! level may hold a matrix-free operator or an assembled [`CsrMatrix`].

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::matrix::{CsrMatrix, SparseMatrix};

pub mod coefficient;
pub mod matrix_free;
pub mod system;

pub use coefficient::Coefficient;
pub use matrix_free::{EvaluationFlags, MatrixFreeOperator};
pub use system::BlockSystemOperator;

/// A linear operator on one spatial field.
pub trait SpatialOperator<T: Scalar>: Send + Sync {
    fn n_dofs(&self) -> usize;

    /// `dst = A src`.
    fn apply(&self, dst: &mut [T], src: &[T]);

    /// `dst += A src`.
    fn apply_add(&self, dst: &mut [T], src: &[T]) {
        let mut tmp = vec![T::zero(); dst.len()];
        self.apply(&mut tmp, src);
        for (d, t) in dst.iter_mut().zip(tmp) {
            *d = *d + t;
        }
    }

    fn diagonal(&self) -> Vec<T>;

    /// Reciprocal diagonal, `1` where `|d| ≤ sqrt(eps)`.
    fn diagonal_inverse(&self) -> Vec<T> {
        clamped_inverse(&self.diagonal())
    }

    /// The same bilinear form as an explicit sparse matrix.
    fn assemble_sparse(&self) -> Result<CsrMatrix<T>, KError>;

    /// Single entry access.
    fn el(&self, _i: usize, _j: usize) -> Result<T, KError> {
        Err(KError::Unsupported("entry access on a matrix-free operator"))
    }

    fn initialize_dof_vector(&self) -> Vec<T> {
        vec![T::zero(); self.n_dofs()]
    }
}

/// Entry-wise reciprocal with near-zero entries replaced by `1`.
pub fn clamped_inverse<T: Scalar>(d: &[T]) -> Vec<T> {
    let tol = T::sqrt_epsilon();
    d.iter()
        .map(|&v| if v.abs() > tol { T::one() / v } else { T::one() })
        .collect()
}

impl<T: Scalar> SpatialOperator<T> for CsrMatrix<T> {
    fn n_dofs(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, dst: &mut [T], src: &[T]) {
        self.spmv(src, dst);
    }

    fn diagonal(&self) -> Vec<T> {
        CsrMatrix::diagonal(self)
    }

    fn assemble_sparse(&self) -> Result<CsrMatrix<T>, KError> {
        Ok(self.clone())
    }

    fn el(&self, i: usize, j: usize) -> Result<T, KError> {
        Ok(self.get(i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparsityPattern;

    #[test]
    fn clamp_replaces_tiny_entries() {
        let d = [2.0f64, 1e-9, -4.0, 0.0];
        let inv = clamped_inverse(&d);
        assert_eq!(inv, vec![0.5, 1.0, -0.25, 1.0]);
        let f = [1e-4f32, 1e-2];
        let inv = clamped_inverse(&f);
        assert_eq!(inv[0], 1.0);
        assert!((inv[1] - 100.0).abs() < 1e-3);
    }

    #[test]
    fn assembled_matrix_supports_entry_access() {
        let mut a = CsrMatrix::zeros(SparsityPattern::from_rows(2, vec![vec![0, 1], vec![1]]));
        a.add(0, 1, 3.0).unwrap();
        a.add(1, 1, 2.0).unwrap();
        let op: &dyn SpatialOperator<f64> = &a;
        assert_eq!(op.el(0, 1).unwrap(), 3.0);
        assert_eq!(op.diagonal(), vec![0.0, 2.0]);
        assert_eq!(op.diagonal_inverse(), vec![1.0, 0.5]);
        let mut y = vec![1.0; 2];
        op.apply_add(&mut y, &[1.0, 1.0]);
        assert_eq!(y, vec![4.0, 3.0]);
    }
}
