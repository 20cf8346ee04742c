// Damped block Jacobi smoother for the space-time operator

use crate::core::block_vector::BlockVector;
use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::operator::BlockSystemOperator;
use crate::preconditioner::Preconditioner;

/// M⁻¹ = ω D⁻¹ with D the block diagonal of `Alpha ⊗ K + Beta ⊗ M`.
pub struct BlockJacobi<T> {
    pub(crate) inv_diag: Vec<T>,
    damping: T,
}

impl<T: Scalar> BlockJacobi<T> {
    /// new with empty state; user must call `setup`.
    pub fn new(damping: T) -> Self {
        Self {
            inv_diag: Vec::new(),
            damping,
        }
    }
}

impl<T: Scalar> Default for BlockJacobi<T> {
    fn default() -> Self {
        Self::new(T::one())
    }
}

impl<T: Scalar> Preconditioner<BlockSystemOperator<T>, BlockVector<T>> for BlockJacobi<T> {
    fn setup(&mut self, a: &BlockSystemOperator<T>) -> Result<(), KError> {
        if a.n_rows() != a.n_cols() {
            return Err(KError::mismatch("square block operator", a.n_rows(), a.n_cols()));
        }
        let d = a.diagonal_inverse();
        self.inv_diag = d.as_ref().iter().map(|&v| self.damping * v).collect();
        Ok(())
    }

    fn apply(&self, x: &BlockVector<T>, y: &mut BlockVector<T>) -> Result<(), KError> {
        if x.len() != self.inv_diag.len() {
            return Err(KError::mismatch("jacobi vector", self.inv_diag.len(), x.len()));
        }
        for ((yi, &xi), &d) in y.as_mut().iter_mut().zip(x.as_ref()).zip(&self.inv_diag) {
            *yi = d * xi;
        }
        Ok(())
    }
}
