//! Direct dense solver using Faer's partial-pivoting LU factorization.
//!
//! Patch matrices of the Vanka smoother and the coarsest multigrid level are small and
//! dense. They are factored once and then solved many times through [`LuSolver::solve_cached`].
//! The factorization is always carried out in `f64`; single-precision levels convert the
//! matrix on factoring and the right-hand side on every solve.
//!
//! # References
//! - Faer documentation: https://github.com/sarah-ek/faer-rs
//! - Golub & Van Loan, Matrix Computations

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::solver::LinearSolver;
use crate::utils::convergence::SolveStats;
use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};
use std::marker::PhantomData;

/// LU solver using row pivoting from Faer.
///
/// Stores the LU factorization for reuse.
pub struct LuSolver<T> {
    factor: Option<PartialPivLu<f64>>,
    dim: usize,
    _scalar: PhantomData<T>,
}

impl<T: Scalar> LuSolver<T> {
    /// Create a new LU solver (no factorization yet).
    pub fn new() -> Self {
        LuSolver {
            factor: None,
            dim: 0,
            _scalar: PhantomData,
        }
    }

    /// Factor a matrix given in `f64` and keep the factorization.
    ///
    /// Fails with [`KError::FactorError`] if the matrix is not square or is numerically singular.
    pub fn factor_f64(&mut self, a: &Mat<f64>) -> Result<(), KError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(KError::FactorError(format!(
                "matrix is {}x{}, expected square",
                n,
                a.ncols()
            )));
        }
        let factor = PartialPivLu::new(a.as_ref());
        // An exactly singular pivot shows up as a non-finite solution.
        let mut probe = vec![1.0; n];
        let probe_mat = MatMut::from_column_major_slice_mut(&mut probe, n, 1);
        factor.solve_in_place_with_conj(Conj::No, probe_mat);
        if probe.iter().any(|v| !v.is_finite()) {
            self.factor = None;
            return Err(KError::FactorError(format!("singular {n}x{n} matrix")));
        }
        self.factor = Some(factor);
        self.dim = n;
        Ok(())
    }

    /// Factor `a` (converted to `f64`).
    pub fn factor(&mut self, a: &Mat<T>) -> Result<(), KError> {
        let a64 = Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)].as_f64());
        self.factor_f64(&a64)
    }

    pub fn is_factored(&self) -> bool {
        self.factor.is_some()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Solve using the cached LU factorization.
    pub fn solve_cached(&self, b: &[T], x: &mut [T]) -> Result<(), KError> {
        let factor = self
            .factor
            .as_ref()
            .ok_or_else(|| KError::FactorError("solve_cached called before factorization".into()))?;
        if b.len() != self.dim || x.len() != self.dim {
            return Err(KError::mismatch("LU right-hand side", self.dim, b.len()));
        }
        let mut work: Vec<f64> = b.iter().map(|v| v.as_f64()).collect();
        let n = work.len();
        let x_mat = MatMut::from_column_major_slice_mut(&mut work, n, 1);
        factor.solve_in_place_with_conj(Conj::No, x_mat);
        for (xi, wi) in x.iter_mut().zip(work) {
            *xi = T::cast_from(wi);
        }
        Ok(())
    }
}

impl<T: Scalar> LinearSolver<Mat<T>, Vec<T>> for LuSolver<T> {
    type Error = KError;
    type Scalar = T;

    /// Factor `a` and solve `a x = b`; always reports one converged iteration.
    fn solve(&mut self, a: &Mat<T>, b: &Vec<T>, x: &mut Vec<T>) -> Result<SolveStats<T>, KError> {
        self.factor(a)?;
        self.solve_cached(b, x)?;
        Ok(SolveStats {
            iterations: 1,
            final_residual: T::zero(),
            converged: true,
        })
    }
}

impl<T: Scalar> Default for LuSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}
