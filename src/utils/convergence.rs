//! Convergence tracking & tolerance checks for iterative solvers.

use num_traits::Float;

/// Stopping criteria & stats.
///
/// A solve has converged once the residual norm drops below `abs_tol` or below
/// `rel_tol` times the initial residual norm; it stops at the latest after `max_iters`.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    pub abs_tol: T,
    pub rel_tol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
}

impl<T: Float> Convergence<T> {
    /// Same tolerance for the absolute and the relative criterion.
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            abs_tol: tol,
            rel_tol: tol,
            max_iters,
        }
    }

    /// Whether `res_norm` meets either tolerance.
    pub fn is_converged(&self, res_norm: T, res0_norm: T) -> bool {
        res_norm <= self.abs_tol || res_norm <= self.rel_tol * res0_norm
    }

    /// Returns (should_stop, stats) given current `res_norm` and iteration `i`.
    ///
    /// Hitting the iteration cap stops the solve but does not mark it converged.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> (bool, SolveStats<T>) {
        let converged = self.is_converged(res_norm, res0_norm);
        (
            converged || i >= self.max_iters,
            SolveStats {
                iterations: i,
                final_residual: res_norm,
                converged,
            },
        )
    }
}
