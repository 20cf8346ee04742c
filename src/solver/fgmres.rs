#![allow(clippy::needless_range_loop)]
//! Flexible GMRES (FGMRES) solver (Saad §9.4)
//!
//! Right-preconditioned GMRES in which the preconditioned directions `z_j = M_j⁻¹ v_j` are
//! stored explicitly, so the preconditioner may change between iterations. The space-time
//! multigrid preconditioner is applied in a different precision than the outer iteration,
//! which makes it slightly nonlinear; FGMRES tolerates that.
//!
//! # Features
//! - Classical or modified Gram-Schmidt orthogonalization.
//! - Restart, residual monitor and residual history.
//! - Happy breakdown detection.
//! - Works on any vector type exposing its entries as a slice, e.g. [`BlockVector`](crate::core::BlockVector).
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §9.4
//! - https://en.wikipedia.org/wiki/Generalized_minimal_residual_method

use crate::core::scalar::Scalar;
use crate::core::traits::{InnerProduct, MatVec};
use crate::error::KError;
use crate::preconditioner::FlexiblePreconditioner;
use crate::utils::convergence::{Convergence, SolveStats};

/// Orthogonalization method for Arnoldi process in FGMRES.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orthog {
    Classical,
    Modified,
}

/// Flexible GMRES solver struct.
///
/// # Type Parameters
/// * `T` - Scalar type (e.g., f32, f64)
pub struct FgmresSolver<T> {
    /// Convergence criteria (tolerances and max iterations)
    pub conv: Convergence<T>,
    /// Restart parameter (number of Arnoldi vectors before restart)
    pub restart: usize,
    /// Orthogonalization method (classical or modified Gram-Schmidt)
    pub orthog: Orthog,
    /// Happy breakdown tolerance
    pub haptol: T,
    /// Optional callback to monitor residuals during solve
    pub monitor: Option<Box<dyn FnMut(usize, T) + Send>>,
    /// History of residual norms, starting with the initial residual
    pub residual_history: Vec<T>,
}

fn zeroed<T: Scalar, V: Clone + AsMut<[T]>>(like: &V) -> V {
    let mut z = like.clone();
    z.as_mut().iter_mut().for_each(|v| *v = T::zero());
    z
}

impl<T: Scalar> FgmresSolver<T> {
    /// Create a new FGMRES solver with given tolerance, max iterations, and restart.
    pub fn new(tol: T, max_iters: usize, restart: usize) -> Self {
        Self {
            conv: Convergence::new(tol, max_iters),
            restart: restart.max(1),
            orthog: Orthog::Classical,
            haptol: T::cast_from(1e-30),
            monitor: None,
            residual_history: Vec::new(),
        }
    }
    /// Set the orthogonalization method.
    pub fn with_orthog(mut self, orthog: Orthog) -> Self {
        self.orthog = orthog;
        self
    }
    /// Use different absolute and relative tolerances.
    pub fn with_tolerances(mut self, abs_tol: T, rel_tol: T) -> Self {
        self.conv.abs_tol = abs_tol;
        self.conv.rel_tol = rel_tol;
        self
    }
    /// Set the happy breakdown tolerance.
    pub fn with_haptol(mut self, haptol: T) -> Self {
        self.haptol = haptol;
        self
    }
    /// Set a callback to monitor residuals during the solve.
    pub fn with_monitor<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, T) + Send + 'static,
    {
        self.monitor = Some(Box::new(f));
        self
    }
    /// Clear the residual history.
    pub fn clear_history(&mut self) {
        self.residual_history.clear();
    }

    fn residual<M, V>(a: &M, b: &V, x: &V, r: &mut V)
    where
        M: MatVec<V>,
        V: Clone + AsRef<[T]> + AsMut<[T]>,
    {
        a.matvec(x, r);
        for (ri, &bi) in r.as_mut().iter_mut().zip(b.as_ref()) {
            *ri = bi - *ri;
        }
    }

    /// Flexible GMRES solve (Saad §9.4)
    ///
    /// # Arguments
    /// * `a` - Operator implementing `MatVec`
    /// * `pc` - Optional flexible preconditioner (can change per iteration)
    /// * `b` - Right-hand side vector
    /// * `x` - On input: initial guess; on output: solution vector
    ///
    /// # Returns
    /// * `Ok(SolveStats)` once converged or after `max_iters`; `converged` tells which
    /// * `Err(KError)` if the preconditioner fails
    pub fn solve_flex<M, V>(
        &mut self,
        a: &M,
        mut pc: Option<&mut dyn FlexiblePreconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<T>, KError>
    where
        M: MatVec<V>,
        (): InnerProduct<V, Scalar = T>,
        V: Clone + AsRef<[T]> + AsMut<[T]>,
    {
        let ip = ();
        let restart = self.restart;
        let max_iters = self.conv.max_iters;

        let mut r = zeroed(b);
        Self::residual(a, b, x, &mut r);
        let mut beta = ip.norm(&r);
        let res0 = beta;
        self.residual_history.push(beta);
        let mut total_iters = 0;

        loop {
            if beta == T::zero() || self.conv.is_converged(beta, res0) {
                return Ok(SolveStats {
                    iterations: total_iters,
                    final_residual: beta,
                    converged: true,
                });
            }
            if total_iters >= max_iters {
                return Ok(SolveStats {
                    iterations: total_iters,
                    final_residual: beta,
                    converged: false,
                });
            }
            let m = restart.min(max_iters - total_iters);
            let mut v_basis: Vec<V> = Vec::with_capacity(m + 1);
            let mut z_basis: Vec<V> = Vec::with_capacity(m);
            let mut h = vec![vec![T::zero(); m]; m + 1];
            let mut cs = vec![T::zero(); m];
            let mut sn = vec![T::zero(); m];
            let mut s = vec![T::zero(); m + 1];
            s[0] = beta;
            let mut v0 = r.clone();
            v0.as_mut().iter_mut().for_each(|v| *v = *v / beta);
            v_basis.push(v0);

            let mut arnoldi_steps = 0;
            for j in 0..m {
                // (a) z_j = M_j⁻¹ v_j
                let mut z = v_basis[j].clone();
                if let Some(pc) = pc.as_mut() {
                    pc.apply(&v_basis[j], &mut z)?;
                }
                // (b) w = A z_j
                let mut w = zeroed(b);
                a.matvec(&z, &mut w);
                z_basis.push(z);
                // (c) Arnoldi orthonormalization
                match self.orthog {
                    Orthog::Classical => {
                        for i in 0..=j {
                            h[i][j] = ip.dot(&w, &v_basis[i]);
                        }
                        for i in 0..=j {
                            let hij = h[i][j];
                            for (wi, &vi) in w.as_mut().iter_mut().zip(v_basis[i].as_ref()) {
                                *wi = *wi - hij * vi;
                            }
                        }
                    }
                    Orthog::Modified => {
                        for i in 0..=j {
                            let hij = ip.dot(&w, &v_basis[i]);
                            h[i][j] = hij;
                            for (wi, &vi) in w.as_mut().iter_mut().zip(v_basis[i].as_ref()) {
                                *wi = *wi - hij * vi;
                            }
                        }
                    }
                }
                let w_norm = ip.norm(&w);
                h[j + 1][j] = w_norm;
                let happy_breakdown = w_norm <= self.haptol * s[j].abs();
                if !happy_breakdown {
                    w.as_mut().iter_mut().for_each(|v| *v = *v / w_norm);
                }
                v_basis.push(w);
                // (d) Apply previous Givens rotations
                for i in 0..j {
                    let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
                    h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
                    h[i][j] = temp;
                }
                // (e) Compute new Givens rotation
                let (c, s_) = {
                    let h1 = h[j][j];
                    let h2 = h[j + 1][j];
                    let denom = (h1 * h1 + h2 * h2).sqrt();
                    if denom == T::zero() {
                        (T::one(), T::zero())
                    } else {
                        (h1 / denom, h2 / denom)
                    }
                };
                cs[j] = c;
                sn[j] = s_;
                let temp = c * s[j] + s_ * s[j + 1];
                s[j + 1] = -s_ * s[j] + c * s[j + 1];
                s[j] = temp;
                h[j][j] = c * h[j][j] + s_ * h[j + 1][j];
                h[j + 1][j] = T::zero();
                let res_norm = s[j + 1].abs();
                total_iters += 1;
                arnoldi_steps = j + 1;
                if let Some(monitor) = self.monitor.as_mut() {
                    monitor(total_iters, res_norm);
                }
                self.residual_history.push(res_norm);
                let (stop, _) = self.conv.check(res_norm, res0, total_iters);
                if stop || happy_breakdown {
                    break;
                }
            }
            // Back-substitute H y = s and update x = x + Z y
            let k = arnoldi_steps;
            let mut y = vec![T::zero(); k];
            for i in (0..k).rev() {
                let mut sum = s[i];
                for l in (i + 1)..k {
                    sum = sum - h[i][l] * y[l];
                }
                y[i] = if h[i][i] == T::zero() {
                    T::zero()
                } else {
                    sum / h[i][i]
                };
            }
            for (yi, zi) in y.iter().zip(&z_basis) {
                for (xv, &zv) in x.as_mut().iter_mut().zip(zi.as_ref()) {
                    *xv = *xv + *yi * zv;
                }
            }
            // True residual decides convergence and seeds the restart.
            Self::residual(a, b, x, &mut r);
            beta = ip.norm(&r);
        }
    }
}
