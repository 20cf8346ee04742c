//! Dense time-coupling matrices of a Galerkin-in-time discretization.
//!
//! For a slab of `n` steps with `m` unknown blocks per step the system reads
//! `(Alpha ⊗ K + Beta ⊗ M) U = rhs`, where `Gamma` and `Zeta` (one column each) couple the
//! known value at the start of the slab. Inside a slab, step `s` is coupled to the last
//! unknown of step `s-1` through the same single-step columns, negated.

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::quadrature::Quadrature;
use crate::matrix::dense;
use crate::time::basis::{TimeBasis, TimeStepType};
use faer::Mat;

/// `Alpha`, `Beta` (square) and `Gamma`, `Zeta` (one column) of a time slab.
#[derive(Clone, Debug)]
pub struct TimeWeights<T> {
    pub alpha: Mat<T>,
    pub beta: Mat<T>,
    pub gamma: Mat<T>,
    pub zeta: Mat<T>,
}

impl<T: Scalar> TimeWeights<T> {
    pub fn n_time_dofs(&self) -> usize {
        self.alpha.nrows()
    }

    pub fn convert<U: Scalar>(&self) -> TimeWeights<U> {
        TimeWeights {
            alpha: dense::convert(&self.alpha),
            beta: dense::convert(&self.beta),
            gamma: dense::convert(&self.gamma),
            zeta: dense::convert(&self.zeta),
        }
    }
}

impl TimeWeights<f64> {
    /// Weights for `n_steps` steps of size `tau` solved at once.
    ///
    /// Fails with [`KError::InvalidDegree`] below the scheme's minimum degree and with
    /// [`KError::InvalidParameter`] for a non-positive step or an empty slab.
    pub fn new(kind: TimeStepType, degree: usize, tau: f64, n_steps: usize) -> Result<Self, KError> {
        if tau <= 0.0 || !tau.is_finite() {
            return Err(KError::InvalidParameter(format!(
                "time step size must be positive, got {tau}"
            )));
        }
        if n_steps == 0 {
            return Err(KError::InvalidParameter(
                "number of time steps at once must be at least 1".into(),
            ));
        }
        let basis = TimeBasis::new(kind, degree)?;
        let single = single_step(&basis, tau);
        if n_steps == 1 {
            return Ok(single);
        }
        let m = basis.dofs_per_step();
        let n = m * n_steps;
        let mut alpha = dense::zeros::<f64>(n, n);
        let mut beta = dense::zeros::<f64>(n, n);
        let mut gamma = dense::zeros::<f64>(n, 1);
        let mut zeta = dense::zeros::<f64>(n, 1);
        for s in 0..n_steps {
            let off = s * m;
            for i in 0..m {
                for j in 0..m {
                    alpha[(off + i, off + j)] = single.alpha[(i, j)];
                    beta[(off + i, off + j)] = single.beta[(i, j)];
                }
                if s == 0 {
                    gamma[(i, 0)] = single.gamma[(i, 0)];
                    zeta[(i, 0)] = single.zeta[(i, 0)];
                    continue;
                }
                let prev = off - 1;
                match kind {
                    TimeStepType::Dg => beta[(off + i, prev)] = -single.gamma[(i, 0)],
                    TimeStepType::Cgp => {
                        alpha[(off + i, prev)] = -single.gamma[(i, 0)];
                        beta[(off + i, prev)] = -single.zeta[(i, 0)];
                    }
                }
            }
        }
        Ok(Self {
            alpha,
            beta,
            gamma,
            zeta,
        })
    }
}

fn single_step(basis: &TimeBasis, tau: f64) -> TimeWeights<f64> {
    let m = basis.dofs_per_step();
    let quad = Quadrature::gauss(basis.degree() + 2);
    let trial = basis.trial();
    let test = basis.test();
    let integrate = |f: &dyn Fn(f64) -> f64| -> f64 {
        quad.points
            .iter()
            .zip(&quad.weights)
            .map(|(&t, &w)| w * f(t))
            .sum()
    };
    let alpha = Mat::from_fn(m, m, |i, j| {
        let tj = basis.trial_index(j);
        tau * integrate(&|t| trial.value(tj, t) * test.value(i, t))
    });
    let beta = Mat::from_fn(m, m, |i, j| {
        let tj = basis.trial_index(j);
        let mut b = integrate(&|t| trial.derivative(tj, t) * test.value(i, t));
        if !basis.kind().is_cgp() {
            b += trial.value(tj, 0.0) * test.value(i, 0.0);
        }
        b
    });
    let (gamma, zeta) = match basis.kind() {
        TimeStepType::Dg => (
            Mat::from_fn(m, 1, |i, _| test.value(i, 0.0)),
            dense::zeros::<f64>(m, 1),
        ),
        TimeStepType::Cgp => (
            Mat::from_fn(m, 1, |i, _| {
                -tau * integrate(&|t| trial.value(0, t) * test.value(i, t))
            }),
            Mat::from_fn(m, 1, |i, _| {
                -integrate(&|t| trial.derivative(0, t) * test.value(i, t))
            }),
        ),
    };
    TimeWeights {
        alpha,
        beta,
        gamma,
        zeta,
    }
}

/// The five wave-equation matrices after eliminating the velocity, plus the matrices that
/// recover it: `V = v_from_u·U + v_from_u0·u0 + v_from_v0·v0` (spatial identity).
#[derive(Clone, Debug)]
pub struct WaveWeights<T> {
    pub lhs_k: Mat<T>,
    pub lhs_m: Mat<T>,
    pub rhs_uk: Mat<T>,
    pub rhs_um: Mat<T>,
    pub rhs_vm: Mat<T>,
    pub v_from_u: Mat<T>,
    pub v_from_u0: Mat<T>,
    pub v_from_v0: Mat<T>,
}

impl<T: Scalar> WaveWeights<T> {
    pub fn convert<U: Scalar>(&self) -> WaveWeights<U> {
        WaveWeights {
            lhs_k: dense::convert(&self.lhs_k),
            lhs_m: dense::convert(&self.lhs_m),
            rhs_uk: dense::convert(&self.rhs_uk),
            rhs_um: dense::convert(&self.rhs_um),
            rhs_vm: dense::convert(&self.rhs_vm),
            v_from_u: dense::convert(&self.v_from_u),
            v_from_u0: dense::convert(&self.v_from_u0),
            v_from_v0: dense::convert(&self.v_from_v0),
        }
    }
}

impl WaveWeights<f64> {
    /// Eliminate `V = T⁻¹(D U − r)` with `T = Alpha`, `D = Beta`.
    pub fn new(kind: TimeStepType, w: &TimeWeights<f64>) -> Result<Self, KError> {
        let t_inv = dense::invert(&w.alpha)?;
        let d = &w.beta;
        let t_inv_d = &t_inv * d;
        let d_t_inv = d * &t_inv;
        let lhs_m = &d_t_inv * d;
        let n = w.n_time_dofs();
        Ok(match kind {
            TimeStepType::Cgp => Self {
                lhs_k: w.alpha.clone(),
                lhs_m,
                rhs_uk: w.gamma.clone(),
                rhs_um: &d_t_inv * &w.zeta,
                rhs_vm: dense::add_scaled(&w.zeta, -1.0, &(&d_t_inv * &w.gamma)),
                v_from_u: t_inv_d,
                v_from_u0: dense::scale(&(&t_inv * &w.zeta), -1.0),
                v_from_v0: &t_inv * &w.gamma,
            },
            TimeStepType::Dg => Self {
                lhs_k: w.alpha.clone(),
                lhs_m,
                rhs_uk: dense::zeros(n, 1),
                rhs_um: &d_t_inv * &w.gamma,
                rhs_vm: w.gamma.clone(),
                v_from_u: t_inv_d,
                v_from_u0: dense::scale(&(&t_inv * &w.gamma), -1.0),
                v_from_v0: dense::zeros(n, 1),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn dg0_is_implicit_euler() {
        let w = TimeWeights::new(TimeStepType::Dg, 0, 0.1, 1).unwrap();
        assert_abs_diff_eq!(w.alpha[(0, 0)], 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(w.beta[(0, 0)], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(w.gamma[(0, 0)], 1.0, epsilon = 1e-14);
        assert_eq!(w.zeta[(0, 0)], 0.0);
    }

    #[test]
    fn cg1_is_crank_nicolson() {
        let w = TimeWeights::new(TimeStepType::Cgp, 1, 0.2, 1).unwrap();
        assert_abs_diff_eq!(w.alpha[(0, 0)], 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(w.beta[(0, 0)], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(w.gamma[(0, 0)], -0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(w.zeta[(0, 0)], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn batch_couples_previous_step_end() {
        let w = TimeWeights::new(TimeStepType::Dg, 1, 0.5, 3).unwrap();
        assert_eq!(w.n_time_dofs(), 6);
        let single = TimeWeights::new(TimeStepType::Dg, 1, 0.5, 1).unwrap();
        assert_abs_diff_eq!(w.beta[(2, 1)], -single.gamma[(0, 0)], epsilon = 1e-14);
        assert_abs_diff_eq!(w.beta[(5, 3)], -single.gamma[(1, 0)], epsilon = 1e-14);
        assert_eq!(w.beta[(2, 0)], 0.0);
        assert_eq!(w.gamma[(2, 0)], 0.0);
        assert_abs_diff_eq!(w.alpha[(3, 2)], single.alpha[(1, 0)], epsilon = 1e-14);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(TimeWeights::new(TimeStepType::Cgp, 0, 0.1, 1).is_err());
        assert!(TimeWeights::new(TimeStepType::Dg, 1, 0.0, 1).is_err());
        assert!(TimeWeights::new(TimeStepType::Dg, 1, 0.1, 0).is_err());
    }

    #[test]
    fn wave_velocity_recovery_is_consistent() {
        // u(t) = t on one CG(1) step: U = [τ], u0 = 0, v0 = 1 gives V = [1].
        let tau = 0.3;
        let w = TimeWeights::new(TimeStepType::Cgp, 1, tau, 1).unwrap();
        let ww = WaveWeights::new(TimeStepType::Cgp, &w).unwrap();
        let v = ww.v_from_u[(0, 0)] * tau + ww.v_from_v0[(0, 0)];
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-13);
        assert_abs_diff_eq!(ww.lhs_k[(0, 0)], tau / 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(ww.lhs_m[(0, 0)], 2.0 / tau, epsilon = 1e-12);
    }
}
