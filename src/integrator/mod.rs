//! Time slab drivers: assemble the slab right-hand side, solve with multigrid-preconditioned
//! FGMRES and distribute constraints.

use crate::core::block_vector::{BlockVector, add_scaled};
use crate::error::KError;
use crate::fe::constraints::AffineConstraints;
use crate::fe::space::FeSpace;
use crate::fe::tools::create_right_hand_side;
use crate::operator::BlockSystemOperator;
use crate::preconditioner::{FixedPreconditioner, Preconditioner};
use crate::solver::fgmres::{FgmresSolver, Orthog};
use crate::time::{TimeBasis, TimeStepType, TimeWeights};
use crate::utils::convergence::SolveStats;
use crate::utils::timer::Timer;
use faer::Mat;
use log::{debug, warn};
use std::sync::Arc;

pub mod heat;
pub mod wave;

pub use heat::TimeIntegratorHeat;
pub use wave::TimeIntegratorWave;

/// Right-hand side `f(x, t)`.
pub type SourceFn<const D: usize> = Arc<dyn Fn(&[f64; D], f64) -> f64 + Send + Sync>;

/// Preconditioner of the slab system in the solver precision.
pub type SlabPreconditioner = Box<dyn Preconditioner<BlockSystemOperator<f64>, BlockVector<f64>>>;

pub trait TimeIntegrator {
    /// GMRES iterations of the most recent slab.
    fn last_step(&self) -> usize;
}

/// Outer Krylov settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub restart: usize,
    /// Start every slab from the previous end value instead of zero.
    pub extrapolate: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 100,
            restart: 100,
            extrapolate: false,
        }
    }
}

/// The left-hand side of a slab with its preconditioner and iteration bookkeeping.
pub(crate) struct SlabSolver {
    matrix: BlockSystemOperator<f64>,
    preconditioner: SlabPreconditioner,
    settings: SolverSettings,
    constraints: AffineConstraints,
    last_iterations: usize,
    timer: Option<Arc<Timer>>,
}

impl SlabSolver {
    pub(crate) fn new<const D: usize>(
        space: &Arc<FeSpace<D>>,
        matrix: BlockSystemOperator<f64>,
        preconditioner: SlabPreconditioner,
        settings: SolverSettings,
        timer: Option<Arc<Timer>>,
    ) -> Self {
        Self {
            matrix,
            preconditioner,
            settings,
            constraints: space.constraints.clone(),
            last_iterations: 0,
            timer,
        }
    }

    pub(crate) fn matrix(&self) -> &BlockSystemOperator<f64> {
        &self.matrix
    }

    pub(crate) fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    /// Initial guess for a slab starting from `prev_x`.
    pub(crate) fn initial_guess(&self, x: &mut BlockVector<f64>, prev_x: &[f64]) {
        if self.settings.extrapolate {
            for block in x.blocks_mut() {
                block.copy_from_slice(prev_x);
            }
        } else {
            x.fill(0.0);
        }
    }

    pub(crate) fn solve(
        &mut self,
        rhs: &BlockVector<f64>,
        x: &mut BlockVector<f64>,
        step_number: usize,
    ) -> Result<SolveStats<f64>, KError> {
        let _t = self.timer.as_ref().map(|t| t.scope("solve"));
        let tol = self.settings.tolerance;
        let mut solver = FgmresSolver::new(tol, self.settings.max_iterations, self.settings.restart)
            .with_orthog(Orthog::Modified)
            .with_tolerances(tol, tol);
        let mut pc = FixedPreconditioner::new(&*self.preconditioner);
        let stats = solver.solve_flex(&self.matrix, Some(&mut pc), rhs, x)?;
        for block in x.blocks_mut() {
            self.constraints.distribute(block);
        }
        self.last_iterations = stats.iterations;
        debug!(
            "   step {step_number}: {} GMRES iterations, residual {:.3e}",
            stats.iterations, stats.final_residual
        );
        if !stats.converged {
            warn!(
                "GMRES did not converge in step {step_number}: residual {:.3e} after {} iterations",
                stats.final_residual, stats.iterations
            );
        }
        Ok(stats)
    }
}

/// Step sizes are baked into the coupling matrices; a slab must use the assembled one.
pub(crate) fn check_step_size(assembled: f64, tau: f64) -> Result<(), KError> {
    if (tau - assembled).abs() > 1e-12 * assembled {
        return Err(KError::InvalidParameter(format!(
            "step size {tau} differs from the assembled step size {assembled}"
        )));
    }
    Ok(())
}

/// Load vectors of a source interpolated in time by the trial basis.
///
/// On one step `F_i = Σ_j Alpha(i,j) f(t_j)` over the unknown nodes, plus for continuous
/// schemes `-Gamma(i) f(t_start)` from the start node.
pub(crate) struct SourceIntegrator<const D: usize> {
    space: Arc<FeSpace<D>>,
    basis: TimeBasis,
    single: TimeWeights<f64>,
    tau: f64,
    n_steps: usize,
    f: SourceFn<D>,
}

impl<const D: usize> SourceIntegrator<D> {
    pub(crate) fn new(
        space: Arc<FeSpace<D>>,
        kind: TimeStepType,
        degree: usize,
        tau: f64,
        n_steps: usize,
        f: SourceFn<D>,
    ) -> Result<Self, KError> {
        Ok(Self {
            space,
            basis: TimeBasis::new(kind, degree)?,
            single: TimeWeights::new(kind, degree, tau, 1)?,
            tau,
            n_steps,
            f,
        })
    }

    /// Add the source contributions of the slab starting at `time` to `rhs`.
    pub(crate) fn add_to(&self, rhs: &mut BlockVector<f64>, time: f64) {
        let m = self.basis.dofs_per_step();
        let nodes = self.basis.trial().nodes();
        let alpha: &Mat<f64> = &self.single.alpha;
        for s in 0..self.n_steps {
            let t0 = time + s as f64 * self.tau;
            let loads: Vec<Vec<f64>> = nodes
                .iter()
                .map(|&node| {
                    let t = t0 + node * self.tau;
                    create_right_hand_side(&self.space, |x| (self.f)(x, t))
                })
                .collect();
            for i in 0..m {
                let block = rhs.block_mut(s * m + i);
                for j in 0..m {
                    let a = alpha[(i, j)];
                    if a != 0.0 {
                        add_scaled(block, a, &loads[self.basis.trial_index(j)]);
                    }
                }
                if self.basis.kind().is_cgp() {
                    add_scaled(block, -self.single.gamma[(i, 0)], &loads[0]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::Mesh;

    #[test]
    fn constant_source_integrates_exactly() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 1).unwrap();
        let space = Arc::new(FeSpace::with_quadrature(mesh, 1, 2, false).unwrap());
        let f: SourceFn<2> = Arc::new(|_: &[f64; 2], _: f64| 1.0);
        for (kind, k) in [(TimeStepType::Dg, 1), (TimeStepType::Cgp, 2)] {
            let src = SourceIntegrator::new(space.clone(), kind, k, 0.5, 2, f.clone()).unwrap();
            let basis = TimeBasis::new(kind, k).unwrap();
            let mut rhs = BlockVector::new(basis.dofs_per_step() * 2, space.n_dofs());
            src.add_to(&mut rhs, 0.0);
            // Trial and test functions both sum to one: the total is slab length times area.
            let total: f64 = rhs.as_ref().iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "{kind:?}: {total}");
        }
        assert!(check_step_size(0.5, 0.5).is_ok());
        assert!(check_step_size(0.5, 0.25).is_err());
    }
}
