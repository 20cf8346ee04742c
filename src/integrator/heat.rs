//! Slab integrator for the heat equation `u_t - ∇·(c∇u) = f`.

use crate::core::block_vector::BlockVector;
use crate::error::KError;
use crate::fe::space::FeSpace;
use crate::integrator::{
    SlabPreconditioner, SlabSolver, SolverSettings, SourceFn, SourceIntegrator, TimeIntegrator,
    check_step_size,
};
use crate::matrix::dense;
use crate::operator::{BlockSystemOperator, SpatialOperator};
use crate::time::{TimeStepType, TimeWeights};
use crate::utils::convergence::SolveStats;
use crate::utils::timer::Timer;
use std::sync::Arc;

pub struct TimeIntegratorHeat<const D: usize> {
    slab: SlabSolver,
    /// Couples the previous end value: `Gamma`/`Zeta` for CGP, `Gamma` with `M` for DG.
    rhs_matrix: BlockSystemOperator<f64>,
    source: Option<SourceIntegrator<D>>,
    tau: f64,
}

impl<const D: usize> TimeIntegratorHeat<D> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        space: &Arc<FeSpace<D>>,
        k: Arc<dyn SpatialOperator<f64>>,
        m: Arc<dyn SpatialOperator<f64>>,
        kind: TimeStepType,
        degree: usize,
        tau: f64,
        n_steps: usize,
        preconditioner: SlabPreconditioner,
        source: Option<SourceFn<D>>,
        settings: SolverSettings,
        timer: Option<Arc<Timer>>,
    ) -> Result<Self, KError> {
        let w = TimeWeights::new(kind, degree, tau, n_steps)?;
        let n = w.n_time_dofs();
        let (rhs_uk, rhs_um) = match kind {
            TimeStepType::Cgp => (w.gamma.clone(), w.zeta.clone()),
            TimeStepType::Dg => (dense::zeros(n, 1), w.gamma.clone()),
        };
        let rhs_matrix = BlockSystemOperator::new(Arc::clone(&k), Arc::clone(&m), rhs_uk, rhs_um)?;
        let mut matrix = BlockSystemOperator::new(k, m, w.alpha, w.beta)?;
        if let Some(t) = &timer {
            matrix = matrix.with_timer(Arc::clone(t));
        }
        let source = source
            .map(|f| SourceIntegrator::new(Arc::clone(space), kind, degree, tau, n_steps, f))
            .transpose()?;
        Ok(Self {
            slab: SlabSolver::new(space, matrix, preconditioner, settings, timer),
            rhs_matrix,
            source,
            tau,
        })
    }

    /// Solve the slab `[time, time + n·tau]` starting from `prev_x`.
    ///
    /// `x` holds one block per time unknown of the slab; its last block is the end value.
    pub fn solve(
        &mut self,
        x: &mut BlockVector<f64>,
        prev_x: &[f64],
        step_number: usize,
        time: f64,
        tau: f64,
    ) -> Result<SolveStats<f64>, KError> {
        check_step_size(self.tau, tau)?;
        let matrix = self.slab.matrix();
        if x.n_blocks() != matrix.n_rows() || x.block_size() != matrix.n_dofs() {
            return Err(KError::mismatch("slab solution", matrix.n_rows() * matrix.n_dofs(), x.len()));
        }
        if prev_x.len() != matrix.n_dofs() {
            return Err(KError::mismatch("previous value", matrix.n_dofs(), prev_x.len()));
        }
        let mut rhs = matrix.initialize_block_vector();
        self.rhs_matrix.apply_single(&mut rhs, prev_x)?;
        if let Some(src) = &self.source {
            src.add_to(&mut rhs, time);
        }
        self.slab.initial_guess(x, prev_x);
        self.slab.solve(&rhs, x, step_number)
    }
}

impl<const D: usize> TimeIntegrator for TimeIntegratorHeat<D> {
    fn last_step(&self) -> usize {
        self.slab.last_iterations()
    }
}
