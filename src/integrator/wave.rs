//! Slab integrator for the wave equation `u_tt - ∇·(c∇u) = f`, written as a first-order
//! system in displacement and velocity with the velocity eliminated from the slab system.

use crate::core::block_vector::{BlockVector, add_scaled};
use crate::error::KError;
use crate::fe::space::FeSpace;
use crate::integrator::{
    SlabPreconditioner, SlabSolver, SolverSettings, SourceFn, SourceIntegrator, TimeIntegrator,
    check_step_size,
};
use crate::matrix::dense;
use crate::operator::{BlockSystemOperator, SpatialOperator};
use crate::time::{TimeStepType, TimeWeights, WaveWeights};
use crate::utils::convergence::SolveStats;
use crate::utils::timer::Timer;
use faer::Mat;
use std::sync::Arc;

pub struct TimeIntegratorWave<const D: usize> {
    slab: SlabSolver,
    /// `rhs_uK ⊗ K + rhs_uM ⊗ M` applied to the previous displacement.
    rhs_u: BlockSystemOperator<f64>,
    /// `rhs_vM ⊗ M` applied to the previous velocity.
    rhs_v: BlockSystemOperator<f64>,
    v_from_u: Mat<f64>,
    v_from_u0: Mat<f64>,
    v_from_v0: Mat<f64>,
    constraints_space: Arc<FeSpace<D>>,
    source: Option<SourceIntegrator<D>>,
    tau: f64,
}

impl<const D: usize> TimeIntegratorWave<D> {
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
        let ww = WaveWeights::new(kind, &w)?;
        let n = w.n_time_dofs();
        let rhs_u = BlockSystemOperator::new(Arc::clone(&k), Arc::clone(&m), ww.rhs_uk, ww.rhs_um)?;
        let rhs_v = BlockSystemOperator::new(Arc::clone(&k), Arc::clone(&m), dense::zeros(n, 1), ww.rhs_vm)?;
        let mut matrix = BlockSystemOperator::new(k, m, ww.lhs_k, ww.lhs_m)?;
        if let Some(t) = &timer {
            matrix = matrix.with_timer(Arc::clone(t));
        }
        let source = source
            .map(|f| SourceIntegrator::new(Arc::clone(space), kind, degree, tau, n_steps, f))
            .transpose()?;
        Ok(Self {
            slab: SlabSolver::new(space, matrix, preconditioner, settings, timer),
            rhs_u,
            rhs_v,
            v_from_u: ww.v_from_u,
            v_from_u0: ww.v_from_u0,
            v_from_v0: ww.v_from_v0,
            constraints_space: Arc::clone(space),
            source,
            tau,
        })
    }

    /// Solve the slab `[time, time + n·tau]` from displacement `prev_x` and velocity `prev_v`,
    /// writing displacement blocks to `x` and velocity blocks to `v`.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        x: &mut BlockVector<f64>,
        v: &mut BlockVector<f64>,
        prev_x: &[f64],
        prev_v: &[f64],
        step_number: usize,
        time: f64,
        tau: f64,
    ) -> Result<SolveStats<f64>, KError> {
        check_step_size(self.tau, tau)?;
        let matrix = self.slab.matrix();
        let (nb, nd) = (matrix.n_rows(), matrix.n_dofs());
        for (what, blocks, size) in [
            ("slab displacement", x.n_blocks(), x.block_size()),
            ("slab velocity", v.n_blocks(), v.block_size()),
        ] {
            if blocks != nb || size != nd {
                return Err(KError::mismatch(what, nb * nd, blocks * size));
            }
        }
        if prev_x.len() != nd || prev_v.len() != nd {
            return Err(KError::mismatch("previous values", nd, prev_x.len().min(prev_v.len())));
        }
        let mut rhs = matrix.initialize_block_vector();
        self.rhs_u.apply_single(&mut rhs, prev_x)?;
        self.rhs_v.apply_single_add(&mut rhs, prev_v)?;
        if let Some(src) = &self.source {
            src.add_to(&mut rhs, time);
        }
        self.slab.initial_guess(x, prev_x);
        let stats = self.slab.solve(&rhs, x, step_number)?;

        // V = v_from_u U + v_from_u0 u0 + v_from_v0 v0, block by block.
        v.fill(0.0);
        for i in 0..nb {
            let vi = v.block_mut(i);
            for j in 0..nb {
                let c = self.v_from_u[(i, j)];
                if c != 0.0 {
                    add_scaled(vi, c, x.block(j));
                }
            }
            add_scaled(vi, self.v_from_u0[(i, 0)], prev_x);
            add_scaled(vi, self.v_from_v0[(i, 0)], prev_v);
            self.constraints_space.constraints.distribute(vi);
        }
        Ok(stats)
    }
}

impl<const D: usize> TimeIntegrator for TimeIntegratorWave<D> {
    fn last_step(&self) -> usize {
        self.slab.last_iterations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::Mesh;
    use crate::fe::tools::interpolate;
    use crate::operator::MatrixFreeOperator;
    use crate::preconditioner::Preconditioner;

    struct Identity;
    impl Preconditioner<BlockSystemOperator<f64>, BlockVector<f64>> for Identity {
        fn apply(&self, r: &BlockVector<f64>, z: &mut BlockVector<f64>) -> Result<(), KError> {
            z.as_mut().copy_from_slice(r.as_ref());
            Ok(())
        }
    }

    #[test]
    fn energy_is_nearly_conserved_for_cg() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
        let space = Arc::new(FeSpace::new(mesh, 1).unwrap());
        let k_mf = Arc::new(MatrixFreeOperator::<f64, 2>::laplace(space.clone()));
        let m_mf = Arc::new(MatrixFreeOperator::<f64, 2>::mass(space.clone()));
        let k: Arc<dyn SpatialOperator<f64>> = k_mf.clone();
        let m: Arc<dyn SpatialOperator<f64>> = m_mf.clone();
        let settings = SolverSettings {
            max_iterations: 500,
            restart: 200,
            ..Default::default()
        };
        let tau = 0.02;
        let mut integ = TimeIntegratorWave::new(
            &space,
            k.clone(),
            m.clone(),
            TimeStepType::Cgp,
            1,
            tau,
            2,
            Box::new(Identity),
            None,
            settings,
            None,
        )
        .unwrap();
        let mut u0: Vec<f64> = interpolate(&space, |p| {
            (std::f64::consts::PI * p[0]).sin() * (std::f64::consts::PI * p[1]).sin()
        });
        space.constraints.distribute(&mut u0);
        let v0 = vec![0.0; space.n_dofs()];
        let energy = |u: &[f64], v: &[f64]| {
            let mut ku = vec![0.0; u.len()];
            let mut mv = vec![0.0; v.len()];
            k.apply(&mut ku, u);
            m.apply(&mut mv, v);
            let free = |i: &usize| !space.constraints.is_constrained(*i);
            (0..u.len()).filter(free).map(|i| u[i] * ku[i] + v[i] * mv[i]).sum::<f64>()
        };
        let mut x = BlockVector::new(2, space.n_dofs());
        let mut v = x.zeros_like();
        let stats = integ.solve(&mut x, &mut v, &u0, &v0, 0, 0.0, tau).unwrap();
        assert!(stats.converged);
        let e0 = energy(&u0, &v0);
        let e1 = energy(x.block(1), v.block(1));
        assert!((e1 - e0).abs() < 1e-6 * e0, "{e0} vs {e1}");
        assert!(v.linfty_norm() > 0.0);
    }
}
