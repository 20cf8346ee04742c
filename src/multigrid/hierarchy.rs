//! The space-time multigrid hierarchy and its V-cycle.
//!
//! Levels live in one `Vec`, index 0 being the coarsest; a level refers to its neighbours only
//! by index. Every level runs in the preconditioner precision `T`, independent of the
//! precision of the outer Krylov iteration.

use crate::core::block_vector::BlockVector;
use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::space::FeSpace;
use crate::matrix::dense;
use crate::multigrid::sequence::{CoarseningType, ProblemType, TimeLevel, time_levels};
use crate::multigrid::transfer::{SpaceTimeTransfer, spatial_prolongation, temporal_prolongation};
use crate::operator::{BlockSystemOperator, MatrixFreeOperator, SpatialOperator};
use crate::preconditioner::vanka::build_patches;
use crate::preconditioner::{BlockJacobi, PatchType, PreconditionVanka, Preconditioner};
use crate::solver::direct_lu::LuSolver;
use crate::utils::timer::Timer;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmootherType {
    #[default]
    Vanka,
    /// Point Jacobi on the block diagonal. Suited to heat slabs only; the wave system needs the
    /// local time coupling that Vanka patches resolve.
    Jacobi,
}

impl SmootherType {
    /// Damping used when none is configured.
    pub fn default_damping(self) -> f64 {
        match self {
            SmootherType::Vanka => 1.0,
            SmootherType::Jacobi => 2.0 / 3.0,
        }
    }
}

/// Cycle and smoother knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct MultigridSettings {
    pub smoothing_steps: usize,
    pub damping: f64,
    pub smoother: SmootherType,
    pub patch_type: PatchType,
    /// Largest coarse system (dofs × time blocks) solved by dense LU.
    pub coarse_direct_max: usize,
    /// Smoother sweeps on the coarsest level when it is too large for LU.
    pub coarse_smoothing_steps: usize,
}

impl Default for MultigridSettings {
    fn default() -> Self {
        Self {
            smoothing_steps: 1,
            damping: SmootherType::Vanka.default_damping(),
            smoother: SmootherType::Vanka,
            patch_type: PatchType::Vertex,
            coarse_direct_max: 4000,
            coarse_smoothing_steps: 10,
        }
    }
}

enum Smoother<T> {
    Vanka(PreconditionVanka<T>),
    Jacobi(BlockJacobi<T>),
}

impl<T: Scalar> Smoother<T> {
    fn apply(&self, r: &BlockVector<T>, z: &mut BlockVector<T>) -> Result<(), KError> {
        match self {
            Smoother::Vanka(s) => s.apply(r, z),
            Smoother::Jacobi(s) => s.apply(r, z),
        }
    }
}

struct Level<T: Scalar> {
    time: TimeLevel,
    n_cells: usize,
    op: BlockSystemOperator<T>,
    smoother: Smoother<T>,
    /// Transfer to level `index - 1`; absent on the coarsest level.
    to_coarser: Option<SpaceTimeTransfer<T>>,
}

/// Geometric space-time multigrid preconditioner running in precision `T`.
pub struct SpaceTimeMultigrid<T: Scalar> {
    levels: Vec<Level<T>>,
    coarse_lu: Option<LuSolver<T>>,
    settings: MultigridSettings,
    timer: Option<Arc<Timer>>,
}

impl<T: Scalar> SpaceTimeMultigrid<T> {
    /// Build all levels from the finest space and time discretization.
    ///
    /// `sequence` lists the transitions from the finest level downward, see
    /// [`coarsening_sequence`](crate::multigrid::coarsening_sequence). The coefficient, when
    /// given, is cached on the stiffness operator of every level.
    pub fn new<const D: usize>(
        finest_space: Arc<FeSpace<D>>,
        finest_time: TimeLevel,
        problem: ProblemType,
        sequence: &[CoarseningType],
        coefficient: Option<&(dyn Fn(&[f64; D]) -> f64 + Sync)>,
        settings: MultigridSettings,
    ) -> Result<Self, KError> {
        if settings.smoother == SmootherType::Jacobi && problem == ProblemType::Wave {
            warn!("Jacobi smoothing is not robust for the wave system; use the Vanka smoother");
        }
        let times = time_levels(finest_time, sequence);
        let n_q_1d = finest_space.fe.quadrature_1d().len();
        let degree = finest_space.dof_handler.degree();
        let mut spaces = vec![finest_space];
        for &step in sequence {
            let last = &spaces[spaces.len() - 1];
            let next = if step == CoarseningType::Space {
                let mesh = last.mesh.coarsen().ok_or_else(|| {
                    KError::InvalidParameter("mesh cannot be coarsened any further".into())
                })?;
                Arc::new(FeSpace::with_quadrature(mesh, degree, n_q_1d, true)?)
            } else {
                Arc::clone(last)
            };
            spaces.push(next);
        }
        // Build fine to coarse, then flip so that index 0 is the coarsest.
        let mut levels = Vec::with_capacity(spaces.len());
        for (l, (space, time)) in spaces.iter().zip(&times).enumerate() {
            let mut k = MatrixFreeOperator::<T, D>::laplace(Arc::clone(space));
            if let Some(f) = coefficient {
                k.set_coefficient(f);
            }
            let m = MatrixFreeOperator::<T, D>::mass(Arc::clone(space));
            let k_csr = k.assemble_sparse()?;
            let m_csr = m.assemble_sparse()?;
            let (alpha, beta) = time.system_weights(problem)?;
            let (alpha, beta): (faer::Mat<T>, faer::Mat<T>) =
                (dense::convert(&alpha), dense::convert(&beta));
            let k_op: Arc<dyn SpatialOperator<T>> = Arc::new(k);
            let m_op: Arc<dyn SpatialOperator<T>> = Arc::new(m);
            let op = BlockSystemOperator::new(k_op, m_op, alpha, beta)?;
            let damping = T::cast_from(settings.damping);
            let smoother = match settings.smoother {
                SmootherType::Vanka => {
                    let patches = build_patches(space, settings.patch_type);
                    let mut v = PreconditionVanka::new(patches, space.n_dofs(), damping);
                    v.setup_with(op.alpha(), op.beta(), &k_csr, &m_csr)?;
                    Smoother::Vanka(v)
                }
                SmootherType::Jacobi => {
                    let mut j = BlockJacobi::new(damping);
                    j.setup(&op)?;
                    Smoother::Jacobi(j)
                }
            };
            let to_coarser = match sequence.get(l) {
                None => None,
                Some(&step) => {
                    let coarse_space = &spaces[l + 1];
                    let coarse_time = &times[l + 1];
                    let space_p = if step == CoarseningType::Space {
                        Some(spatial_prolongation::<T, D>(space, coarse_space)?)
                    } else {
                        None
                    };
                    let time_p = if step == CoarseningType::Space {
                        None
                    } else {
                        Some(dense::convert(&temporal_prolongation(time, coarse_time)?))
                    };
                    Some(SpaceTimeTransfer::new(
                        space_p,
                        time_p,
                        (time.n_blocks(), coarse_time.n_blocks()),
                        (space.n_dofs(), coarse_space.n_dofs()),
                    )?)
                }
            };
            debug!(
                "   MG level {}: {} cells, {} dofs, k = {}, {} steps, {} blocks",
                sequence.len() - l,
                space.n_cells(),
                space.n_dofs(),
                time.k,
                time.n_steps,
                time.n_blocks()
            );
            levels.push(Level {
                time: *time,
                n_cells: space.n_cells(),
                op,
                smoother,
                to_coarser,
            });
        }
        levels.reverse();
        info!("   Space-time multigrid levels: {}", levels.len());

        let coarse = &levels[0];
        let size = coarse.op.n_dofs() * coarse.time.n_blocks();
        let coarse_lu = if size <= settings.coarse_direct_max {
            let k = dense::convert::<T, f64>(&coarse.op.k().assemble_sparse()?.to_dense());
            let m = dense::convert::<T, f64>(&coarse.op.m().assemble_sparse()?.to_dense());
            let a = dense::add_scaled(
                &dense::kronecker(&dense::convert(coarse.op.alpha()), &k),
                1.0,
                &dense::kronecker(&dense::convert(coarse.op.beta()), &m),
            );
            let mut lu = LuSolver::new();
            lu.factor_f64(&a)?;
            Some(lu)
        } else {
            None
        };
        Ok(Self {
            levels,
            coarse_lu,
            settings,
            timer: None,
        })
    }

    /// Record preconditioner applications under `"mg"`.
    pub fn with_timer(mut self, timer: Arc<Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// `(cells, time blocks)` of level `l`.
    pub fn level_size(&self, l: usize) -> (usize, usize) {
        (self.levels[l].n_cells, self.levels[l].time.n_blocks())
    }

    pub fn time_level(&self, l: usize) -> &TimeLevel {
        &self.levels[l].time
    }

    /// System operator of level `l`.
    pub fn operator(&self, l: usize) -> &BlockSystemOperator<T> {
        &self.levels[l].op
    }

    pub fn has_direct_coarse_solver(&self) -> bool {
        self.coarse_lu.is_some()
    }

    fn residual(&self, l: usize, b: &BlockVector<T>, x: &BlockVector<T>) -> BlockVector<T> {
        let mut r = b.zeros_like();
        self.levels[l].op.apply(&mut r, x);
        r.sadd(-T::one(), T::one(), b);
        r
    }

    fn smooth(
        &self,
        l: usize,
        b: &BlockVector<T>,
        x: &mut BlockVector<T>,
        steps: usize,
    ) -> Result<(), KError> {
        let mut z = b.zeros_like();
        for _ in 0..steps {
            let r = self.residual(l, b, x);
            self.levels[l].smoother.apply(&r, &mut z)?;
            x.add(T::one(), &z);
        }
        Ok(())
    }

    fn coarse_solve(&self, b: &BlockVector<T>, x: &mut BlockVector<T>) -> Result<(), KError> {
        match &self.coarse_lu {
            Some(lu) => lu.solve_cached(b.as_ref(), x.as_mut()),
            None => {
                x.fill(T::zero());
                self.smooth(0, b, x, self.settings.coarse_smoothing_steps)
            }
        }
    }

    /// One V-cycle on level `l` for `A_l x = b`, starting from zero.
    pub fn vcycle(&self, l: usize, b: &BlockVector<T>, x: &mut BlockVector<T>) -> Result<(), KError> {
        if l == 0 {
            return self.coarse_solve(b, x);
        }
        let level = &self.levels[l];
        let Some(transfer) = &level.to_coarser else {
            return Err(KError::InvalidParameter(format!("level {l} has no coarser level")));
        };
        x.fill(T::zero());
        let nu = self.settings.smoothing_steps;
        self.smooth(l, b, x, nu)?;
        let r = self.residual(l, b, x);
        let coarse = &self.levels[l - 1];
        let mut rc = coarse.op.initialize_block_vector();
        transfer.restrict(&r, &mut rc);
        let mut xc = rc.zeros_like();
        self.vcycle(l - 1, &rc, &mut xc)?;
        let mut correction = b.zeros_like();
        transfer.prolongate(&xc, &mut correction);
        x.add(T::one(), &correction);
        self.smooth(l, b, x, nu)
    }
}

impl<T: Scalar> Preconditioner<BlockSystemOperator<f64>, BlockVector<f64>> for SpaceTimeMultigrid<T> {
    /// One V-cycle in precision `T` on a residual given in `f64`.
    fn apply(&self, r: &BlockVector<f64>, z: &mut BlockVector<f64>) -> Result<(), KError> {
        let _t = self.timer.as_ref().map(|t| t.scope("mg"));
        let top = self.max_level();
        let fine = &self.levels[top];
        if r.n_blocks() != fine.time.n_blocks() || r.block_size() != fine.op.n_dofs() {
            return Err(KError::mismatch("multigrid residual", fine.op.n_dofs() * fine.time.n_blocks(), r.len()));
        }
        let rt: BlockVector<T> = r.converted();
        let mut xt = rt.zeros_like();
        self.vcycle(top, &rt, &mut xt)?;
        z.copy_converted(&xt);
        Ok(())
    }
}
