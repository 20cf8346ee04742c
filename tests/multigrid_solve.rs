//! FGMRES with the space-time multigrid on a single heat and wave slab.

use std::sync::Arc;
use stmg::core::BlockVector;
use stmg::fe::{FeSpace, Mesh};
use stmg::multigrid::{
    MultigridSettings, ProblemType, SmootherType, SpaceTimeMultigrid, TimeLevel, coarsening_sequence,
};
use stmg::operator::{BlockSystemOperator, MatrixFreeOperator, SpatialOperator};
use stmg::preconditioner::{FixedPreconditioner, FlexiblePreconditioner};
use stmg::solver::{FgmresSolver, Orthog};
use stmg::time::TimeStepType;

struct Slab {
    space: Arc<FeSpace<2>>,
    op: BlockSystemOperator<f64>,
    time: TimeLevel,
    rhs: BlockVector<f64>,
}

fn slab(problem: ProblemType, kind: TimeStepType, k: usize, r: usize) -> Slab {
    let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], r).unwrap();
    let space = Arc::new(FeSpace::new(mesh, k + 1).unwrap());
    let time = TimeLevel {
        kind,
        k,
        n_steps: 2,
        tau: 0.25 * 0.5f64.powi(r as i32),
    };
    let (alpha, beta) = time.system_weights(problem).unwrap();
    let kop: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::laplace(space.clone()));
    let mop: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::mass(space.clone()));
    let op = BlockSystemOperator::new(kop, mop, alpha, beta).unwrap();

    let mut rhs = op.initialize_block_vector();
    for b in 0..rhs.n_blocks() {
        let block = rhs.block_mut(b);
        for (i, v) in block.iter_mut().enumerate() {
            *v = (((i + 7 * b) * 31) % 23) as f64 / 23.0 - 0.5;
        }
        space.constraints.distribute(block);
    }
    Slab { space, op, time, rhs }
}

fn multigrid<T: stmg::core::Scalar>(s: &Slab, problem: ProblemType, r: usize) -> SpaceTimeMultigrid<T> {
    let k_min = s.time.kind.minimum_degree();
    let sequence = coarsening_sequence(r, s.time.k, k_min, s.time.n_steps, 1, false);
    let settings = MultigridSettings {
        smoother: SmootherType::Vanka,
        ..Default::default()
    };
    SpaceTimeMultigrid::<T>::new(s.space.clone(), s.time, problem, &sequence, None, settings).unwrap()
}

fn solve(s: &Slab, pc: &mut dyn FlexiblePreconditioner<BlockSystemOperator<f64>, BlockVector<f64>>) -> (usize, f64) {
    let mut x = s.op.initialize_block_vector();
    let mut solver = FgmresSolver::new(1e-10, 100, 100).with_orthog(Orthog::Modified);
    let stats = solver.solve_flex(&s.op, Some(pc), &s.rhs, &mut x).unwrap();
    assert!(stats.converged);
    let mut ax = s.op.initialize_block_vector();
    s.op.apply(&mut ax, &x);
    ax.add(-1.0, &s.rhs);
    (stats.iterations, ax.l2_norm() / s.rhs.l2_norm())
}

#[test]
fn heat_slab_converges_in_few_iterations() {
    let s = slab(ProblemType::Heat, TimeStepType::Dg, 1, 3);
    let mg = multigrid::<f64>(&s, ProblemType::Heat, 3);
    let (its, res) = solve(&s, &mut FixedPreconditioner::new(&mg));
    assert!(its <= 15, "{its} iterations");
    assert!(res < 1e-9, "residual {res}");
}

#[test]
fn single_precision_multigrid_keeps_double_accuracy() {
    let s = slab(ProblemType::Heat, TimeStepType::Cgp, 1, 3);
    let mg64 = multigrid::<f64>(&s, ProblemType::Heat, 3);
    let mg32 = multigrid::<f32>(&s, ProblemType::Heat, 3);
    let (its64, _) = solve(&s, &mut FixedPreconditioner::new(&mg64));
    let (its32, res32) = solve(&s, &mut FixedPreconditioner::new(&mg32));
    // The outer iteration runs in f64, so only the iteration count may grow.
    assert!(res32 < 1e-9, "residual {res32}");
    assert!(its32 <= its64 + 5, "{its32} vs {its64}");
}

#[test]
fn wave_slab_converges() {
    let s = slab(ProblemType::Wave, TimeStepType::Cgp, 1, 3);
    let mg = multigrid::<f64>(&s, ProblemType::Wave, 3);
    let (its, res) = solve(&s, &mut FixedPreconditioner::new(&mg));
    assert!(its <= 30, "{its} iterations");
    assert!(res < 1e-9, "residual {res}");
}
