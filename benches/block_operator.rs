use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use stmg::fe::{FeSpace, Mesh};
use stmg::multigrid::{MultigridSettings, ProblemType, SpaceTimeMultigrid, TimeLevel, coarsening_sequence};
use stmg::operator::{BlockSystemOperator, MatrixFreeOperator, SpatialOperator};
use stmg::preconditioner::Preconditioner;
use stmg::time::TimeStepType;

fn bench_block_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("block operator apply");
    for degree in [1, 2, 3] {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 5).unwrap();
        let space = Arc::new(FeSpace::new(mesh, degree + 1).unwrap());
        let time = TimeLevel {
            kind: TimeStepType::Dg,
            k: degree,
            n_steps: 2,
            tau: 0.01,
        };
        let (alpha, beta) = time.system_weights(ProblemType::Heat).unwrap();
        let k: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::laplace(space.clone()));
        let m: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::mass(space.clone()));
        let op = BlockSystemOperator::new(k, m, alpha, beta).unwrap();
        let mut src = op.initialize_block_vector();
        src.fill(1.0);
        let mut dst = op.initialize_block_vector();
        group.bench_with_input(BenchmarkId::from_parameter(degree), &degree, |b, _| {
            b.iter(|| op.apply(black_box(&mut dst), black_box(&src)))
        });
    }
    group.finish();
}

fn bench_vcycle(c: &mut Criterion) {
    let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 4).unwrap();
    let space = Arc::new(FeSpace::new(mesh, 2).unwrap());
    let time = TimeLevel {
        kind: TimeStepType::Dg,
        k: 1,
        n_steps: 2,
        tau: 0.01,
    };
    let sequence = coarsening_sequence(4, 1, 0, 2, 1, false);
    let settings = MultigridSettings::default();
    let mg64 = SpaceTimeMultigrid::<f64>::new(space.clone(), time, ProblemType::Heat, &sequence, None, settings.clone())
        .unwrap();
    let mg32 = SpaceTimeMultigrid::<f32>::new(space, time, ProblemType::Heat, &sequence, None, settings).unwrap();
    let mut r = mg64.operator(mg64.max_level()).initialize_block_vector();
    r.fill(1.0);
    let mut z = r.zeros_like();
    c.bench_function("v-cycle f64", |b| b.iter(|| mg64.apply(black_box(&r), &mut z).unwrap()));
    c.bench_function("v-cycle f32", |b| b.iter(|| mg32.apply(black_box(&r), &mut z).unwrap()));
}

criterion_group!(benches, bench_block_apply, bench_vcycle);
criterion_main!(benches);
