//! Identities of the matrix-free spatial operators and the space-time block operator.

use approx::assert_abs_diff_eq;
use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use stmg::core::BlockVector;
use stmg::fe::{FeSpace, Mesh};
use stmg::matrix::SparseMatrix;
use stmg::operator::{BlockSystemOperator, Coefficient, MatrixFreeOperator, SpatialOperator};

fn random_vector(rng: &mut StdRng, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[test]
fn mass_of_constant_field_is_domain_measure() {
    let mesh = Mesh::<2>::hyper_rectangle([2, 1], [0.0, -0.5], [2.0, 0.5], 2).unwrap();
    let space = Arc::new(FeSpace::with_quadrature(mesh, 2, 3, false).unwrap());
    let m = MatrixFreeOperator::<f64, 2>::mass(space.clone());
    let ones = vec![1.0; space.n_dofs()];
    let mut dst = vec![0.0; space.n_dofs()];
    m.apply(&mut dst, &ones);
    assert_abs_diff_eq!(dst.iter().sum::<f64>(), 2.0, epsilon = 1e-12);

    let mut mesh3 = Mesh::<3>::hyper_rectangle([1, 1, 1], [0.0; 3], [1.0; 3], 2).unwrap();
    mesh3.distort_random(0.1, 9);
    let space3 = Arc::new(FeSpace::with_quadrature(mesh3, 1, 2, false).unwrap());
    let m3 = MatrixFreeOperator::<f64, 3>::mass(space3.clone());
    let ones = vec![1.0; space3.n_dofs()];
    let mut dst = vec![0.0; space3.n_dofs()];
    m3.apply(&mut dst, &ones);
    // Boundary vertices stay put, so the volume is preserved.
    assert_abs_diff_eq!(dst.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
}

#[test]
fn assembled_matrix_agrees_with_apply() {
    let mut mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
    mesh.distort_random(0.15, 3);
    let space = Arc::new(FeSpace::new(mesh, 2).unwrap());
    let coeff = Coefficient::<2>::layered().with_distortion(0.2, [1, 1], [0.0, 0.0], [1.0, 1.0]);
    let mut op = MatrixFreeOperator::<f64, 2>::new(space.clone(), 0.5, 2.0);
    op.set_coefficient(|p| coeff.value(p));
    let a = op.assemble_sparse().unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let x = random_vector(&mut rng, space.n_dofs());
    let mut y_mf = vec![0.0; x.len()];
    let mut y_sp = vec![0.0; x.len()];
    op.apply(&mut y_mf, &x);
    a.spmv(&x, &mut y_sp);
    let scale = y_mf.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    for (p, q) in y_mf.iter().zip(&y_sp) {
        assert!((p - q).abs() <= 1e-10 * scale, "{p} vs {q}");
    }
    let diag = op.diagonal();
    for (i, d) in diag.iter().enumerate() {
        assert_abs_diff_eq!(*d, a.get(i, i), epsilon = 1e-12 * scale);
    }
}

#[test]
fn diagonal_inverse_follows_clamp_rule() {
    let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
    let space = Arc::new(FeSpace::new(mesh, 1).unwrap());
    // Scaled far below sqrt(eps): every free diagonal entry is clamped.
    let tiny = MatrixFreeOperator::<f64, 2>::new(space.clone(), 1e-12, 0.0);
    let d = tiny.diagonal();
    let inv = tiny.diagonal_inverse();
    let tol = f64::EPSILON.sqrt();
    for (di, ii) in d.iter().zip(&inv) {
        if di.abs() > tol {
            assert_abs_diff_eq!(di * ii, 1.0, epsilon = 1e-12);
        } else {
            assert_eq!(*ii, 1.0);
        }
    }
    let k = MatrixFreeOperator::<f32, 2>::laplace(space.clone());
    let d = k.diagonal();
    let inv = k.diagonal_inverse();
    for (di, ii) in d.iter().zip(&inv) {
        assert!((di * ii - 1.0).abs() < 1e-6);
    }
}

#[test]
fn block_operator_is_linear_and_rejects_bad_shapes() {
    let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
    let space = Arc::new(FeSpace::new(mesh, 1).unwrap());
    let k: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::laplace(space.clone()));
    let m: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::mass(space.clone()));
    let alpha = Mat::from_fn(3, 3, |i, j| if j <= i { 0.1 * (1 + i + j) as f64 } else { 0.0 });
    let beta = Mat::from_fn(3, 3, |i, j| if i == j { 1.0 } else if j + 1 == i { -1.0 } else { 0.0 });
    let op = BlockSystemOperator::new(k.clone(), m.clone(), alpha.clone(), beta).unwrap();

    let n = space.n_dofs();
    let mut rng = StdRng::seed_from_u64(5);
    let blocks = |rng: &mut StdRng| -> Vec<Vec<f64>> { (0..3).map(|_| random_vector(rng, n)).collect() };
    let x = BlockVector::from_blocks(&blocks(&mut rng));
    let y = BlockVector::from_blocks(&blocks(&mut rng));
    let (a, b) = (1.5, -0.25);
    let mut comb = x.clone();
    comb.sadd(a, b, &y);

    let mut ax = op.initialize_block_vector();
    let mut ay = op.initialize_block_vector();
    let mut acomb = op.initialize_block_vector();
    op.apply(&mut ax, &x);
    op.apply(&mut ay, &y);
    op.apply(&mut acomb, &comb);
    ax.sadd(a, b, &ay);
    for (p, q) in ax.as_ref().iter().zip(acomb.as_ref()) {
        assert_abs_diff_eq!(*p, *q, epsilon = 1e-12);
    }

    let wrong = Mat::<f64>::zeros(3, 2);
    assert!(BlockSystemOperator::new(k, m, alpha, wrong).is_err());
}
