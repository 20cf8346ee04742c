//! Time-coupling matrices against hand-computed single-step formulas.
//!
//! DG(1) uses the right Radau nodes {1/3, 1}, whose Lagrange functions are
//! `φ₁ = 3/2 (1 - t)` and `φ₂ = 3/2 t - 1/2`; all integrals below follow from these by hand.

use approx::assert_abs_diff_eq;
use stmg::time::{TimeStepType, TimeWeights, WaveWeights};

#[test]
fn dg1_single_step_matches_reference() {
    let tau = 0.25;
    let w = TimeWeights::new(TimeStepType::Dg, 1, tau, 1).unwrap();
    let alpha = [[0.75 * tau, 0.0], [0.0, 0.25 * tau]];
    let beta = [[1.125, 0.375], [-1.125, 0.625]];
    let gamma = [1.5, -0.5];
    for i in 0..2 {
        for j in 0..2 {
            assert_abs_diff_eq!(w.alpha[(i, j)], alpha[i][j], epsilon = 1e-12);
            assert_abs_diff_eq!(w.beta[(i, j)], beta[i][j], epsilon = 1e-12);
        }
        assert_abs_diff_eq!(w.gamma[(i, 0)], gamma[i], epsilon = 1e-12);
        assert_eq!(w.zeta[(i, 0)], 0.0);
    }
}

#[test]
fn dg1_batch_places_single_steps_on_the_diagonal() {
    let tau = 0.25;
    let single = TimeWeights::new(TimeStepType::Dg, 1, tau, 1).unwrap();
    let w = TimeWeights::new(TimeStepType::Dg, 1, tau, 2).unwrap();
    assert_eq!(w.n_time_dofs(), 4);
    for s in 0..2 {
        for i in 0..2 {
            for j in 0..2 {
                assert_eq!(w.alpha[(2 * s + i, 2 * s + j)], single.alpha[(i, j)]);
                assert_eq!(w.beta[(2 * s + i, 2 * s + j)], single.beta[(i, j)]);
            }
        }
    }
    // The second step starts from the end value of the first.
    assert_abs_diff_eq!(w.beta[(2, 1)], -1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(w.beta[(3, 1)], 0.5, epsilon = 1e-12);
    assert_eq!(w.beta[(2, 0)], 0.0);
    assert_eq!(w.alpha[(2, 1)], 0.0);
    assert_eq!(w.gamma[(2, 0)], 0.0);
    assert_eq!(w.gamma[(3, 0)], 0.0);
}

#[test]
fn cg2_reproduces_constants_and_linears() {
    let tau = 0.4;
    let w = TimeWeights::new(TimeStepType::Cgp, 2, tau, 1).unwrap();
    assert_eq!(w.n_time_dofs(), 2);
    // GLL nodes 0, 1/2, 1: the unknowns sit at 1/2 and 1.
    let nodes = [0.5, 1.0];
    let mut total_mass = 0.0;
    let mut total_slope = 0.0;
    for i in 0..2 {
        // u ≡ 1: no time derivative.
        let d_const = w.beta[(i, 0)] + w.beta[(i, 1)] - w.zeta[(i, 0)];
        assert_abs_diff_eq!(d_const, 0.0, epsilon = 1e-12);
        total_mass += w.alpha[(i, 0)] + w.alpha[(i, 1)] - w.gamma[(i, 0)];
        // u = t on the reference step: unit derivative, start value 0.
        total_slope += w.beta[(i, 0)] * nodes[0] + w.beta[(i, 1)] * nodes[1];
    }
    assert_abs_diff_eq!(total_mass, tau, epsilon = 1e-12);
    assert_abs_diff_eq!(total_slope, 1.0, epsilon = 1e-12);
}

#[test]
fn wave_elimination_reduces_to_known_products() {
    let tau = 0.1;
    let w = TimeWeights::new(TimeStepType::Dg, 0, tau, 1).unwrap();
    let ww = WaveWeights::new(TimeStepType::Dg, &w).unwrap();
    // DG(0): T = τ, D = 1, Γ = 1.
    assert_abs_diff_eq!(ww.lhs_k[(0, 0)], tau, epsilon = 1e-14);
    assert_abs_diff_eq!(ww.lhs_m[(0, 0)], 1.0 / tau, epsilon = 1e-12);
    assert_eq!(ww.rhs_uk[(0, 0)], 0.0);
    assert_abs_diff_eq!(ww.rhs_um[(0, 0)], 1.0 / tau, epsilon = 1e-12);
    assert_abs_diff_eq!(ww.rhs_vm[(0, 0)], 1.0, epsilon = 1e-14);
    let f32_weights: WaveWeights<f32> = ww.convert();
    assert!((f32_weights.lhs_m[(0, 0)] - 10.0).abs() < 1e-5);
}

#[test]
fn degree_below_minimum_is_a_configuration_error() {
    assert!(matches!(
        TimeWeights::new(TimeStepType::Cgp, 0, 0.1, 2),
        Err(stmg::KError::InvalidDegree { degree: 0, minimum: 1 })
    ));
}
