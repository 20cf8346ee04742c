//! Space-time error norms of a slab solution.

use crate::core::block_vector::{BlockVector, add_scaled};
use crate::fe::quadrature::Quadrature;
use crate::fe::space::FeSpace;
use crate::fe::tools::integrate_difference;
use crate::problem::exact::ExactSolution;
use crate::time::TimeBasis;
use std::sync::Arc;

/// Error contributions of one slab.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlabErrors {
    /// `∫ ||u_h - u||²_L2 dt`
    pub l2_squared: f64,
    /// `∫ |u_h - u|²_H1 dt`
    pub h1_semi_squared: f64,
    /// Maximum pointwise error over all space-time quadrature points.
    pub linfty: f64,
}

/// Field of step `block_offset / dofs_per_step` at reference time `t` of that step.
///
/// For CGP the start value is the last unknown of the previous step, or `prev_x` for the
/// first step of the slab.
pub fn evaluate_numerical_solution(
    basis: &TimeBasis,
    t: f64,
    x: &BlockVector<f64>,
    prev_x: &[f64],
    block_offset: usize,
) -> Vec<f64> {
    let mut out = vec![0.0; prev_x.len()];
    for j in 0..basis.trial().len() {
        let v = basis.trial().value(j, t);
        if v == 0.0 {
            continue;
        }
        let src = if !basis.kind().is_cgp() {
            x.block(block_offset + j)
        } else if block_offset + j == 0 {
            prev_x
        } else {
            x.block(block_offset + j - 1)
        };
        add_scaled(&mut out, v, src);
    }
    out
}

pub struct ErrorCalculator<const D: usize> {
    /// Same numbering as the solution space with a finer quadrature.
    space: Arc<FeSpace<D>>,
    basis: TimeBasis,
    quadrature: Quadrature,
}

impl<const D: usize> ErrorCalculator<D> {
    pub fn new(space: Arc<FeSpace<D>>, basis: TimeBasis) -> Self {
        let quadrature = Quadrature::gauss(basis.degree() + 2);
        Self {
            space,
            basis,
            quadrature,
        }
    }

    pub fn evaluate_error(
        &self,
        exact: &ExactSolution<D>,
        time: f64,
        tau: f64,
        x: &BlockVector<f64>,
        prev_x: &[f64],
        n_steps: usize,
    ) -> SlabErrors {
        let per_step = self.basis.dofs_per_step();
        let mut out = SlabErrors::default();
        for it in 0..n_steps {
            let t0 = time + it as f64 * tau;
            for (&tq, &wq) in self.quadrature.points.iter().zip(&self.quadrature.weights) {
                let mut u_h = evaluate_numerical_solution(&self.basis, tq, x, prev_x, it * per_step);
                self.space.constraints.distribute(&mut u_h);
                let t = t0 + tq * tau;
                let norms = integrate_difference(
                    &self.space,
                    &u_h,
                    |p| exact.value(p, t),
                    |p| exact.gradient(p, t),
                );
                out.l2_squared += tau * wq * norms.l2_squared;
                out.h1_semi_squared += tau * wq * norms.h1_semi_squared;
                out.linfty = out.linfty.max(norms.linfty);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::Mesh;
    use crate::fe::tools::interpolate;
    use crate::multigrid::ProblemType;
    use crate::time::TimeStepType;

    #[test]
    fn cg_start_value_comes_from_previous_block() {
        let basis = TimeBasis::new(TimeStepType::Cgp, 1).unwrap();
        let x = BlockVector::from_blocks(&[vec![2.0, 2.0], vec![4.0, 4.0]]);
        let prev = vec![1.0, 1.0];
        assert_eq!(evaluate_numerical_solution(&basis, 0.0, &x, &prev, 0), vec![1.0, 1.0]);
        assert_eq!(evaluate_numerical_solution(&basis, 0.5, &x, &prev, 0), vec![1.5, 1.5]);
        assert_eq!(evaluate_numerical_solution(&basis, 0.5, &x, &prev, 1), vec![3.0, 3.0]);
        let dg = TimeBasis::new(TimeStepType::Dg, 0).unwrap();
        assert_eq!(evaluate_numerical_solution(&dg, 0.3, &x, &prev, 1), vec![4.0, 4.0]);
    }

    #[test]
    fn interpolated_exact_solution_has_small_error() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 3).unwrap();
        let space = Arc::new(FeSpace::with_quadrature(mesh, 2, 4, true).unwrap());
        let exact = ExactSolution::<2>::new(ProblemType::Heat, 1.0);
        let basis = TimeBasis::new(TimeStepType::Dg, 0).unwrap();
        let calc = ErrorCalculator::new(space.clone(), basis);
        let tau = 0.01;
        // DG(0) holds the end value over the whole step.
        let end: Vec<f64> = interpolate(&space, |p| exact.value(p, tau));
        let x = BlockVector::from_blocks(&[end]);
        let prev = vec![0.0; space.n_dofs()];
        let e = calc.evaluate_error(&exact, 0.0, tau, &x, &prev, 1);
        assert!(e.l2_squared.sqrt() < 0.1 * tau.sqrt());
        assert!(e.linfty < 0.02);
        assert!(e.h1_semi_squared > 0.0);
    }
}
