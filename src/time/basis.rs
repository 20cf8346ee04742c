//! Galerkin-in-time bases on the reference step `[0, 1]`.

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::lagrange::LagrangeBasis;
use crate::fe::quadrature::{gauss_lobatto_points, gauss_points, gauss_radau_right_points};
use faer::Mat;
use serde::{Deserialize, Serialize};

/// Time discretization scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeStepType {
    /// Discontinuous Galerkin in time.
    #[serde(rename = "DG")]
    Dg,
    /// Continuous Galerkin–Petrov in time.
    #[serde(rename = "CGP")]
    Cgp,
}

impl TimeStepType {
    pub fn is_cgp(self) -> bool {
        matches!(self, TimeStepType::Cgp)
    }

    /// Smallest admissible polynomial degree.
    pub fn minimum_degree(self) -> usize {
        match self {
            TimeStepType::Dg => 0,
            TimeStepType::Cgp => 1,
        }
    }

    /// Unknown time blocks per step.
    pub fn dofs_per_step(self, degree: usize) -> usize {
        match self {
            TimeStepType::Dg => degree + 1,
            TimeStepType::Cgp => degree,
        }
    }

    pub fn check_degree(self, degree: usize) -> Result<(), KError> {
        if degree < self.minimum_degree() {
            return Err(KError::InvalidDegree {
                degree,
                minimum: self.minimum_degree(),
            });
        }
        Ok(())
    }
}

/// Trial and test functions of one time step.
///
/// DG: `k+1` Lagrange functions on right Gauss–Radau nodes for both trial and test space,
/// so the last function carries the end value. CGP: trial functions on `k+1` Gauss–Lobatto
/// nodes, the first of which is the known start value, tested against the `k` Lagrange
/// functions on Gauss nodes.
#[derive(Clone, Debug)]
pub struct TimeBasis {
    kind: TimeStepType,
    degree: usize,
    trial: LagrangeBasis,
    test: LagrangeBasis,
}

impl TimeBasis {
    pub fn new(kind: TimeStepType, degree: usize) -> Result<Self, KError> {
        kind.check_degree(degree)?;
        let (trial, test) = match kind {
            TimeStepType::Dg => {
                let nodes = gauss_radau_right_points(degree + 1);
                (LagrangeBasis::new(nodes.clone()), LagrangeBasis::new(nodes))
            }
            TimeStepType::Cgp => (
                LagrangeBasis::new(gauss_lobatto_points(degree + 1)),
                LagrangeBasis::new(gauss_points(degree)),
            ),
        };
        Ok(Self {
            kind,
            degree,
            trial,
            test,
        })
    }

    pub fn kind(&self) -> TimeStepType {
        self.kind
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn trial(&self) -> &LagrangeBasis {
        &self.trial
    }

    pub fn test(&self) -> &LagrangeBasis {
        &self.test
    }

    pub fn dofs_per_step(&self) -> usize {
        self.kind.dofs_per_step(self.degree)
    }

    /// Index into the trial basis of unknown block `i` of a step.
    pub fn trial_index(&self, i: usize) -> usize {
        if self.kind.is_cgp() { i + 1 } else { i }
    }

    /// Reference time of the nodes carrying the unknowns of a step.
    pub fn unknown_nodes(&self) -> &[f64] {
        let nodes = self.trial.nodes();
        if self.kind.is_cgp() { &nodes[1..] } else { nodes }
    }

    /// Values of all `k+1` trial functions at `n_samples` equidistant points of `[0, 1]`.
    ///
    /// For CGP column 0 belongs to the start value of the step.
    pub fn evaluation_matrix<T: Scalar>(&self, n_samples: usize) -> Mat<T> {
        let step = if n_samples > 1 {
            1.0 / (n_samples - 1) as f64
        } else {
            0.0
        };
        Mat::from_fn(n_samples, self.trial.len(), |r, j| {
            T::cast_from(self.trial.value(j, r as f64 * step))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_limits() {
        assert!(TimeBasis::new(TimeStepType::Dg, 0).is_ok());
        assert!(matches!(
            TimeBasis::new(TimeStepType::Cgp, 0),
            Err(KError::InvalidDegree { degree: 0, minimum: 1 })
        ));
    }

    #[test]
    fn unknown_nodes_end_at_step_end() {
        let dg = TimeBasis::new(TimeStepType::Dg, 2).unwrap();
        assert_eq!(dg.dofs_per_step(), 3);
        assert_eq!(*dg.unknown_nodes().last().unwrap(), 1.0);
        let cg = TimeBasis::new(TimeStepType::Cgp, 2).unwrap();
        assert_eq!(cg.dofs_per_step(), 2);
        assert_eq!(cg.unknown_nodes().len(), 2);
        assert_eq!(*cg.unknown_nodes().last().unwrap(), 1.0);
        assert_eq!(cg.trial_index(0), 1);
    }

    #[test]
    fn evaluation_matrix_interpolates_end_points() {
        let cg = TimeBasis::new(TimeStepType::Cgp, 1).unwrap();
        let e = cg.evaluation_matrix::<f64>(4);
        assert_eq!((e.nrows(), e.ncols()), (4, 2));
        assert!((e[(0, 0)] - 1.0).abs() < 1e-14);
        assert!((e[(3, 1)] - 1.0).abs() < 1e-14);
        assert!((e[(1, 0)] - 2.0 / 3.0).abs() < 1e-14);
    }
}
