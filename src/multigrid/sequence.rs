//! Order of coarsening steps and the time discretization of every level.

use crate::error::KError;
use crate::time::{TimeStepType, TimeWeights, WaveWeights};
use faer::Mat;
use serde::{Deserialize, Serialize};

/// What changes between a level and the next coarser one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoarseningType {
    /// Mesh coarsened once.
    Space,
    /// Time degree lowered by one.
    Degree,
    /// Steps per slab halved, step size doubled.
    Steps,
}

/// Which equation the level couplings belong to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    #[default]
    Heat,
    Wave,
}

/// Transitions from the finest level downward.
///
/// Within the time part every degree reduction comes before any halving of the step count.
/// `time_before_space` puts the time part on the finer levels.
pub fn coarsening_sequence(
    n_space_levels: usize,
    k: usize,
    k_min: usize,
    n_steps: usize,
    n_steps_min: usize,
    time_before_space: bool,
) -> Vec<CoarseningType> {
    let mut time = vec![CoarseningType::Degree; k.saturating_sub(k_min)];
    let mut n = n_steps;
    while n % 2 == 0 && n / 2 >= n_steps_min.max(1) {
        time.push(CoarseningType::Steps);
        n /= 2;
    }
    let space = vec![CoarseningType::Space; n_space_levels];
    if time_before_space {
        time.into_iter().chain(space).collect()
    } else {
        space.into_iter().chain(time).collect()
    }
}

/// Time discretization of one level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeLevel {
    pub kind: TimeStepType,
    pub k: usize,
    pub n_steps: usize,
    pub tau: f64,
}

impl TimeLevel {
    /// Time level after `step`; unchanged for spatial coarsening.
    pub fn coarsened(&self, step: CoarseningType) -> Self {
        match step {
            CoarseningType::Space => *self,
            CoarseningType::Degree => Self {
                k: self.k - 1,
                ..*self
            },
            CoarseningType::Steps => Self {
                n_steps: self.n_steps / 2,
                tau: self.tau * 2.0,
                ..*self
            },
        }
    }

    pub fn n_blocks(&self) -> usize {
        self.kind.dofs_per_step(self.k) * self.n_steps
    }

    pub fn weights(&self) -> Result<TimeWeights<f64>, KError> {
        TimeWeights::new(self.kind, self.k, self.tau, self.n_steps)
    }

    /// `(Alpha, Beta)` of the system matrix `Alpha ⊗ K + Beta ⊗ M` on this level.
    pub fn system_weights(&self, problem: ProblemType) -> Result<(Mat<f64>, Mat<f64>), KError> {
        let w = self.weights()?;
        Ok(match problem {
            ProblemType::Heat => (w.alpha, w.beta),
            ProblemType::Wave => {
                let ww = WaveWeights::new(self.kind, &w)?;
                (ww.lhs_k, ww.lhs_m)
            }
        })
    }
}

/// Time levels from the finest (`finest`) following `sequence`; element 0 is the finest.
pub fn time_levels(finest: TimeLevel, sequence: &[CoarseningType]) -> Vec<TimeLevel> {
    let mut out = vec![finest];
    for &step in sequence {
        let next = out[out.len() - 1].coarsened(step);
        out.push(next);
    }
    out
}
