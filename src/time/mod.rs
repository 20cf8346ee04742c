//! Galerkin-in-time discretization: bases and dense coupling matrices.

pub mod basis;
pub mod weights;

pub use basis::{TimeBasis, TimeStepType};
pub use weights::{TimeWeights, WaveWeights};
