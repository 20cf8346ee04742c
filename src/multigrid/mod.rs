//! Geometric multigrid coarsening in space, time degree and steps per slab.

pub mod hierarchy;
pub mod sequence;
pub mod transfer;

pub use hierarchy::{MultigridSettings, SmootherType, SpaceTimeMultigrid};
pub use sequence::{CoarseningType, ProblemType, TimeLevel, coarsening_sequence, time_levels};
pub use transfer::{SpaceTimeTransfer, spatial_prolongation, temporal_prolongation};
