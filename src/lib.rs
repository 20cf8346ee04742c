//! stmg: space-time finite elements with a space-time multigrid preconditioner
//!
//! This crate solves the heat and wave equations on time slabs that couple several Galerkin
//! time steps at once. The slab system is a tensor product of small dense time-coupling
//! matrices with matrix-free spatial operators; it is solved by flexible GMRES preconditioned
//! with a geometric multigrid that coarsens in space, time degree and steps per slab, and may
//! run in lower precision than the outer iteration.

pub mod config;
pub mod core;
pub mod error;
pub mod fe;
pub mod integrator;
pub mod matrix;
pub mod multigrid;
pub mod operator;
pub mod preconditioner;
pub mod problem;
pub mod solver;
pub mod time;
pub mod utils;

// Re-exports for convenience
pub use config::Parameters;
pub use core::*;
pub use error::*;
pub use fe::{AffineConstraints, FeSpace, Mesh};
pub use integrator::{SolverSettings, TimeIntegrator, TimeIntegratorHeat, TimeIntegratorWave};
pub use matrix::*;
pub use multigrid::{
    CoarseningType, MultigridSettings, ProblemType, SmootherType, SpaceTimeMultigrid, TimeLevel,
};
pub use operator::{BlockSystemOperator, Coefficient, MatrixFreeOperator, SpatialOperator};
pub use preconditioner::*;
pub use problem::{ConvergenceRow, Dimension, run_convergence_study};
pub use solver::*;
pub use time::{TimeBasis, TimeStepType, TimeWeights, WaveWeights};

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
pub use utils::timer::Timer;
