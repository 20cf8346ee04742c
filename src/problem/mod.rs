//! The heat and wave model problems and the convergence-study driver.

pub mod convergence;
pub mod error_calculator;
pub mod exact;
pub mod functional;

pub use convergence::{
    ConvergenceRow, Dimension, ErrorNorms, convergence_table, iteration_table, run_case,
    run_convergence_study,
};
pub use error_calculator::{ErrorCalculator, SlabErrors, evaluate_numerical_solution};
pub use exact::{CutoffBump, ExactSolution};
pub use functional::PointFunctional;
