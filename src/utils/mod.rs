pub mod convergence;
pub mod timer;

pub use convergence::{Convergence, SolveStats};
pub use timer::Timer;
