//! Run configuration.

pub mod parameters;

pub use parameters::{Geometry, Parameters};
