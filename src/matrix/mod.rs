//! Matrix module: dense helpers and sparse storage.

pub mod dense;
pub mod sparse;
pub use sparse::{CsrMatrix, SparseMatrix, SparsityPattern};
