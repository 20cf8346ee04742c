pub mod block_vector;
pub mod scalar;
pub mod traits;
pub mod wrappers;

pub use block_vector::BlockVector;
pub use scalar::Scalar;
pub use traits::*;
