//! Minimal finite-element layer: structured meshes, `Q_p` elements, dof numbering,
//! boundary constraints and quadrature-point geometry.

pub mod constraints;
pub mod dof_handler;
pub mod lagrange;
pub mod mapping;
pub mod mesh;
pub mod quadrature;
pub mod space;
pub mod tools;

pub use constraints::AffineConstraints;
pub use dof_handler::DofHandler;
pub use lagrange::{FeQ, LagrangeBasis};
pub use mapping::MappingData;
pub use mesh::Mesh;
pub use quadrature::Quadrature;
pub use space::FeSpace;
