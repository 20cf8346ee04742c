//! A finite-element space: mesh, element, numbering, constraints and geometry together.

use crate::error::KError;
use crate::fe::constraints::AffineConstraints;
use crate::fe::dof_handler::DofHandler;
use crate::fe::lagrange::FeQ;
use crate::fe::mapping::MappingData;
use crate::fe::mesh::Mesh;

/// Immutable after construction; shared between operators through `Arc`.
#[derive(Clone, Debug)]
pub struct FeSpace<const D: usize> {
    pub mesh: Mesh<D>,
    pub fe: FeQ<D>,
    pub dof_handler: DofHandler<D>,
    pub constraints: AffineConstraints,
    pub mapping: MappingData<D>,
}

impl<const D: usize> FeSpace<D> {
    /// `Q_degree` with a `(degree+1)`-point Gauss rule and zero boundary values.
    pub fn new(mesh: Mesh<D>, degree: usize) -> Result<Self, KError> {
        Self::with_quadrature(mesh, degree, degree + 1, true)
    }

    /// Space with an explicit quadrature size; `constrain_boundary = false` leaves every dof free.
    pub fn with_quadrature(
        mesh: Mesh<D>,
        degree: usize,
        n_q_1d: usize,
        constrain_boundary: bool,
    ) -> Result<Self, KError> {
        if degree == 0 {
            return Err(KError::InvalidParameter(
                "spatial elements need degree >= 1".into(),
            ));
        }
        let fe = FeQ::new(degree, n_q_1d);
        let dof_handler = DofHandler::new(&mesh, degree);
        let constraints = if constrain_boundary {
            AffineConstraints::zero_boundary(&dof_handler)
        } else {
            AffineConstraints::none(dof_handler.n_dofs())
        };
        let mapping = MappingData::new(&mesh, &fe)?;
        Ok(Self {
            mesh,
            fe,
            dof_handler,
            constraints,
            mapping,
        })
    }

    pub fn n_dofs(&self) -> usize {
        self.dof_handler.n_dofs()
    }

    pub fn n_cells(&self) -> usize {
        self.mesh.n_active_cells()
    }
}
