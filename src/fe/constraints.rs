//! Homogeneous Dirichlet constraints.

use crate::core::scalar::Scalar;
use crate::fe::dof_handler::DofHandler;

#[derive(Clone, Debug, PartialEq)]
pub struct AffineConstraints {
    constrained: Vec<bool>,
}

impl AffineConstraints {
    /// No constrained dofs.
    pub fn none(n_dofs: usize) -> Self {
        Self {
            constrained: vec![false; n_dofs],
        }
    }

    /// Zero values on every boundary node.
    pub fn zero_boundary<const D: usize>(dof_handler: &DofHandler<D>) -> Self {
        Self {
            constrained: (0..dof_handler.n_dofs())
                .map(|i| dof_handler.is_boundary_dof(i))
                .collect(),
        }
    }

    pub fn n_dofs(&self) -> usize {
        self.constrained.len()
    }

    #[inline]
    pub fn is_constrained(&self, i: usize) -> bool {
        self.constrained[i]
    }

    pub fn n_constraints(&self) -> usize {
        self.constrained.iter().filter(|&&c| c).count()
    }

    /// Impose the constraints on `v`, i.e. zero every constrained entry.
    pub fn distribute<T: Scalar>(&self, v: &mut [T]) {
        for (x, &c) in v.iter_mut().zip(&self.constrained) {
            if c {
                *x = T::zero();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::mesh::Mesh;

    #[test]
    fn boundary_nodes_are_zeroed() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 1).unwrap();
        let dh = DofHandler::new(&mesh, 1);
        let c = AffineConstraints::zero_boundary(&dh);
        assert_eq!(c.n_constraints(), 8);
        let mut v = vec![1.0f64; 9];
        c.distribute(&mut v);
        assert_eq!(v.iter().sum::<f64>(), 1.0);
        assert_eq!(v[4], 1.0);
    }
}
