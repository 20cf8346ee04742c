//! Per-cell geometry at quadrature points, precomputed once per mesh.

use crate::fe::lagrange::FeQ;
use crate::fe::mesh::{Mesh, invert_small};
use crate::error::KError;

/// Quadrature-point data of the Q1 mapping for every cell.
///
/// Entries are stored cell-major: index `cell * n_q_points + q`.
#[derive(Clone, Debug)]
pub struct MappingData<const D: usize> {
    n_q_points: usize,
    jxw: Vec<f64>,
    inverse_jacobians: Vec<[[f64; D]; D]>,
    points: Vec<[f64; D]>,
}

impl<const D: usize> MappingData<D> {
    /// Fails if a cell is inverted or degenerate.
    pub fn new(mesh: &Mesh<D>, fe: &FeQ<D>) -> Result<Self, KError> {
        let nq = fe.n_q_points();
        let n_cells = mesh.n_active_cells();
        let mut jxw = Vec::with_capacity(n_cells * nq);
        let mut inverse_jacobians = Vec::with_capacity(n_cells * nq);
        let mut points = Vec::with_capacity(n_cells * nq);
        for c in 0..n_cells {
            let corners = mesh.cell_vertices(c);
            for q in 0..nq {
                let xi = fe.reference_point(q);
                let jac = mesh.jacobian(&corners, xi);
                let (inv, det) = invert_small(&jac)
                    .filter(|(_, det)| *det > 0.0)
                    .ok_or_else(|| {
                        KError::InvalidParameter(format!(
                            "cell {c} is degenerate; reduce the grid distortion"
                        ))
                    })?;
                jxw.push(det * fe.reference_weight(q));
                inverse_jacobians.push(inv);
                points.push(mesh.map_point(&corners, xi));
            }
        }
        Ok(Self {
            n_q_points: nq,
            jxw,
            inverse_jacobians,
            points,
        })
    }

    pub fn n_q_points(&self) -> usize {
        self.n_q_points
    }

    #[inline]
    pub fn jxw(&self, cell: usize, q: usize) -> f64 {
        self.jxw[cell * self.n_q_points + q]
    }

    /// `J⁻¹` with `inv[i][j] = ∂ξ_i/∂x_j`.
    #[inline]
    pub fn inverse_jacobian(&self, cell: usize, q: usize) -> &[[f64; D]; D] {
        &self.inverse_jacobians[cell * self.n_q_points + q]
    }

    #[inline]
    pub fn quadrature_point(&self, cell: usize, q: usize) -> &[f64; D] {
        &self.points[cell * self.n_q_points + q]
    }

    /// Physical gradient `J⁻ᵀ ĝ` of a reference gradient.
    #[inline]
    pub fn physical_gradient(&self, cell: usize, q: usize, g_ref: &[f64; D]) -> [f64; D] {
        let inv = self.inverse_jacobian(cell, q);
        std::array::from_fn(|d| (0..D).map(|e| inv[e][d] * g_ref[e]).sum())
    }

    /// Reference-space test flux `J⁻¹ g` of a physical gradient, so that
    /// `g · ∇φ = (J⁻¹ g) · ∇̂φ`.
    #[inline]
    pub fn to_reference_flux(&self, cell: usize, q: usize, g: &[f64; D]) -> [f64; D] {
        let inv = self.inverse_jacobian(cell, q);
        std::array::from_fn(|e| (0..D).map(|d| inv[e][d] * g[d]).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn jxw_sums_to_volume_on_distorted_mesh() {
        let mut mesh = Mesh::<2>::hyper_rectangle([2, 1], [0.0, 0.0], [2.0, 1.0], 2).unwrap();
        mesh.distort_random(0.2, 11);
        let fe = FeQ::<2>::new(1, 2);
        let m = MappingData::new(&mesh, &fe).unwrap();
        let total: f64 = (0..mesh.n_active_cells())
            .flat_map(|c| (0..m.n_q_points()).map(move |q| (c, q)))
            .map(|(c, q)| m.jxw(c, q))
            .sum();
        assert_abs_diff_eq!(total, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn gradient_transforms_are_adjoint() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [2.0, 4.0], 0).unwrap();
        let fe = FeQ::<2>::new(1, 2);
        let m = MappingData::new(&mesh, &fe).unwrap();
        let g = m.physical_gradient(0, 0, &[1.0, 1.0]);
        assert_abs_diff_eq!(g[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(g[1], 0.25, epsilon = 1e-12);
        let f = m.to_reference_flux(0, 0, &[1.0, 1.0]);
        assert_abs_diff_eq!(f[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(f[1], 0.25, epsilon = 1e-12);
    }
}
