//! Structured hexahedral meshes of a subdivided hyperrectangle.
//!
//! A [`Mesh`] covers `[lower, upper]` with `subdivisions[d]` base cells per direction, refined
//! globally `refinement` times. Vertices are stored explicitly in lexicographic order so that
//! interior vertices can be moved by [`Mesh::distort_random`]; every cell maps from `[0,1]^D`
//! through the multilinear interpolation of its `2^D` corners.

use crate::error::KError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh<const D: usize> {
    lower: [f64; D],
    upper: [f64; D],
    subdivisions: [usize; D],
    refinement: usize,
    cells_per_dir: [usize; D],
    vertices: Vec<[f64; D]>,
}

impl<const D: usize> Mesh<D> {
    /// Subdivided hyperrectangle refined `refinement` times.
    pub fn hyper_rectangle(
        subdivisions: [usize; D],
        lower: [f64; D],
        upper: [f64; D],
        refinement: usize,
    ) -> Result<Self, KError> {
        if subdivisions.iter().any(|&s| s == 0) {
            return Err(KError::InvalidParameter("subdivisions must be positive".into()));
        }
        if (0..D).any(|d| upper[d] <= lower[d]) {
            return Err(KError::InvalidParameter(
                "upper right corner must exceed lower left corner".into(),
            ));
        }
        let cells_per_dir: [usize; D] = std::array::from_fn(|d| subdivisions[d] << refinement);
        let n_vert: usize = cells_per_dir.iter().map(|c| c + 1).product();
        let mut vertices = Vec::with_capacity(n_vert);
        for v in 0..n_vert {
            let idx = unravel_dims(v, &cells_per_dir.map(|c| c + 1));
            vertices.push(std::array::from_fn(|d| {
                lower[d] + (upper[d] - lower[d]) * idx[d] as f64 / cells_per_dir[d] as f64
            }));
        }
        Ok(Self {
            lower,
            upper,
            subdivisions,
            refinement,
            cells_per_dir,
            vertices,
        })
    }

    pub fn lower(&self) -> &[f64; D] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64; D] {
        &self.upper
    }

    pub fn subdivisions(&self) -> &[usize; D] {
        &self.subdivisions
    }

    pub fn refinement(&self) -> usize {
        self.refinement
    }

    pub fn cells_per_dir(&self) -> &[usize; D] {
        &self.cells_per_dir
    }

    pub fn n_active_cells(&self) -> usize {
        self.cells_per_dir.iter().product()
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, v: usize) -> &[f64; D] {
        &self.vertices[v]
    }

    /// Measure of the domain.
    pub fn volume(&self) -> f64 {
        (0..D).map(|d| self.upper[d] - self.lower[d]).product()
    }

    pub fn cell_multi_index(&self, c: usize) -> [usize; D] {
        unravel_dims(c, &self.cells_per_dir)
    }

    pub fn cell_index(&self, idx: &[usize; D]) -> usize {
        ravel_dims(idx, &self.cells_per_dir)
    }

    fn vertex_index(&self, idx: &[usize; D]) -> usize {
        ravel_dims(idx, &self.cells_per_dir.map(|c| c + 1))
    }

    /// Corner coordinates of cell `c`; corner `v` sits at offset `(v >> d) & 1` in direction `d`.
    pub fn cell_vertices(&self, c: usize) -> Vec<[f64; D]> {
        let base = self.cell_multi_index(c);
        (0..1usize << D)
            .map(|v| {
                let idx: [usize; D] = std::array::from_fn(|d| base[d] + ((v >> d) & 1));
                self.vertices[self.vertex_index(&idx)]
            })
            .collect()
    }

    /// Cell of the unrefined base mesh that contains cell `c`.
    pub fn base_cell_of(&self, c: usize) -> [usize; D] {
        self.cell_multi_index(c).map(|i| i >> self.refinement)
    }

    /// Undistorted base-cell diameter, the smallest over the base mesh.
    pub fn base_minimal_cell_diameter(&self) -> f64 {
        (0..D)
            .map(|d| {
                let h = (self.upper[d] - self.lower[d]) / self.subdivisions[d] as f64;
                h * h
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Smallest distance between two corners of the same cell, minimized over all cells.
    pub fn minimal_cell_diameter(&self) -> f64 {
        (0..self.n_active_cells())
            .map(|c| {
                let v = self.cell_vertices(c);
                let mut diam: f64 = 0.0;
                for a in 0..v.len() {
                    for b in a + 1..v.len() {
                        diam = diam.max(distance(&v[a], &v[b]));
                    }
                }
                diam
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Move every interior vertex by `factor` times the local mesh size in a random direction.
    ///
    /// Boundary vertices stay in place so the domain is preserved.
    pub fn distort_random(&mut self, factor: f64, seed: u64) {
        let h_min = (0..D)
            .map(|d| (self.upper[d] - self.lower[d]) / self.cells_per_dir[d] as f64)
            .fold(f64::INFINITY, f64::min);
        let mut rng = StdRng::seed_from_u64(seed);
        let dims = self.cells_per_dir.map(|c| c + 1);
        for v in 0..self.vertices.len() {
            let idx = unravel_dims(v, &dims);
            let shift: [f64; D] = std::array::from_fn(|_| rng.gen_range(-1.0..=1.0));
            let interior = (0..D).all(|d| idx[d] > 0 && idx[d] < self.cells_per_dir[d]);
            if !interior {
                continue;
            }
            let norm = shift.iter().map(|s| s * s).sum::<f64>().sqrt();
            if norm == 0.0 {
                continue;
            }
            for d in 0..D {
                self.vertices[v][d] += factor * h_min * shift[d] / norm;
            }
        }
    }

    /// Mesh one refinement level coarser, reusing every other vertex.
    pub fn coarsen(&self) -> Option<Self> {
        if self.refinement == 0 {
            return None;
        }
        let cells_per_dir: [usize; D] = self.cells_per_dir.map(|c| c / 2);
        let dims = cells_per_dir.map(|c| c + 1);
        let n_vert: usize = dims.iter().product();
        let vertices = (0..n_vert)
            .map(|v| {
                let idx = unravel_dims(v, &dims).map(|i| 2 * i);
                self.vertices[self.vertex_index(&idx)]
            })
            .collect();
        Some(Self {
            lower: self.lower,
            upper: self.upper,
            subdivisions: self.subdivisions,
            refinement: self.refinement - 1,
            cells_per_dir,
            vertices,
        })
    }

    /// Image of reference point `xi` in cell `c`.
    pub fn map_point(&self, corners: &[[f64; D]], xi: &[f64; D]) -> [f64; D] {
        let mut x = [0.0; D];
        for (v, corner) in corners.iter().enumerate() {
            let n = q1_shape(v, xi);
            for d in 0..D {
                x[d] += n * corner[d];
            }
        }
        x
    }

    /// Jacobian `J[i][j] = ∂x_i/∂ξ_j` of the multilinear cell map at `xi`.
    pub fn jacobian(&self, corners: &[[f64; D]], xi: &[f64; D]) -> [[f64; D]; D] {
        let mut jac = [[0.0; D]; D];
        for (v, corner) in corners.iter().enumerate() {
            for j in 0..D {
                let dn = q1_shape_derivative(v, j, xi);
                for i in 0..D {
                    jac[i][j] += corner[i] * dn;
                }
            }
        }
        jac
    }

    /// Reference coordinates of `p` if it lies in cell `c` (Newton inversion of the cell map).
    pub fn inverse_map(&self, c: usize, p: &[f64; D]) -> Option<[f64; D]> {
        let corners = self.cell_vertices(c);
        for d in 0..D {
            let lo = corners.iter().map(|v| v[d]).fold(f64::INFINITY, f64::min);
            let hi = corners.iter().map(|v| v[d]).fold(f64::NEG_INFINITY, f64::max);
            let tol = 1e-10 * (hi - lo);
            if p[d] < lo - tol || p[d] > hi + tol {
                return None;
            }
        }
        let mut xi = [0.5; D];
        for _ in 0..50 {
            let x = self.map_point(&corners, &xi);
            let res: [f64; D] = std::array::from_fn(|d| p[d] - x[d]);
            let jac = self.jacobian(&corners, &xi);
            let (inv, _) = invert_small(&jac)?;
            let mut step_norm: f64 = 0.0;
            for i in 0..D {
                let dxi: f64 = (0..D).map(|j| inv[i][j] * res[j]).sum();
                xi[i] += dxi;
                step_norm = step_norm.max(dxi.abs());
            }
            if step_norm < 1e-14 {
                break;
            }
        }
        let eps = 1e-10;
        xi.iter()
            .all(|&s| (-eps..=1.0 + eps).contains(&s))
            .then(|| xi.map(|s| s.clamp(0.0, 1.0)))
    }

    /// First cell containing `p`, with the reference coordinates of `p` in it.
    pub fn locate(&self, p: &[f64; D]) -> Option<(usize, [f64; D])> {
        (0..self.n_active_cells()).find_map(|c| self.inverse_map(c, p).map(|xi| (c, xi)))
    }
}

/// Bilinear/trilinear shape function of corner `v`.
pub fn q1_shape<const D: usize>(v: usize, xi: &[f64; D]) -> f64 {
    (0..D)
        .map(|d| if (v >> d) & 1 == 1 { xi[d] } else { 1.0 - xi[d] })
        .product()
}

fn q1_shape_derivative<const D: usize>(v: usize, j: usize, xi: &[f64; D]) -> f64 {
    (0..D)
        .map(|d| {
            let up = (v >> d) & 1 == 1;
            match (d == j, up) {
                (true, true) => 1.0,
                (true, false) => -1.0,
                (false, true) => xi[d],
                (false, false) => 1.0 - xi[d],
            }
        })
        .product()
}

/// Inverse and determinant of a 2x2 or 3x3 matrix; `None` if singular.
pub fn invert_small<const D: usize>(a: &[[f64; D]; D]) -> Option<([[f64; D]; D], f64)> {
    let mut inv = [[0.0; D]; D];
    let det = match D {
        1 => {
            let det = a[0][0];
            if det == 0.0 {
                return None;
            }
            inv[0][0] = 1.0 / det;
            det
        }
        2 => {
            let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
            if det == 0.0 {
                return None;
            }
            inv[0][0] = a[1][1] / det;
            inv[0][1] = -a[0][1] / det;
            inv[1][0] = -a[1][0] / det;
            inv[1][1] = a[0][0] / det;
            det
        }
        3 => {
            let cof = |i: usize, j: usize| {
                let (r0, r1) = ((i + 1) % 3, (i + 2) % 3);
                let (c0, c1) = ((j + 1) % 3, (j + 2) % 3);
                a[r0][c0] * a[r1][c1] - a[r0][c1] * a[r1][c0]
            };
            let det = a[0][0] * cof(0, 0) + a[0][1] * cof(0, 1) + a[0][2] * cof(0, 2);
            if det == 0.0 {
                return None;
            }
            for i in 0..3 {
                for j in 0..3 {
                    inv[j][i] = cof(i, j) / det;
                }
            }
            det
        }
        _ => return None,
    };
    Some((inv, det))
}

fn distance<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    (0..D).map(|d| (a[d] - b[d]).powi(2)).sum::<f64>().sqrt()
}

pub(crate) fn unravel_dims<const D: usize>(mut idx: usize, dims: &[usize; D]) -> [usize; D] {
    let mut out = [0; D];
    for d in 0..D {
        out[d] = idx % dims[d];
        idx /= dims[d];
    }
    out
}

pub(crate) fn ravel_dims<const D: usize>(idx: &[usize; D], dims: &[usize; D]) -> usize {
    let mut out = 0;
    for d in (0..D).rev() {
        out = out * dims[d] + idx[d];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn refined_rectangle_layout() {
        let m = Mesh::<2>::hyper_rectangle([2, 1], [0.0, 0.0], [2.0, 1.0], 2).unwrap();
        assert_eq!(m.n_active_cells(), 8 * 4);
        assert_eq!(m.n_vertices(), 9 * 5);
        assert_abs_diff_eq!(m.volume(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.base_minimal_cell_diameter(), 2f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(m.minimal_cell_diameter(), 0.25 * 2f64.sqrt(), epsilon = 1e-14);
        assert_eq!(m.base_cell_of(m.cell_index(&[5, 3])), [1, 0]);
        let c = m.coarsen().unwrap();
        assert_eq!(c.cells_per_dir(), &[4, 2]);
        assert_eq!(c.refinement(), 1);
    }

    #[test]
    fn distortion_keeps_boundary_and_is_deterministic() {
        let mut a = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
        let mut b = a.clone();
        a.distort_random(0.2, 7);
        b.distort_random(0.2, 7);
        assert_eq!(a, b);
        assert_eq!(a.vertex(0), &[0.0, 0.0]);
        assert_eq!(a.vertex(4), &[1.0, 0.0]);
        assert_ne!(a.vertex(6), &[0.25, 0.25]);
    }

    #[test]
    fn inverse_map_locates_points() {
        let mut m = Mesh::<3>::hyper_rectangle([1, 1, 1], [0.0; 3], [1.0; 3], 1).unwrap();
        m.distort_random(0.1, 3);
        let p = [0.3, 0.6, 0.8];
        let (c, xi) = m.locate(&p).unwrap();
        let corners = m.cell_vertices(c);
        let x = m.map_point(&corners, &xi);
        for d in 0..3 {
            assert_abs_diff_eq!(x[d], p[d], epsilon = 1e-12);
        }
    }

    #[test]
    fn jacobian_of_scaled_cell() {
        let m = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [2.0, 3.0], 0).unwrap();
        let corners = m.cell_vertices(0);
        let j = m.jacobian(&corners, &[0.3, 0.7]);
        assert_abs_diff_eq!(j[0][0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(j[1][1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(j[0][1], 0.0, epsilon = 1e-12);
        let (_, det) = invert_small(&j).unwrap();
        assert_abs_diff_eq!(det, 6.0, epsilon = 1e-12);
    }
}
