//! Degree-of-freedom numbering for continuous `Q_p` elements on a structured [`Mesh`].
//!
//! Global nodes form a lexicographic grid with `cells·p + 1` nodes per direction; the dofs of
//! a cell are listed in the element's local lexicographic order.

use crate::fe::lagrange::{FeQ, unravel};
use crate::fe::mesh::{Mesh, ravel_dims, unravel_dims};
use crate::matrix::SparsityPattern;

#[derive(Clone, Debug)]
pub struct DofHandler<const D: usize> {
    degree: usize,
    nodes_per_dir: [usize; D],
    dofs_per_cell: usize,
    cell_dofs: Vec<usize>,
}

impl<const D: usize> DofHandler<D> {
    pub fn new(mesh: &Mesh<D>, degree: usize) -> Self {
        let cells = *mesh.cells_per_dir();
        let nodes_per_dir: [usize; D] = std::array::from_fn(|d| cells[d] * degree + 1);
        let n1 = degree + 1;
        let dofs_per_cell = n1.pow(D as u32);
        let n_cells = mesh.n_active_cells();
        let mut cell_dofs = Vec::with_capacity(n_cells * dofs_per_cell);
        for c in 0..n_cells {
            let base = mesh.cell_multi_index(c);
            for i in 0..dofs_per_cell {
                let li = unravel::<D>(i, n1);
                let gi: [usize; D] = std::array::from_fn(|d| base[d] * degree + li[d]);
                cell_dofs.push(ravel_dims(&gi, &nodes_per_dir));
            }
        }
        Self {
            degree,
            nodes_per_dir,
            dofs_per_cell,
            cell_dofs,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn n_dofs(&self) -> usize {
        self.nodes_per_dir.iter().product()
    }

    pub fn n_cells(&self) -> usize {
        self.cell_dofs.len() / self.dofs_per_cell
    }

    pub fn dofs_per_cell(&self) -> usize {
        self.dofs_per_cell
    }

    pub fn nodes_per_dir(&self) -> &[usize; D] {
        &self.nodes_per_dir
    }

    pub fn cell_dofs(&self, c: usize) -> &[usize] {
        &self.cell_dofs[c * self.dofs_per_cell..(c + 1) * self.dofs_per_cell]
    }

    pub fn node_multi_index(&self, dof: usize) -> [usize; D] {
        unravel_dims(dof, &self.nodes_per_dir)
    }

    pub fn node_index(&self, idx: &[usize; D]) -> usize {
        ravel_dims(idx, &self.nodes_per_dir)
    }

    /// Whether `dof` sits on the domain boundary.
    pub fn is_boundary_dof(&self, dof: usize) -> bool {
        let idx = self.node_multi_index(dof);
        (0..D).any(|d| idx[d] == 0 || idx[d] + 1 == self.nodes_per_dir[d])
    }

    /// Physical coordinates of every node.
    pub fn support_points(&self, mesh: &Mesh<D>, fe: &FeQ<D>) -> Vec<[f64; D]> {
        let mut pts = vec![[0.0; D]; self.n_dofs()];
        for c in 0..self.n_cells() {
            let corners = mesh.cell_vertices(c);
            for (i, &dof) in self.cell_dofs(c).iter().enumerate() {
                pts[dof] = mesh.map_point(&corners, &fe.node(i));
            }
        }
        pts
    }

    /// All couplings between dofs sharing a cell.
    pub fn make_sparsity_pattern(&self) -> SparsityPattern {
        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); self.n_dofs()];
        for c in 0..self.n_cells() {
            let dofs = self.cell_dofs(c);
            for &i in dofs {
                rows[i].extend_from_slice(dofs);
            }
        }
        SparsityPattern::from_rows(self.n_dofs(), rows)
    }

    /// Cells adjacent to each dof.
    pub fn dof_to_cells(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n_dofs()];
        for c in 0..self.n_cells() {
            for &dof in self.cell_dofs(c) {
                out[dof].push(c);
            }
        }
        out
    }
}
