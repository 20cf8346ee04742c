//! Grid transfer between neighbouring space-time levels.
//!
//! Prolongation is the exact embedding of the coarse space-time function into the fine one:
//! in space the coarse `Q_p` function is evaluated at the fine nodes of the refined cells,
//! in time the coarse trial basis is evaluated at the fine unknown nodes. Restriction is the
//! transpose of prolongation.

use crate::core::block_vector::{BlockVector, add_scaled};
use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::lagrange::LagrangeBasis;
use crate::fe::mesh::unravel_dims;
use crate::fe::space::FeSpace;
use crate::matrix::{CsrMatrix, SparseMatrix, SparsityPattern, dense};
use crate::multigrid::sequence::TimeLevel;
use crate::time::TimeBasis;
use faer::Mat;

const DROP_TOL: f64 = 1e-14;

/// Weights `(coarse node, value)` of every fine node along one direction.
fn prolongation_1d(basis: &LagrangeBasis, coarse_cells: usize) -> Vec<Vec<(usize, f64)>> {
    let p = basis.len() - 1;
    let nodes = basis.nodes();
    let n_fine = 2 * coarse_cells * p + 1;
    (0..n_fine)
        .map(|a| {
            let (fc, lf) = if a + 1 == n_fine {
                (2 * coarse_cells - 1, p)
            } else {
                (a / p, a % p)
            };
            let cc = fc / 2;
            let xi = ((fc % 2) as f64 + nodes[lf]) / 2.0;
            (0..=p)
                .filter_map(|l| {
                    let v = basis.value(l, xi);
                    (v.abs() > DROP_TOL).then_some((cc * p + l, v))
                })
                .collect()
        })
        .collect()
}

/// Embedding of `coarse` into `fine` as a sparse `n_fine × n_coarse` matrix.
///
/// Rows of constrained fine dofs are empty and constrained coarse columns are dropped.
pub fn spatial_prolongation<T: Scalar, const D: usize>(
    fine: &FeSpace<D>,
    coarse: &FeSpace<D>,
) -> Result<CsrMatrix<T>, KError> {
    let p = fine.dof_handler.degree();
    if coarse.dof_handler.degree() != p {
        return Err(KError::mismatch("transfer element degree", p, coarse.dof_handler.degree()));
    }
    let fc = *fine.mesh.cells_per_dir();
    let cc = *coarse.mesh.cells_per_dir();
    for d in 0..D {
        if fc[d] != 2 * cc[d] {
            return Err(KError::mismatch("refined cells per direction", 2 * cc[d], fc[d]));
        }
    }
    let one_d: Vec<Vec<Vec<(usize, f64)>>> = (0..D)
        .map(|d| prolongation_1d(fine.fe.basis_1d(), cc[d]))
        .collect();
    let n_fine = fine.n_dofs();
    let mut rows: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n_fine);
    for i in 0..n_fine {
        let mut row = Vec::new();
        if !fine.constraints.is_constrained(i) {
            let idx = fine.dof_handler.node_multi_index(i);
            let widths: [usize; D] = std::array::from_fn(|d| one_d[d][idx[d]].len());
            let combos: usize = widths.iter().product();
            for k in 0..combos {
                let pick = unravel_dims(k, &widths);
                let mut v = 1.0;
                let mut cidx = [0usize; D];
                for d in 0..D {
                    let (c, w) = one_d[d][idx[d]][pick[d]];
                    cidx[d] = c;
                    v *= w;
                }
                let j = coarse.dof_handler.node_index(&cidx);
                if !coarse.constraints.is_constrained(j) {
                    row.push((j, v));
                }
            }
        }
        rows.push(row);
    }
    let pattern = SparsityPattern::from_rows(
        coarse.n_dofs(),
        rows.iter().map(|r| r.iter().map(|&(j, _)| j).collect()).collect(),
    );
    let mut out = CsrMatrix::<f64>::zeros(pattern);
    for (i, row) in rows.iter().enumerate() {
        for &(j, v) in row {
            out.add(i, j, v)?;
        }
    }
    Ok(out.convert())
}

/// Coarse time basis evaluated at the fine unknown nodes, `fine blocks × coarse blocks`.
///
/// For continuous schemes the start node of a coarse step is the last unknown of the previous
/// coarse step; on the first step it is the known slab start value and carries no correction.
pub fn temporal_prolongation(fine: &TimeLevel, coarse: &TimeLevel) -> Result<Mat<f64>, KError> {
    if fine.kind != coarse.kind {
        return Err(KError::InvalidParameter("time transfer between different schemes".into()));
    }
    let slab_f = fine.tau * fine.n_steps as f64;
    let slab_c = coarse.tau * coarse.n_steps as f64;
    if (slab_f - slab_c).abs() > 1e-12 * slab_f.max(slab_c) {
        return Err(KError::InvalidParameter(format!(
            "time levels cover different slabs: {slab_f} vs {slab_c}"
        )));
    }
    let fb = TimeBasis::new(fine.kind, fine.k)?;
    let cb = TimeBasis::new(coarse.kind, coarse.k)?;
    let (mf, mc) = (fb.dofs_per_step(), cb.dofs_per_step());
    let cgp = fine.kind.is_cgp();
    let ratio = coarse.n_steps as f64 / fine.n_steps as f64;
    let mut out = dense::zeros::<f64>(mf * fine.n_steps, mc * coarse.n_steps);
    for sf in 0..fine.n_steps {
        for (i, &node) in fb.unknown_nodes().iter().enumerate() {
            let y = (sf as f64 + node) * ratio;
            let sc = ((y - 1e-12).ceil() as usize).saturating_sub(1).min(coarse.n_steps - 1);
            let xi = (y - sc as f64).clamp(0.0, 1.0);
            for j in 0..cb.trial().len() {
                let v = cb.trial().value(j, xi);
                if v.abs() <= DROP_TOL {
                    continue;
                }
                let col = if cgp {
                    if j == 0 {
                        if sc == 0 {
                            continue;
                        }
                        sc * mc - 1
                    } else {
                        sc * mc + j - 1
                    }
                } else {
                    sc * mc + j
                };
                out[(sf * mf + i, col)] += v;
            }
        }
    }
    Ok(out)
}

/// Transfer from a level to the next coarser one. `None` parts are identities.
pub struct SpaceTimeTransfer<T> {
    space: Option<CsrMatrix<T>>,
    time: Option<Mat<T>>,
    n_fine_blocks: usize,
    n_coarse_blocks: usize,
    n_fine_dofs: usize,
    n_coarse_dofs: usize,
}

impl<T: Scalar> SpaceTimeTransfer<T> {
    pub fn new(
        space: Option<CsrMatrix<T>>,
        time: Option<Mat<T>>,
        n_blocks: (usize, usize),
        n_dofs: (usize, usize),
    ) -> Result<Self, KError> {
        if let Some(p) = &space {
            if (p.nrows(), p.ncols()) != n_dofs {
                return Err(KError::mismatch("spatial transfer rows", n_dofs.0, p.nrows()));
            }
        } else if n_dofs.0 != n_dofs.1 {
            return Err(KError::mismatch("identity spatial transfer", n_dofs.0, n_dofs.1));
        }
        if let Some(p) = &time {
            if (p.nrows(), p.ncols()) != n_blocks {
                return Err(KError::mismatch("temporal transfer rows", n_blocks.0, p.nrows()));
            }
        } else if n_blocks.0 != n_blocks.1 {
            return Err(KError::mismatch("identity temporal transfer", n_blocks.0, n_blocks.1));
        }
        Ok(Self {
            space,
            time,
            n_fine_blocks: n_blocks.0,
            n_coarse_blocks: n_blocks.1,
            n_fine_dofs: n_dofs.0,
            n_coarse_dofs: n_dofs.1,
        })
    }

    /// `fine = P coarse`.
    pub fn prolongate(&self, coarse: &BlockVector<T>, fine: &mut BlockVector<T>) {
        let in_time = match &self.time {
            Some(pt) => {
                let mut tmp = BlockVector::new(self.n_fine_blocks, self.n_coarse_dofs);
                for i in 0..self.n_fine_blocks {
                    for j in 0..self.n_coarse_blocks {
                        let w = pt[(i, j)];
                        if w != T::zero() {
                            add_scaled(tmp.block_mut(i), w, coarse.block(j));
                        }
                    }
                }
                tmp
            }
            None => coarse.clone(),
        };
        match &self.space {
            Some(ps) => {
                for i in 0..self.n_fine_blocks {
                    ps.spmv(in_time.block(i), fine.block_mut(i));
                }
            }
            None => fine.as_mut().copy_from_slice(in_time.as_ref()),
        }
    }

    /// `coarse = Pᵀ fine`.
    pub fn restrict(&self, fine: &BlockVector<T>, coarse: &mut BlockVector<T>) {
        let in_space = match &self.space {
            Some(ps) => {
                let mut tmp = BlockVector::new(self.n_fine_blocks, self.n_coarse_dofs);
                for i in 0..self.n_fine_blocks {
                    ps.spmv_transpose(fine.block(i), tmp.block_mut(i));
                }
                tmp
            }
            None => fine.clone(),
        };
        match &self.time {
            Some(pt) => {
                coarse.fill(T::zero());
                for j in 0..self.n_coarse_blocks {
                    for i in 0..self.n_fine_blocks {
                        let w = pt[(i, j)];
                        if w != T::zero() {
                            add_scaled(coarse.block_mut(j), w, in_space.block(i));
                        }
                    }
                }
            }
            None => coarse.as_mut().copy_from_slice(in_space.as_ref()),
        }
    }

    pub fn n_fine_dofs(&self) -> usize {
        self.n_fine_dofs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::Mesh;
    use crate::fe::tools::interpolate;
    use crate::time::TimeStepType;

    #[test]
    fn spatial_embedding_reproduces_coarse_polynomials() {
        let fine_mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
        let coarse_mesh = fine_mesh.coarsen().unwrap();
        let fine = FeSpace::with_quadrature(fine_mesh, 2, 3, false).unwrap();
        let coarse = FeSpace::with_quadrature(coarse_mesh, 2, 3, false).unwrap();
        let p: CsrMatrix<f64> = spatial_prolongation(&fine, &coarse).unwrap();
        let f = |x: &[f64; 2]| x[0] * x[0] - 3.0 * x[0] * x[1] + x[1];
        let uc: Vec<f64> = interpolate(&coarse, f);
        let uf: Vec<f64> = interpolate(&fine, f);
        let mut out = vec![0.0; fine.n_dofs()];
        p.spmv(&uc, &mut out);
        for (a, b) in out.iter().zip(&uf) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn constrained_rows_and_columns_vanish() {
        let fine_mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
        let coarse_mesh = fine_mesh.coarsen().unwrap();
        let fine = FeSpace::new(fine_mesh, 1).unwrap();
        let coarse = FeSpace::new(coarse_mesh, 1).unwrap();
        let p: CsrMatrix<f64> = spatial_prolongation(&fine, &coarse).unwrap();
        for i in 0..fine.n_dofs() {
            let row: Vec<(usize, f64)> = p.row(i).collect();
            if fine.constraints.is_constrained(i) {
                assert!(row.is_empty());
            }
            assert!(row.iter().all(|&(j, _)| !coarse.constraints.is_constrained(j)));
        }
    }

    #[test]
    fn temporal_identity_and_step_halving() {
        let fine = TimeLevel {
            kind: TimeStepType::Dg,
            k: 1,
            n_steps: 2,
            tau: 0.5,
        };
        let same = temporal_prolongation(&fine, &fine).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let e = if i == j { 1.0 } else { 0.0 };
                assert!((same[(i, j)] - e).abs() < 1e-12);
            }
        }
        // CG(1) with two steps onto one step: the fine midpoint value is the coarse average.
        let fine = TimeLevel {
            kind: TimeStepType::Cgp,
            k: 1,
            n_steps: 2,
            tau: 0.5,
        };
        let coarse = TimeLevel {
            n_steps: 1,
            tau: 1.0,
            ..fine
        };
        let p = temporal_prolongation(&fine, &coarse).unwrap();
        assert_eq!((p.nrows(), p.ncols()), (2, 1));
        assert!((p[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((p[(1, 0)] - 1.0).abs() < 1e-12);
        let bad = TimeLevel { tau: 0.7, ..coarse };
        assert!(temporal_prolongation(&fine, &bad).is_err());
    }

    #[test]
    fn restriction_is_transpose() {
        let fine = TimeLevel {
            kind: TimeStepType::Dg,
            k: 1,
            n_steps: 2,
            tau: 0.5,
        };
        let coarse = TimeLevel { k: 0, ..fine };
        let pt = temporal_prolongation(&fine, &coarse).unwrap();
        let t = SpaceTimeTransfer::<f64>::new(None, Some(pt), (4, 2), (3, 3)).unwrap();
        let xc = BlockVector::from_blocks(&[vec![1.0, 2.0, 3.0], vec![-1.0, 0.5, 0.0]]);
        let yf = BlockVector::from_blocks(&[
            vec![0.1, 0.2, 0.3],
            vec![1.0, 0.0, -1.0],
            vec![2.0, 2.0, 2.0],
            vec![0.0, 1.0, 0.0],
        ]);
        let mut pxc = yf.zeros_like();
        t.prolongate(&xc, &mut pxc);
        let mut ryf = xc.zeros_like();
        t.restrict(&yf, &mut ryf);
        let lhs: f64 = pxc.as_ref().iter().zip(yf.as_ref()).map(|(a, b)| a * b).sum();
        let rhs: f64 = xc.as_ref().iter().zip(ryf.as_ref()).map(|(a, b)| a * b).sum();
        assert!((lhs - rhs).abs() < 1e-12);
    }
}
