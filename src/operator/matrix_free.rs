//! Matrix-free evaluation of `mass_scale·M + laplace_scale·K` by cell-wise quadrature.
//!
//! Cells are processed independently (in parallel with the `rayon` feature) into per-cell
//! result buffers, which are then scattered into the global vector in cell order. Summation
//! order is therefore fixed and results are reproducible.
//!
//! Constrained dofs act as identity rows and are skipped as columns, so the operator stays
//! invertible on the constrained subspace and an assembled copy has unit diagonal there.

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::space::FeSpace;
use crate::matrix::CsrMatrix;
use crate::operator::SpatialOperator;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Quantities a cell kernel evaluates at quadrature points.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EvaluationFlags: u8 {
        const VALUES    = 0b01;
        const GRADIENTS = 0b10;
    }
}

pub struct MatrixFreeOperator<T, const D: usize> {
    space: Arc<FeSpace<D>>,
    mass_scale: T,
    laplace_scale: T,
    /// `coefficient[cell * n_q + q]`, absent for a uniform coefficient.
    coefficient: Option<Vec<T>>,
    /// Operator diagonal, refreshed whenever the coefficient changes.
    diagonal: Vec<T>,
}

impl<T: Scalar, const D: usize> MatrixFreeOperator<T, D> {
    pub fn new(space: Arc<FeSpace<D>>, mass_scale: T, laplace_scale: T) -> Self {
        let mut op = Self {
            space,
            mass_scale,
            laplace_scale,
            coefficient: None,
            diagonal: Vec::new(),
        };
        op.diagonal = op.compute_diagonal();
        op
    }

    /// `M` (mass only).
    pub fn mass(space: Arc<FeSpace<D>>) -> Self {
        Self::new(space, T::one(), T::zero())
    }

    /// `K` (Laplace only).
    pub fn laplace(space: Arc<FeSpace<D>>) -> Self {
        Self::new(space, T::zero(), T::one())
    }

    pub fn space(&self) -> &Arc<FeSpace<D>> {
        &self.space
    }

    pub fn flags(&self) -> EvaluationFlags {
        let mut flags = EvaluationFlags::empty();
        if self.mass_scale != T::zero() {
            flags |= EvaluationFlags::VALUES;
        }
        if self.laplace_scale != T::zero() {
            flags |= EvaluationFlags::GRADIENTS;
        }
        flags
    }

    /// Evaluate `f` once at every quadrature point; later applications use the cached values.
    pub fn set_coefficient(&mut self, f: impl Fn(&[f64; D]) -> f64 + Sync) {
        let mapping = &self.space.mapping;
        let nq = mapping.n_q_points();
        let values = (0..self.space.n_cells() * nq)
            .map(|k| T::cast_from(f(mapping.quadrature_point(k / nq, k % nq))))
            .collect();
        self.coefficient = Some(values);
        self.diagonal = self.compute_diagonal();
    }

    pub fn has_coefficient(&self) -> bool {
        self.coefficient.is_some()
    }

    /// Copy in another precision, sharing the space and keeping the cached coefficient.
    pub fn convert<U: Scalar>(&self) -> MatrixFreeOperator<U, D> {
        MatrixFreeOperator {
            space: Arc::clone(&self.space),
            mass_scale: self.mass_scale.convert(),
            laplace_scale: self.laplace_scale.convert(),
            coefficient: self
                .coefficient
                .as_ref()
                .map(|c| c.iter().map(|&v| v.convert()).collect()),
            diagonal: self.diagonal.iter().map(|&v| v.convert()).collect(),
        }
    }

    /// Sum of the cell-matrix diagonals; constrained rows get `1`.
    fn compute_diagonal(&self) -> Vec<T> {
        let space = &*self.space;
        let n = space.fe.dofs_per_cell();
        let flags = self.flags();
        let local = self.for_each_cell(n, |c, out| {
            let a = self.cell_matrix(c, flags);
            for (i, o) in out.iter_mut().enumerate() {
                *o = a[i * n + i];
            }
        });
        let mut diag = vec![0.0f64; self.n_dofs()];
        for c in 0..space.n_cells() {
            for (i, &dof) in space.dof_handler.cell_dofs(c).iter().enumerate() {
                diag[dof] += local[c * n + i];
            }
        }
        diag.iter()
            .enumerate()
            .map(|(i, &d)| {
                if space.constraints.is_constrained(i) {
                    T::one()
                } else {
                    T::cast_from(d)
                }
            })
            .collect()
    }

    #[inline]
    fn scales(&self, cell: usize, q: usize) -> (f64, f64) {
        let c = self.coefficient.as_ref().map_or(1.0, |c| {
            c[cell * self.space.mapping.n_q_points() + q].as_f64()
        });
        (self.mass_scale.as_f64() * c, self.laplace_scale.as_f64() * c)
    }

    /// Local result of one cell applied to `src`, constrained columns dropped.
    fn cell_apply(&self, cell: usize, src: &[T], flags: EvaluationFlags, out: &mut [f64]) {
        let space = &*self.space;
        let fe = &space.fe;
        let dofs = space.dof_handler.cell_dofs(cell);
        let u: Vec<f64> = dofs
            .iter()
            .map(|&d| {
                if space.constraints.is_constrained(d) {
                    0.0
                } else {
                    src[d].as_f64()
                }
            })
            .collect();
        out.iter_mut().for_each(|v| *v = 0.0);
        for q in 0..fe.n_q_points() {
            let jxw = space.mapping.jxw(cell, q);
            let (ms, ls) = self.scales(cell, q);
            if flags.contains(EvaluationFlags::VALUES) {
                let val: f64 = u.iter().enumerate().map(|(i, ui)| ui * fe.shape_value(q, i)).sum();
                let submit = ms * jxw * val;
                for (i, o) in out.iter_mut().enumerate() {
                    *o += submit * fe.shape_value(q, i);
                }
            }
            if flags.contains(EvaluationFlags::GRADIENTS) {
                let mut g_ref = [0.0; D];
                for (i, ui) in u.iter().enumerate() {
                    let g = fe.shape_grad(q, i);
                    for d in 0..D {
                        g_ref[d] += ui * g[d];
                    }
                }
                let mut g = space.mapping.physical_gradient(cell, q, &g_ref);
                g.iter_mut().for_each(|v| *v *= ls * jxw);
                let flux = space.mapping.to_reference_flux(cell, q, &g);
                for (i, o) in out.iter_mut().enumerate() {
                    let gi = fe.shape_grad(q, i);
                    *o += (0..D).map(|d| flux[d] * gi[d]).sum::<f64>();
                }
            }
        }
    }

    /// Dense local matrix of one cell, row-major `dofs_per_cell²`.
    fn cell_matrix(&self, cell: usize, flags: EvaluationFlags) -> Vec<f64> {
        let space = &*self.space;
        let fe = &space.fe;
        let n = fe.dofs_per_cell();
        let mut a = vec![0.0; n * n];
        let mut phys = vec![[0.0; D]; n];
        for q in 0..fe.n_q_points() {
            let jxw = space.mapping.jxw(cell, q);
            let (ms, ls) = self.scales(cell, q);
            if flags.contains(EvaluationFlags::GRADIENTS) {
                for (i, p) in phys.iter_mut().enumerate() {
                    *p = space.mapping.physical_gradient(cell, q, fe.shape_grad(q, i));
                }
            }
            for i in 0..n {
                for j in 0..n {
                    let mut v = 0.0;
                    if flags.contains(EvaluationFlags::VALUES) {
                        v += ms * fe.shape_value(q, i) * fe.shape_value(q, j);
                    }
                    if flags.contains(EvaluationFlags::GRADIENTS) {
                        v += ls * (0..D).map(|d| phys[i][d] * phys[j][d]).sum::<f64>();
                    }
                    a[i * n + j] += v * jxw;
                }
            }
        }
        a
    }

    /// Runs `f` on every cell into its own slice of a flat buffer.
    fn for_each_cell<F>(&self, width: usize, f: F) -> Vec<f64>
    where
        F: Fn(usize, &mut [f64]) + Sync + Send,
    {
        let mut buf = vec![0.0; self.space.n_cells() * width];
        if width == 0 {
            return buf;
        }
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            buf.par_chunks_mut(width)
                .enumerate()
                .for_each(|(c, chunk)| f(c, chunk));
        }
        #[cfg(not(feature = "rayon"))]
        for (c, chunk) in buf.chunks_mut(width).enumerate() {
            f(c, chunk);
        }
        buf
    }
}

impl<T: Scalar, const D: usize> SpatialOperator<T> for MatrixFreeOperator<T, D> {
    fn n_dofs(&self) -> usize {
        self.space.n_dofs()
    }

    fn apply(&self, dst: &mut [T], src: &[T]) {
        let space = &*self.space;
        let n = space.fe.dofs_per_cell();
        let flags = self.flags();
        let mut acc = vec![0.0f64; dst.len()];
        if !flags.is_empty() {
            let local = self.for_each_cell(n, |c, out| self.cell_apply(c, src, flags, out));
            for c in 0..space.n_cells() {
                for (i, &dof) in space.dof_handler.cell_dofs(c).iter().enumerate() {
                    acc[dof] += local[c * n + i];
                }
            }
        }
        for (i, (d, a)) in dst.iter_mut().zip(acc).enumerate() {
            *d = if space.constraints.is_constrained(i) {
                src[i]
            } else {
                T::cast_from(a)
            };
        }
    }

    fn diagonal(&self) -> Vec<T> {
        self.diagonal.clone()
    }

    fn assemble_sparse(&self) -> Result<CsrMatrix<T>, KError> {
        let space = &*self.space;
        let n = space.fe.dofs_per_cell();
        let flags = self.flags();
        let local = self.for_each_cell(n * n, |c, out| {
            out.copy_from_slice(&self.cell_matrix(c, flags));
        });
        let pattern = space.dof_handler.make_sparsity_pattern();
        let mut acc: CsrMatrix<f64> = CsrMatrix::zeros(pattern);
        let constraints = &space.constraints;
        for c in 0..space.n_cells() {
            let dofs = space.dof_handler.cell_dofs(c);
            for (i, &di) in dofs.iter().enumerate() {
                if constraints.is_constrained(di) {
                    continue;
                }
                for (j, &dj) in dofs.iter().enumerate() {
                    if constraints.is_constrained(dj) {
                        continue;
                    }
                    acc.add(di, dj, local[c * n * n + i * n + j])?;
                }
            }
        }
        for i in 0..space.n_dofs() {
            if constraints.is_constrained(i) {
                acc.add(i, i, 1.0)?;
            }
        }
        Ok(acc.convert())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::Mesh;
    use crate::matrix::SparseMatrix;
    use approx::assert_abs_diff_eq;

    fn space(constrained: bool, distort: f64) -> Arc<FeSpace<2>> {
        let mut mesh = Mesh::<2>::hyper_rectangle([2, 1], [0.0, 0.0], [2.0, 1.0], 2).unwrap();
        if distort > 0.0 {
            mesh.distort_random(distort, 1);
        }
        Arc::new(FeSpace::with_quadrature(mesh, 2, 3, constrained).unwrap())
    }

    #[test]
    fn flags_follow_scales() {
        let s = space(true, 0.0);
        assert_eq!(MatrixFreeOperator::<f64, 2>::mass(s.clone()).flags(), EvaluationFlags::VALUES);
        assert_eq!(
            MatrixFreeOperator::<f64, 2>::new(s, 1.0, 2.0).flags(),
            EvaluationFlags::VALUES | EvaluationFlags::GRADIENTS
        );
    }

    #[test]
    fn laplace_annihilates_constants_without_constraints() {
        let s = space(false, 0.15);
        let k = MatrixFreeOperator::<f64, 2>::laplace(s.clone());
        let ones = vec![1.0; s.n_dofs()];
        let mut out = vec![0.0; s.n_dofs()];
        k.apply(&mut out, &ones);
        assert!(out.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn sparse_matches_apply_with_coefficient() {
        let s = space(true, 0.1);
        let mut op = MatrixFreeOperator::<f64, 2>::new(s.clone(), 0.5, 1.0);
        op.set_coefficient(|p| 1.0 + p[0] * p[1]);
        let a = op.assemble_sparse().unwrap();
        let x: Vec<f64> = (0..s.n_dofs()).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
        let mut y1 = vec![0.0; s.n_dofs()];
        let mut y2 = vec![0.0; s.n_dofs()];
        op.apply(&mut y1, &x);
        a.spmv(&x, &mut y2);
        for (u, v) in y1.iter().zip(&y2) {
            assert_abs_diff_eq!(u, v, epsilon = 1e-10 * (1.0 + u.abs()));
        }
        let d = op.diagonal();
        for (i, di) in d.iter().enumerate() {
            assert_abs_diff_eq!(*di, a.get(i, i), epsilon = 1e-12);
        }
        assert!(matches!(op.el(0, 0), Err(KError::Unsupported(_))));
    }

    #[test]
    fn cached_diagonal_follows_coefficient() {
        let s = space(true, 0.1);
        let mut op = MatrixFreeOperator::<f64, 2>::laplace(s.clone());
        let plain = op.diagonal();
        op.set_coefficient(|_| 3.0);
        let scaled = op.diagonal();
        for (i, (p, q)) in plain.iter().zip(&scaled).enumerate() {
            if s.constraints.is_constrained(i) {
                assert_eq!(*q, 1.0);
            } else {
                assert_abs_diff_eq!(*q, 3.0 * p, epsilon = 1e-12 * p.abs());
            }
        }
        let op32: MatrixFreeOperator<f32, 2> = op.convert();
        for (a, b) in scaled.iter().zip(op32.diagonal()) {
            assert!((a - b as f64).abs() < 1e-5 * a.abs());
        }
    }

    #[test]
    fn single_precision_copy_agrees() {
        let s = space(true, 0.0);
        let op = MatrixFreeOperator::<f64, 2>::new(s.clone(), 1.0, 1.0);
        let op32: MatrixFreeOperator<f32, 2> = op.convert();
        let x: Vec<f64> = (0..s.n_dofs()).map(|i| (i as f64 * 0.1).sin()).collect();
        let x32: Vec<f32> = x.iter().map(|&v| v as f32).collect();
        let mut y = vec![0.0; s.n_dofs()];
        let mut y32 = vec![0.0f32; s.n_dofs()];
        op.apply(&mut y, &x);
        op32.apply(&mut y32, &x32);
        for (a, b) in y.iter().zip(&y32) {
            assert!((a - *b as f64).abs() < 1e-4 * (1.0 + a.abs()));
        }
    }
}
