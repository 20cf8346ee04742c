//! Vanka-type space-time patch smoother.
//!
//! Every patch collects a set of spatial dofs together with all time blocks of the slab. Its
//! local matrix `Alpha ⊗ K_pp + Beta ⊗ M_pp` is extracted from the assembled spatial matrices
//! and factored once during setup. An application solves all patch systems independently and
//! sums the local solutions, weighted by the inverse number of patches sharing each dof and
//! by the damping factor.
//!
//! Local unknowns are numbered block-major: entry `b·|S| + s` is spatial dof `S[s]` of time
//! block `b`.

use crate::core::block_vector::BlockVector;
use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::mesh::unravel_dims;
use crate::fe::space::FeSpace;
use crate::matrix::{CsrMatrix, dense};
use crate::operator::BlockSystemOperator;
use crate::preconditioner::Preconditioner;
use crate::solver::direct_lu::LuSolver;
use faer::Mat;
use serde::{Deserialize, Serialize};

/// Shape of the spatial patches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    /// Dofs strictly inside the union of the cells around a vertex.
    #[default]
    Vertex,
    /// All dofs of one closed cell.
    Cell,
}

/// Unconstrained dofs of every patch of `space`, each list sorted. Empty patches are dropped.
pub fn build_patches<const D: usize>(space: &FeSpace<D>, kind: PatchType) -> Vec<Vec<usize>> {
    let dh = &space.dof_handler;
    let free = |d: &usize| !space.constraints.is_constrained(*d);
    let mut patches: Vec<Vec<usize>> = match kind {
        PatchType::Cell => (0..space.n_cells())
            .map(|c| {
                let mut p: Vec<usize> = dh.cell_dofs(c).iter().copied().filter(free).collect();
                p.sort_unstable();
                p
            })
            .collect(),
        PatchType::Vertex => {
            let p = dh.degree();
            let nodes = *dh.nodes_per_dir();
            let vdims = space.mesh.cells_per_dir().map(|c| c + 1);
            (0..space.mesh.n_vertices())
                .map(|v| {
                    let center = unravel_dims(v, &vdims).map(|i| i * p);
                    let lo: [usize; D] = std::array::from_fn(|d| (center[d] + 1).saturating_sub(p));
                    let hi: [usize; D] =
                        std::array::from_fn(|d| (center[d] + p - 1).min(nodes[d] - 1));
                    let extent: [usize; D] = std::array::from_fn(|d| hi[d] + 1 - lo[d]);
                    let count: usize = extent.iter().product();
                    let mut patch: Vec<usize> = (0..count)
                        .map(|k| {
                            let off = unravel_dims(k, &extent);
                            dh.node_index(&std::array::from_fn(|d| lo[d] + off[d]))
                        })
                        .filter(free)
                        .collect();
                    patch.sort_unstable();
                    patch
                })
                .collect()
        }
    };
    patches.retain(|p| !p.is_empty());
    patches
}

pub struct PreconditionVanka<T> {
    patches: Vec<Vec<usize>>,
    solvers: Vec<LuSolver<T>>,
    weights: Vec<T>,
    damping: T,
    n_blocks: usize,
}

impl<T: Scalar> PreconditionVanka<T> {
    /// Smoother over `patches` of a space with `n_dofs` dofs; call a setup method before use.
    pub fn new(patches: Vec<Vec<usize>>, n_dofs: usize, damping: T) -> Self {
        let mut mult = vec![0usize; n_dofs];
        for p in &patches {
            for &d in p {
                mult[d] += 1;
            }
        }
        let weights = mult
            .iter()
            .map(|&m| {
                if m == 0 {
                    T::zero()
                } else {
                    T::one() / T::cast_from(m as f64)
                }
            })
            .collect();
        Self {
            patches,
            solvers: Vec::new(),
            weights,
            damping,
            n_blocks: 0,
        }
    }

    pub fn n_patches(&self) -> usize {
        self.patches.len()
    }

    /// Averaging weight of dof `i`.
    pub fn weight(&self, i: usize) -> T {
        self.weights[i]
    }

    /// Extract and factor every patch matrix from assembled spatial matrices.
    pub fn setup_with(
        &mut self,
        alpha: &Mat<T>,
        beta: &Mat<T>,
        k: &CsrMatrix<T>,
        m: &CsrMatrix<T>,
    ) -> Result<(), KError> {
        if alpha.nrows() != alpha.ncols() {
            return Err(KError::mismatch("square time coupling", alpha.nrows(), alpha.ncols()));
        }
        let alpha64: Mat<f64> = dense::convert(alpha);
        let beta64: Mat<f64> = dense::convert(beta);
        let factor = |patch: &Vec<usize>| -> Result<LuSolver<T>, KError> {
            let kp: Mat<f64> = dense::convert(&k.submatrix(patch, patch));
            let mp: Mat<f64> = dense::convert(&m.submatrix(patch, patch));
            let local = dense::add_scaled(
                &dense::kronecker(&alpha64, &kp),
                1.0,
                &dense::kronecker(&beta64, &mp),
            );
            let mut lu = LuSolver::new();
            lu.factor_f64(&local)?;
            Ok(lu)
        };
        #[cfg(feature = "rayon")]
        let solvers = {
            use rayon::prelude::*;
            self.patches.par_iter().map(factor).collect::<Result<Vec<_>, _>>()?
        };
        #[cfg(not(feature = "rayon"))]
        let solvers = self.patches.iter().map(factor).collect::<Result<Vec<_>, _>>()?;
        self.solvers = solvers;
        self.n_blocks = alpha.nrows();
        Ok(())
    }

    fn solve_patch(&self, p: usize, r: &BlockVector<T>) -> Result<Vec<T>, KError> {
        let patch = &self.patches[p];
        let s = patch.len();
        let mut local_r = vec![T::zero(); s * self.n_blocks];
        for b in 0..self.n_blocks {
            let block = r.block(b);
            for (i, &d) in patch.iter().enumerate() {
                local_r[b * s + i] = block[d];
            }
        }
        let mut local_x = vec![T::zero(); local_r.len()];
        self.solvers[p].solve_cached(&local_r, &mut local_x)?;
        Ok(local_x)
    }
}

impl<T: Scalar> Preconditioner<BlockSystemOperator<T>, BlockVector<T>> for PreconditionVanka<T> {
    fn setup(&mut self, a: &BlockSystemOperator<T>) -> Result<(), KError> {
        let k = a.k().assemble_sparse()?;
        let m = a.m().assemble_sparse()?;
        self.setup_with(a.alpha(), a.beta(), &k, &m)
    }

    fn apply(&self, r: &BlockVector<T>, z: &mut BlockVector<T>) -> Result<(), KError> {
        if self.solvers.len() != self.patches.len() {
            return Err(KError::FactorError("vanka smoother used before setup".into()));
        }
        if r.n_blocks() != self.n_blocks {
            return Err(KError::mismatch("vanka time blocks", self.n_blocks, r.n_blocks()));
        }
        #[cfg(feature = "rayon")]
        let local = {
            use rayon::prelude::*;
            (0..self.patches.len())
                .into_par_iter()
                .map(|p| self.solve_patch(p, r))
                .collect::<Result<Vec<_>, _>>()?
        };
        #[cfg(not(feature = "rayon"))]
        let local = (0..self.patches.len())
            .map(|p| self.solve_patch(p, r))
            .collect::<Result<Vec<_>, _>>()?;
        z.fill(T::zero());
        for (patch, x) in self.patches.iter().zip(&local) {
            let s = patch.len();
            for b in 0..self.n_blocks {
                let block = z.block_mut(b);
                for (i, &d) in patch.iter().enumerate() {
                    block[d] = block[d] + self.damping * self.weights[d] * x[b * s + i];
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::Mesh;
    use crate::operator::{MatrixFreeOperator, SpatialOperator};
    use std::sync::Arc;

    fn space() -> FeSpace<2> {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
        FeSpace::new(mesh, 2).unwrap()
    }

    #[test]
    fn patches_skip_constrained_dofs() {
        let s = space();
        let cells = build_patches(&s, PatchType::Cell);
        assert_eq!(cells.len(), 16);
        let verts = build_patches(&s, PatchType::Vertex);
        // 9 interior vertices with 3x3 dofs, 12 boundary vertices with interior-side dofs.
        assert!(verts.iter().all(|p| p.iter().all(|&d| !s.constraints.is_constrained(d))));
        assert_eq!(verts.iter().map(Vec::len).max(), Some(9));
        let covered: std::collections::BTreeSet<usize> = verts.iter().flatten().copied().collect();
        assert_eq!(covered.len(), s.n_dofs() - s.constraints.n_constraints());
    }

    #[test]
    fn single_patch_is_exact_solver() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 0).unwrap();
        let s = Arc::new(FeSpace::new(mesh, 2).unwrap());
        let k: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::laplace(s.clone()));
        let m: Arc<dyn SpatialOperator<f64>> = Arc::new(MatrixFreeOperator::<f64, 2>::mass(s.clone()));
        let alpha = Mat::from_fn(2, 2, |i, j| if i == j { 0.5 } else if i > j { 0.1 } else { 0.0 });
        let beta = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { -0.2 });
        let op = BlockSystemOperator::new(k, m, alpha, beta).unwrap();
        let mut vanka = PreconditionVanka::new(build_patches(&s, PatchType::Cell), s.n_dofs(), 1.0);
        vanka.setup(&op).unwrap();
        assert_eq!(vanka.n_patches(), 1);
        let mut x = op.initialize_block_vector();
        for (i, v) in x.as_mut().iter_mut().enumerate() {
            *v = (i as f64 * 0.7).cos();
        }
        for b in 0..2 {
            s.constraints.distribute(x.block_mut(b));
        }
        let mut r = op.initialize_block_vector();
        op.apply(&mut r, &x);
        for b in 0..2 {
            s.constraints.distribute(r.block_mut(b));
        }
        let mut z = r.zeros_like();
        vanka.apply(&r, &mut z).unwrap();
        z.add(-1.0, &x);
        assert!(z.linfty_norm() < 1e-10);
    }
}
