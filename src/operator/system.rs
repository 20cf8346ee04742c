//! Space-time block operator `Alpha ⊗ K + Beta ⊗ M`.
//!
//! The dense coupling matrices are small (time dofs of a slab) and usually structurally
//! sparse, so each block product is evaluated only for nonzero coupling entries. Blocks are
//! visited in index order; repeated applications are bitwise reproducible.

use crate::core::block_vector::{BlockVector, add_scaled};
use crate::core::scalar::Scalar;
use crate::core::traits::{Indexing, MatTransVec, MatVec};
use crate::error::KError;
use crate::matrix::dense;
use crate::operator::{SpatialOperator, clamped_inverse};
use crate::utils::timer::Timer;
use faer::Mat;
use std::sync::Arc;

pub struct BlockSystemOperator<T: Scalar> {
    k: Arc<dyn SpatialOperator<T>>,
    m: Arc<dyn SpatialOperator<T>>,
    alpha: Mat<T>,
    beta: Mat<T>,
    alpha_is_zero: bool,
    beta_is_zero: bool,
    timer: Option<Arc<Timer>>,
}

impl<T: Scalar> BlockSystemOperator<T> {
    /// `Alpha` and `Beta` must share their shape and `K`, `M` their size.
    pub fn new(
        k: Arc<dyn SpatialOperator<T>>,
        m: Arc<dyn SpatialOperator<T>>,
        alpha: Mat<T>,
        beta: Mat<T>,
    ) -> Result<Self, KError> {
        if alpha.nrows() != beta.nrows() {
            return Err(KError::mismatch("coupling matrix rows", alpha.nrows(), beta.nrows()));
        }
        if alpha.ncols() != beta.ncols() {
            return Err(KError::mismatch("coupling matrix columns", alpha.ncols(), beta.ncols()));
        }
        if k.n_dofs() != m.n_dofs() {
            return Err(KError::mismatch("spatial operator size", k.n_dofs(), m.n_dofs()));
        }
        Ok(Self {
            alpha_is_zero: dense::all_zero(&alpha),
            beta_is_zero: dense::all_zero(&beta),
            k,
            m,
            alpha,
            beta,
            timer: None,
        })
    }

    /// Record applications in `timer` under `"vmult"` and `"Tvmult"`.
    pub fn with_timer(mut self, timer: Arc<Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn alpha(&self) -> &Mat<T> {
        &self.alpha
    }

    pub fn beta(&self) -> &Mat<T> {
        &self.beta
    }

    pub fn k(&self) -> &Arc<dyn SpatialOperator<T>> {
        &self.k
    }

    pub fn m(&self) -> &Arc<dyn SpatialOperator<T>> {
        &self.m
    }

    /// Number of output blocks.
    pub fn n_rows(&self) -> usize {
        self.alpha.nrows()
    }

    /// Number of input blocks.
    pub fn n_cols(&self) -> usize {
        self.alpha.ncols()
    }

    pub fn n_dofs(&self) -> usize {
        self.k.n_dofs()
    }

    /// Zero block vector with one block per output row.
    pub fn initialize_block_vector(&self) -> BlockVector<T> {
        BlockVector::new(self.n_rows(), self.n_dofs())
    }

    /// `dst_j = Σ_i Alpha(j,i) K src_i + Beta(j,i) M src_i`.
    pub fn apply(&self, dst: &mut BlockVector<T>, src: &BlockVector<T>) {
        let _t = self.timer.as_ref().map(|t| t.scope("vmult"));
        debug_assert_eq!(src.n_blocks(), self.n_cols());
        debug_assert_eq!(dst.n_blocks(), self.n_rows());
        dst.fill(T::zero());
        self.accumulate(dst, src, false);
    }

    /// `dst_i = Σ_j Alpha(j,i) Kᵀ src_j + Beta(j,i) Mᵀ src_j`; `K` and `M` are symmetric.
    pub fn apply_transpose(&self, dst: &mut BlockVector<T>, src: &BlockVector<T>) {
        let _t = self.timer.as_ref().map(|t| t.scope("Tvmult"));
        debug_assert_eq!(src.n_blocks(), self.n_rows());
        debug_assert_eq!(dst.n_blocks(), self.n_cols());
        dst.fill(T::zero());
        self.accumulate(dst, src, true);
    }

    fn accumulate(&self, dst: &mut BlockVector<T>, src: &BlockVector<T>, transpose: bool) {
        let n = self.n_dofs();
        let mut kx = vec![T::zero(); n];
        let mut mx = vec![T::zero(); n];
        let (n_in, n_out) = if transpose {
            (self.n_rows(), self.n_cols())
        } else {
            (self.n_cols(), self.n_rows())
        };
        let coeff = |mat: &Mat<T>, out: usize, inp: usize| {
            if transpose { mat[(inp, out)] } else { mat[(out, inp)] }
        };
        for i in 0..n_in {
            let uses_k = (0..n_out).any(|j| coeff(&self.alpha, j, i) != T::zero());
            let uses_m = (0..n_out).any(|j| coeff(&self.beta, j, i) != T::zero());
            if uses_k {
                self.k.apply(&mut kx, src.block(i));
            }
            if uses_m {
                self.m.apply(&mut mx, src.block(i));
            }
            for j in 0..n_out {
                let a = coeff(&self.alpha, j, i);
                if a != T::zero() {
                    add_scaled(dst.block_mut(j), a, &kx);
                }
                let b = coeff(&self.beta, j, i);
                if b != T::zero() {
                    add_scaled(dst.block_mut(j), b, &mx);
                }
            }
        }
    }

    /// `dst_j += Alpha(j,0) K src + Beta(j,0) M src` for a single input block.
    pub fn apply_single_add(&self, dst: &mut BlockVector<T>, src: &[T]) -> Result<(), KError> {
        if self.n_cols() != 1 {
            return Err(KError::mismatch("single-block coupling columns", 1, self.n_cols()));
        }
        if dst.n_blocks() != self.n_rows() {
            return Err(KError::mismatch("output blocks", self.n_rows(), dst.n_blocks()));
        }
        let n = self.n_dofs();
        if !self.alpha_is_zero {
            let mut kx = vec![T::zero(); n];
            self.k.apply(&mut kx, src);
            for j in 0..self.n_rows() {
                let a = self.alpha[(j, 0)];
                if a != T::zero() {
                    add_scaled(dst.block_mut(j), a, &kx);
                }
            }
        }
        if !self.beta_is_zero {
            let mut mx = vec![T::zero(); n];
            self.m.apply(&mut mx, src);
            for j in 0..self.n_rows() {
                let b = self.beta[(j, 0)];
                if b != T::zero() {
                    add_scaled(dst.block_mut(j), b, &mx);
                }
            }
        }
        Ok(())
    }

    /// Overwriting variant of [`apply_single_add`](Self::apply_single_add).
    pub fn apply_single(&self, dst: &mut BlockVector<T>, src: &[T]) -> Result<(), KError> {
        dst.fill(T::zero());
        self.apply_single_add(dst, src)
    }

    /// Block diagonal `Alpha(i,i) diag K + Beta(i,i) diag M`.
    pub fn diagonal(&self) -> BlockVector<T> {
        let dk = self.k.diagonal();
        let dm = self.m.diagonal();
        let nb = self.n_rows().min(self.n_cols());
        let mut out = BlockVector::new(nb, self.n_dofs());
        for i in 0..nb {
            let (a, b) = (self.alpha[(i, i)], self.beta[(i, i)]);
            for ((o, &k), &m) in out.block_mut(i).iter_mut().zip(&dk).zip(&dm) {
                *o = a * k + b * m;
            }
        }
        out
    }

    /// Entry-wise reciprocal of [`diagonal`](Self::diagonal) with the clamp of
    /// [`clamped_inverse`].
    pub fn diagonal_inverse(&self) -> BlockVector<T> {
        let mut d = self.diagonal();
        let inv = clamped_inverse(d.as_ref());
        d.as_mut().copy_from_slice(&inv);
        d
    }

    /// Same operator in another precision; spatial operators are supplied by the caller.
    pub fn with_operators<U: Scalar>(
        &self,
        k: Arc<dyn SpatialOperator<U>>,
        m: Arc<dyn SpatialOperator<U>>,
    ) -> Result<BlockSystemOperator<U>, KError> {
        BlockSystemOperator::new(k, m, dense::convert(&self.alpha), dense::convert(&self.beta))
    }
}

impl<T: Scalar> MatVec<BlockVector<T>> for BlockSystemOperator<T> {
    fn matvec(&self, x: &BlockVector<T>, y: &mut BlockVector<T>) {
        self.apply(y, x);
    }
}

impl<T: Scalar> MatTransVec<BlockVector<T>> for BlockSystemOperator<T> {
    fn mattransvec(&self, x: &BlockVector<T>, y: &mut BlockVector<T>) {
        self.apply_transpose(y, x);
    }
}

impl<T: Scalar> Indexing for BlockSystemOperator<T> {
    fn nrows(&self) -> usize {
        self.n_rows() * self.n_dofs()
    }
}
