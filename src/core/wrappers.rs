//! Trait implementations for the vector types used by the solvers.
//!
//! Inner products are reduced over fixed-size chunks whose partial sums are added in chunk
//! order, so the result does not depend on how rayon schedules the work. Repeated runs with
//! the same input produce bit-identical Krylov iterates.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)
//! - [rayon crate documentation](https://docs.rs/rayon)

use crate::core::block_vector::BlockVector;
use crate::core::scalar::Scalar;
use crate::core::traits::{Indexing, InnerProduct, MatTransVec, MatVec};
use faer::Mat;

/// Chunk length of the deterministic reduction.
const REDUCTION_CHUNK: usize = 4096;

/// Dot product of two slices with a fixed reduction order.
pub fn dot_slices<T: Scalar>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        let partial: Vec<T> = x
            .par_chunks(REDUCTION_CHUNK)
            .zip(y.par_chunks(REDUCTION_CHUNK))
            .map(|(a, b)| a.iter().zip(b).map(|(&ai, &bi)| ai * bi).sum::<T>())
            .collect();
        partial.into_iter().sum()
    }
    #[cfg(not(feature = "rayon"))]
    {
        x.chunks(REDUCTION_CHUNK)
            .zip(y.chunks(REDUCTION_CHUNK))
            .map(|(a, b)| a.iter().zip(b).map(|(&ai, &bi)| ai * bi).sum::<T>())
            .sum()
    }
}

/// Dense matrix-vector product for `faer::Mat`.
impl<T: Scalar> MatVec<Vec<T>> for Mat<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            y[i] = T::zero();
            for j in 0..self.ncols() {
                y[i] = y[i] + self[(i, j)] * x[j];
            }
        }
    }
}

impl<T: Scalar> MatTransVec<Vec<T>> for Mat<T> {
    fn mattransvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.ncols(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.nrows(), x.len(), "Input vector x has incorrect length");
        for j in 0..self.ncols() {
            y[j] = T::zero();
            for i in 0..self.nrows() {
                y[j] = y[j] + self[(i, j)] * x[i];
            }
        }
    }
}

impl<T: Scalar> InnerProduct<Vec<T>> for () {
    type Scalar = T;
    fn dot(&self, x: &Vec<T>, y: &Vec<T>) -> T {
        dot_slices(x, y)
    }
    fn norm(&self, x: &Vec<T>) -> T {
        dot_slices(x, x).sqrt()
    }
}

impl<T: Scalar> InnerProduct<BlockVector<T>> for () {
    type Scalar = T;
    fn dot(&self, x: &BlockVector<T>, y: &BlockVector<T>) -> T {
        dot_slices(x.as_ref(), y.as_ref())
    }
    fn norm(&self, x: &BlockVector<T>) -> T {
        dot_slices(x.as_ref(), x.as_ref()).sqrt()
    }
}

impl<T> Indexing for Vec<T> {
    fn nrows(&self) -> usize {
        self.len()
    }
}

impl<T> Indexing for BlockVector<T> {
    fn nrows(&self) -> usize {
        self.as_ref().len()
    }
}

impl<T> Indexing for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
}
