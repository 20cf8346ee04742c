//! Block vectors: one spatial vector per temporal degree of freedom of a time slab.
//!
//! Blocks are stored back to back in a single allocation so the whole vector can be handed
//! to the Krylov solver as a flat slice, while operators address individual blocks.

use crate::core::scalar::Scalar;

/// Ordered sequence of `n_blocks` spatial vectors sharing one layout.
///
/// The block count and block size are fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockVector<T> {
    data: Vec<T>,
    n_blocks: usize,
    block_size: usize,
}

impl<T: Scalar> BlockVector<T> {
    /// Zero-initialized block vector.
    pub fn new(n_blocks: usize, block_size: usize) -> Self {
        Self {
            data: vec![T::zero(); n_blocks * block_size],
            n_blocks,
            block_size,
        }
    }

    /// Build from a list of equally sized blocks.
    ///
    /// # Panics
    /// Panics if the blocks differ in length.
    pub fn from_blocks(blocks: &[Vec<T>]) -> Self {
        let block_size = blocks.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(block_size * blocks.len());
        for b in blocks {
            assert_eq!(b.len(), block_size, "all blocks must share one layout");
            data.extend_from_slice(b);
        }
        Self {
            data,
            n_blocks: blocks.len(),
            block_size,
        }
    }

    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn block(&self, i: usize) -> &[T] {
        &self.data[i * self.block_size..(i + 1) * self.block_size]
    }

    pub fn block_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.block_size..(i + 1) * self.block_size]
    }

    /// Iterate over the blocks in index order.
    pub fn blocks(&self) -> impl Iterator<Item = &[T]> {
        (0..self.n_blocks).map(move |i| self.block(i))
    }

    /// Mutable iteration over the blocks in index order.
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
        let bs = self.block_size.max(1);
        self.data.chunks_mut(bs).take(self.n_blocks)
    }

    /// Same shape, zero entries.
    pub fn zeros_like(&self) -> Self {
        Self::new(self.n_blocks, self.block_size)
    }

    /// Set every entry to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// `self += a * other`.
    pub fn add(&mut self, a: T, other: &Self) {
        debug_assert_eq!(self.data.len(), other.data.len());
        add_scaled(&mut self.data, a, &other.data);
    }

    /// `self = s * self + a * other`.
    pub fn sadd(&mut self, s: T, a: T, other: &Self) {
        debug_assert_eq!(self.data.len(), other.data.len());
        for (x, &y) in self.data.iter_mut().zip(&other.data) {
            *x = s * *x + a * y;
        }
    }

    /// `self *= s`.
    pub fn scale(&mut self, s: T) {
        self.data.iter_mut().for_each(|x| *x = *x * s);
    }

    /// Overwrite with a block vector of possibly different precision.
    pub fn copy_converted<U: Scalar>(&mut self, other: &BlockVector<U>) {
        assert_eq!(self.n_blocks, other.n_blocks());
        assert_eq!(self.block_size, other.block_size());
        for (x, &y) in self.data.iter_mut().zip(other.as_ref()) {
            *x = y.convert();
        }
    }

    /// Copy of this vector in another precision.
    pub fn converted<U: Scalar>(&self) -> BlockVector<U> {
        let mut out = BlockVector::<U>::new(self.n_blocks, self.block_size);
        out.copy_converted(self);
        out
    }

    /// Euclidean norm over all blocks.
    pub fn l2_norm(&self) -> T {
        self.data.iter().map(|&x| x * x).sum::<T>().sqrt()
    }

    /// Maximum absolute entry.
    pub fn linfty_norm(&self) -> T {
        self.data.iter().fold(T::zero(), |m, &x| m.max(x.abs()))
    }
}

impl<T> AsRef<[T]> for BlockVector<T> {
    fn as_ref(&self) -> &[T] {
        &self.data
    }
}

impl<T> AsMut<[T]> for BlockVector<T> {
    fn as_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// `dst += a * src` on plain slices.
#[inline]
pub fn add_scaled<T: Scalar>(dst: &mut [T], a: T, src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = *d + a * s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_share_layout() {
        let mut v = BlockVector::<f64>::new(3, 4);
        assert_eq!(v.len(), 12);
        v.block_mut(1).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(v.block(1), &[1.0, 2.0, 3.0, 4.0]);
        assert!(v.block(0).iter().all(|&x| x == 0.0));
        assert_eq!(v.blocks().count(), 3);
    }

    #[test]
    fn sadd_and_add() {
        let a = BlockVector::from_blocks(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let mut b = BlockVector::from_blocks(&[vec![1.0, 1.0], vec![1.0, 1.0]]);
        b.sadd(2.0, 0.5, &a);
        assert_eq!(b.as_ref(), &[2.5, 3.0, 3.5, 4.0]);
        b.add(-1.0, &a);
        assert_eq!(b.as_ref(), &[1.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn conversion_to_single_precision() {
        let a = BlockVector::from_blocks(&[vec![0.25f64, -1.5]]);
        let b: BlockVector<f32> = a.converted();
        assert_eq!(b.as_ref(), &[0.25f32, -1.5]);
    }
}
