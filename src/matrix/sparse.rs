//! Compressed sparse row storage for assembled spatial operators.
//!
//! The multigrid smoother extracts dense patch blocks from these matrices and the coarsest
//! level may be represented by one, so besides `y = A x` the type supports in-place
//! accumulation into a fixed sparsity pattern and dense submatrix extraction.

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::matrix::dense;
use faer::Mat;

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[T], y: &mut [T]);
}

/// Row-compressed structure without values; column indices are sorted within each row.
#[derive(Clone, Debug, PartialEq)]
pub struct SparsityPattern {
    pub nrows: usize,
    pub ncols: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<usize>,
}

impl SparsityPattern {
    /// Build from per-row column sets. Duplicates are removed.
    pub fn from_rows(ncols: usize, rows: Vec<Vec<usize>>) -> Self {
        let nrows = rows.len();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);
        for mut row in rows {
            row.sort_unstable();
            row.dedup();
            col_idx.extend(row);
            row_ptr.push(col_idx.len());
        }
        Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
        }
    }

    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn row(&self, i: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    /// Storage position of `(i, j)` if it is part of the pattern.
    pub fn position(&self, i: usize, j: usize) -> Option<usize> {
        self.row(i)
            .binary_search(&j)
            .ok()
            .map(|k| self.row_ptr[i] + k)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix<T> {
    pattern: SparsityPattern,
    values: Vec<T>,
}

impl<T: Scalar> CsrMatrix<T> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, KError> {
        if row_ptr.len() != nrows + 1 {
            return Err(KError::mismatch("CSR row pointer", nrows + 1, row_ptr.len()));
        }
        if col_idx.len() != values.len() || row_ptr[nrows] != values.len() {
            return Err(KError::mismatch("CSR values", col_idx.len(), values.len()));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c >= ncols) {
            return Err(KError::InvalidParameter(format!(
                "column index {c} out of range for {ncols} columns"
            )));
        }
        Ok(Self {
            pattern: SparsityPattern {
                nrows,
                ncols,
                row_ptr,
                col_idx,
            },
            values,
        })
    }

    /// Zero matrix with the given structure.
    pub fn zeros(pattern: SparsityPattern) -> Self {
        let values = vec![T::zero(); pattern.nnz()];
        Self { pattern, values }
    }

    pub fn pattern(&self) -> &SparsityPattern {
        &self.pattern
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Accumulate `v` into entry `(i, j)`, which must be part of the pattern.
    pub fn add(&mut self, i: usize, j: usize, v: T) -> Result<(), KError> {
        match self.pattern.position(i, j) {
            Some(k) => {
                self.values[k] = self.values[k] + v;
                Ok(())
            }
            None => Err(KError::InvalidParameter(format!(
                "entry ({i}, {j}) is not in the sparsity pattern"
            ))),
        }
    }

    /// Entry `(i, j)`; zero outside the pattern.
    pub fn get(&self, i: usize, j: usize) -> T {
        self.pattern
            .position(i, j)
            .map_or(T::zero(), |k| self.values[k])
    }

    /// Row `i` as (column, value) pairs.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let range = self.pattern.row_ptr[i]..self.pattern.row_ptr[i + 1];
        self.pattern.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    pub fn diagonal(&self) -> Vec<T> {
        (0..self.pattern.nrows).map(|i| self.get(i, i)).collect()
    }

    /// Compute y = Aᵀ x.
    pub fn spmv_transpose(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.pattern.nrows);
        assert_eq!(y.len(), self.pattern.ncols);
        y.iter_mut().for_each(|v| *v = T::zero());
        for (i, &xi) in x.iter().enumerate() {
            for (j, a) in self.row(i) {
                y[j] = y[j] + a * xi;
            }
        }
    }

    /// Dense block `A[rows, cols]`.
    pub fn submatrix(&self, rows: &[usize], cols: &[usize]) -> Mat<T> {
        Mat::from_fn(rows.len(), cols.len(), |i, j| self.get(rows[i], cols[j]))
    }

    pub fn to_dense(&self) -> Mat<T> {
        let mut out = dense::zeros(self.pattern.nrows, self.pattern.ncols);
        for i in 0..self.pattern.nrows {
            for (j, a) in self.row(i) {
                out[(i, j)] = a;
            }
        }
        out
    }

    /// Same structure, values converted to another precision.
    pub fn convert<U: Scalar>(&self) -> CsrMatrix<U> {
        CsrMatrix {
            pattern: self.pattern.clone(),
            values: self.values.iter().map(|&v| v.convert()).collect(),
        }
    }
}

impl<T: Scalar> SparseMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.pattern.nrows
    }
    fn ncols(&self) -> usize {
        self.pattern.ncols
    }
    fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.nrows());
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_iter_mut().enumerate().for_each(|(i, yi)| {
                *yi = self.row(i).fold(T::zero(), |acc, (j, a)| acc + a * x[j]);
            });
        }
        #[cfg(not(feature = "rayon"))]
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row(i).fold(T::zero(), |acc, (j, a)| acc + a * x[j]);
        }
    }
}
