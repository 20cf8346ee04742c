//! Small dense helpers on top of Faer.
//!
//! Time-coupling matrices and patch matrices are `faer::Mat`. The generic helpers here only
//! rely on `Mat::from_fn` and indexing so they work for every [`Scalar`]; arithmetic that
//! needs Faer's kernels is done on `Mat<f64>`.

use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::solver::direct_lu::LuSolver;
use faer::Mat;

/// `nrows × ncols` matrix of zeros for any scalar.
pub fn zeros<T: Scalar>(nrows: usize, ncols: usize) -> Mat<T> {
    Mat::from_fn(nrows, ncols, |_, _| T::zero())
}

/// True if every entry is exactly zero.
pub fn all_zero<T: Scalar>(m: &Mat<T>) -> bool {
    (0..m.ncols()).all(|j| (0..m.nrows()).all(|i| m[(i, j)] == T::zero()))
}

/// Entry-wise precision conversion.
pub fn convert<T: Scalar, U: Scalar>(m: &Mat<T>) -> Mat<U> {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)].convert())
}

/// Transposed copy.
pub fn transpose<T: Scalar>(m: &Mat<T>) -> Mat<T> {
    Mat::from_fn(m.ncols(), m.nrows(), |i, j| m[(j, i)])
}

/// Column `j` as a plain vector.
pub fn column<T: Scalar>(m: &Mat<T>, j: usize) -> Vec<T> {
    (0..m.nrows()).map(|i| m[(i, j)]).collect()
}

/// Construct from raw column-major storage.
pub fn from_column_major<T: Scalar>(nrows: usize, ncols: usize, data: &[T]) -> Mat<T> {
    Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i])
}

/// `a + s·b` for matrices of equal shape.
pub fn add_scaled<T: Scalar>(a: &Mat<T>, s: T, b: &Mat<T>) -> Mat<T> {
    assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()));
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)] + s * b[(i, j)])
}

/// `s·a`.
pub fn scale<T: Scalar>(a: &Mat<T>, s: T) -> Mat<T> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| s * a[(i, j)])
}

/// Kronecker product `a ⊗ b` with `a` as the outer (block) index.
pub fn kronecker(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    let (ra, ca) = (a.nrows(), a.ncols());
    let (rb, cb) = (b.nrows(), b.ncols());
    Mat::from_fn(ra * rb, ca * cb, |i, j| a[(i / rb, j / cb)] * b[(i % rb, j % cb)])
}

/// Inverse of a square matrix through a full-pivoting LU factorization.
pub fn invert(a: &Mat<f64>) -> Result<Mat<f64>, KError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(KError::mismatch("invert", n, a.ncols()));
    }
    let mut lu = LuSolver::<f64>::new();
    lu.factor(a)?;
    let mut out = zeros::<f64>(n, n);
    let mut e = vec![0.0; n];
    let mut x = vec![0.0; n];
    for j in 0..n {
        e.iter_mut().for_each(|v| *v = 0.0);
        e[j] = 1.0;
        lu.solve_cached(&e, &mut x)?;
        for (i, &xi) in x.iter().enumerate() {
            out[(i, j)] = xi;
        }
    }
    Ok(out)
}

/// Maximum absolute entry-wise difference of two equally shaped matrices.
pub fn max_abs_diff<T: Scalar>(a: &Mat<T>, b: &Mat<T>) -> T {
    assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()));
    let mut m = T::zero();
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            m = m.max((a[(i, j)] - b[(i, j)]).abs());
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kronecker_places_blocks_outer_major() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 2.0 });
        let b = Mat::from_fn(2, 2, |i, j| (i * 2 + j) as f64);
        let k = kronecker(&a, &b);
        assert_eq!(k[(0, 1)], 1.0);
        assert_eq!(k[(1, 3)], 2.0 * 3.0);
        assert_eq!(k[(3, 2)], 1.0 * 2.0);
    }

    #[test]
    fn invert_recovers_identity() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { 4.0 } else { 1.0 });
        let inv = invert(&a).unwrap();
        let prod = &a * &inv;
        for i in 0..3 {
            for j in 0..3 {
                let e = if i == j { 1.0 } else { 0.0 };
                assert!((prod[(i, j)] - e).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn zero_detection_and_conversion() {
        let z = zeros::<f64>(2, 3);
        assert!(all_zero(&z));
        let m = Mat::from_fn(2, 2, |i, j| (i + j) as f64 * 0.5);
        assert!(!all_zero(&m));
        let f: Mat<f32> = convert(&m);
        assert_eq!(f[(1, 1)], 1.0f32);
        assert_eq!(transpose(&Mat::from_fn(1, 2, |_, j| j as f64))[(1, 0)], 1.0);
    }
}
