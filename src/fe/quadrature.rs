//! One-dimensional node sets and quadrature rules on the reference interval `[0, 1]`.
//!
//! Gauss, Gauss–Lobatto and right Gauss–Radau nodes are the roots of Legendre combinations.
//! They are located by a sign-change scan followed by bisection, which is robust for the
//! small orders used by time and space bases.

/// Nodes and weights of a quadrature rule on `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quadrature {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Quadrature {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `n`-point Gauss–Legendre rule, exact for polynomials of degree `2n-1`.
    pub fn gauss(n: usize) -> Self {
        assert!(n >= 1, "Gauss rule needs at least one point");
        let roots = find_roots(|x| legendre(n, x).0, -1.0, 1.0, n);
        let weights = roots
            .iter()
            .map(|&x| {
                let dp = legendre(n, x).1;
                // 2/((1-x²)P'²) on [-1,1], halved by the map to [0,1]
                1.0 / ((1.0 - x * x) * dp * dp)
            })
            .collect();
        Self {
            points: roots.iter().map(|&x| to_unit(x)).collect(),
            weights,
        }
    }

    /// `n`-point Gauss–Lobatto rule including both end points, exact for degree `2n-3`.
    pub fn gauss_lobatto(n: usize) -> Self {
        assert!(n >= 2, "Gauss-Lobatto rule needs at least two points");
        let points = gauss_lobatto_points(n);
        let nm1 = (n - 1) as f64;
        let weights = points
            .iter()
            .map(|&t| {
                let p = legendre(n - 1, 2.0 * t - 1.0).0;
                1.0 / (n as f64 * nm1 * p * p)
            })
            .collect();
        Self { points, weights }
    }
}

/// Legendre polynomial `P_n(x)` and its derivative on `[-1, 1]`.
pub fn legendre(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let (mut p0, mut p1) = (1.0, x);
    let (mut d0, mut d1) = (0.0, 1.0);
    for k in 1..n {
        let kf = k as f64;
        let p2 = ((2.0 * kf + 1.0) * x * p1 - kf * p0) / (kf + 1.0);
        let d2 = d0 + (2.0 * kf + 1.0) * p1;
        p0 = p1;
        p1 = p2;
        d0 = d1;
        d1 = d2;
    }
    (p1, d1)
}

/// Gauss–Lobatto nodes on `[0, 1]`: end points plus the roots of `P'_{n-1}`.
pub fn gauss_lobatto_points(n: usize) -> Vec<f64> {
    assert!(n >= 2);
    let mut pts = vec![0.0];
    if n > 2 {
        let interior = find_roots(|x| legendre(n - 1, x).1, -1.0, 1.0, n - 2);
        pts.extend(interior.into_iter().map(to_unit));
    }
    pts.push(1.0);
    pts
}

/// Gauss points (roots of `P_n`) on `[0, 1]`.
pub fn gauss_points(n: usize) -> Vec<f64> {
    Quadrature::gauss(n).points
}

/// Right Gauss–Radau nodes on `[0, 1]`: roots of `P_{n-1} - P_n`, the last one at `1`.
pub fn gauss_radau_right_points(n: usize) -> Vec<f64> {
    assert!(n >= 1);
    let mut pts: Vec<f64> = if n > 1 {
        // Interior roots lie strictly left of the fixed end point.
        let f = |x: f64| legendre(n - 1, x).0 - legendre(n, x).0;
        find_roots(f, -1.0, 1.0 - 1e-9, n - 1)
            .into_iter()
            .map(to_unit)
            .collect()
    } else {
        Vec::new()
    };
    pts.push(1.0);
    pts
}

fn to_unit(x: f64) -> f64 {
    0.5 * (x + 1.0)
}

/// Roots of `f` in the open interval `(a, b)`, ascending, by scanning for sign changes.
fn find_roots(f: impl Fn(f64) -> f64, a: f64, b: f64, expected: usize) -> Vec<f64> {
    let samples = 2000 * (expected + 1);
    let h = (b - a) / samples as f64;
    let mut roots = Vec::with_capacity(expected);
    let mut xl = a + 0.5 * h;
    let mut fl = f(xl);
    for i in 1..samples {
        let xr = a + (i as f64 + 0.5) * h;
        let fr = f(xr);
        if fl == 0.0 {
            roots.push(xl);
        } else if fl * fr < 0.0 {
            roots.push(bisect(&f, xl, xr, fl));
        }
        xl = xr;
        fl = fr;
    }
    debug_assert_eq!(roots.len(), expected, "root scan missed a node");
    roots
}

fn bisect(f: &impl Fn(f64) -> f64, mut lo: f64, mut hi: f64, mut flo: f64) -> f64 {
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let fm = f(mid);
        if fm == 0.0 {
            return mid;
        }
        if flo * fm < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            flo = fm;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gauss_rule_integrates_polynomials_exactly() {
        for n in 1..=6 {
            let q = Quadrature::gauss(n);
            assert_eq!(q.len(), n);
            for deg in 0..2 * n {
                let integral: f64 = q
                    .points
                    .iter()
                    .zip(&q.weights)
                    .map(|(&x, &w)| w * x.powi(deg as i32))
                    .sum();
                assert_abs_diff_eq!(integral, 1.0 / (deg as f64 + 1.0), epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn lobatto_nodes_are_symmetric_with_end_points() {
        let p = gauss_lobatto_points(4);
        assert_eq!(p.len(), 4);
        assert_eq!(p[0], 0.0);
        assert_eq!(p[3], 1.0);
        assert_abs_diff_eq!(p[1] + p[2], 1.0, epsilon = 1e-14);
        // Roots of P'_3 on [-1,1] are ±1/√5.
        assert_abs_diff_eq!(p[1], 0.5 * (1.0 - 1.0 / 5f64.sqrt()), epsilon = 1e-14);
        let q = Quadrature::gauss_lobatto(3);
        assert_abs_diff_eq!(q.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(q.weights[1], 4.0 / 6.0, epsilon = 1e-14);
    }

    #[test]
    fn radau_nodes_end_at_one() {
        assert_eq!(gauss_radau_right_points(1), vec![1.0]);
        let p = gauss_radau_right_points(2);
        // P_1 - P_2 vanishes at x = -1/3 on [-1, 1].
        assert_abs_diff_eq!(p[0], 1.0 / 3.0, epsilon = 1e-14);
        assert_eq!(p[1], 1.0);
    }
}
