//! Lagrange polynomials in 1D and tensor-product `Q_p` shape tables.

use crate::fe::quadrature::{Quadrature, gauss_lobatto_points};

/// Lagrange basis through a set of distinct nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct LagrangeBasis {
    nodes: Vec<f64>,
}

impl LagrangeBasis {
    pub fn new(nodes: Vec<f64>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `L_i(x)`.
    pub fn value(&self, i: usize, x: f64) -> f64 {
        let xi = self.nodes[i];
        self.nodes
            .iter()
            .enumerate()
            .filter(|&(m, _)| m != i)
            .map(|(_, &xm)| (x - xm) / (xi - xm))
            .product()
    }

    /// `L_i'(x)`.
    pub fn derivative(&self, i: usize, x: f64) -> f64 {
        let xi = self.nodes[i];
        let mut sum = 0.0;
        for (k, &xk) in self.nodes.iter().enumerate() {
            if k == i {
                continue;
            }
            let mut prod = 1.0 / (xi - xk);
            for (m, &xm) in self.nodes.iter().enumerate() {
                if m != i && m != k {
                    prod *= (x - xm) / (xi - xm);
                }
            }
            sum += prod;
        }
        sum
    }

    /// Values of all basis functions at `x`.
    pub fn values(&self, x: f64) -> Vec<f64> {
        (0..self.len()).map(|i| self.value(i, x)).collect()
    }
}

/// Continuous `Q_p` element on Gauss–Lobatto nodes with lexicographic local numbering,
/// tabulated at the tensor Gauss points of a chosen 1D rule.
///
/// Local dof `i` has 1D indices `i_d = (i / (p+1)^d) % (p+1)`; quadrature point `q` likewise
/// with `n_q_1d`.
#[derive(Clone, Debug)]
pub struct FeQ<const D: usize> {
    degree: usize,
    basis: LagrangeBasis,
    quadrature: Quadrature,
    /// `values[q * dofs_per_cell + i]`
    values: Vec<f64>,
    /// Reference gradients, same layout as `values`.
    gradients: Vec<[f64; D]>,
    /// Tensor quadrature weights.
    weights: Vec<f64>,
    /// Tensor quadrature points on the reference cell.
    points: Vec<[f64; D]>,
}

/// Split a lexicographic index into `D` components of extent `n`.
pub fn unravel<const D: usize>(mut idx: usize, n: usize) -> [usize; D] {
    let mut out = [0; D];
    for o in out.iter_mut() {
        *o = idx % n;
        idx /= n;
    }
    out
}

impl<const D: usize> FeQ<D> {
    /// `Q_degree` tabulated at the `n_q_1d`-point Gauss rule.
    pub fn new(degree: usize, n_q_1d: usize) -> Self {
        assert!(degree >= 1, "continuous elements need degree >= 1");
        let basis = LagrangeBasis::new(gauss_lobatto_points(degree + 1));
        let quadrature = Quadrature::gauss(n_q_1d);
        let n1 = degree + 1;
        let ndofs = n1.pow(D as u32);
        let nq = n_q_1d.pow(D as u32);
        let val1: Vec<Vec<f64>> = quadrature.points.iter().map(|&x| basis.values(x)).collect();
        let der1: Vec<Vec<f64>> = quadrature
            .points
            .iter()
            .map(|&x| (0..n1).map(|i| basis.derivative(i, x)).collect())
            .collect();
        let mut values = Vec::with_capacity(nq * ndofs);
        let mut gradients = Vec::with_capacity(nq * ndofs);
        let mut weights = Vec::with_capacity(nq);
        let mut points = Vec::with_capacity(nq);
        for q in 0..nq {
            let qi = unravel::<D>(q, n_q_1d);
            weights.push(qi.iter().map(|&k| quadrature.weights[k]).product());
            points.push(std::array::from_fn(|d| quadrature.points[qi[d]]));
            for i in 0..ndofs {
                let ii = unravel::<D>(i, n1);
                values.push((0..D).map(|d| val1[qi[d]][ii[d]]).product());
                gradients.push(std::array::from_fn(|d| {
                    (0..D)
                        .map(|e| {
                            if e == d {
                                der1[qi[e]][ii[e]]
                            } else {
                                val1[qi[e]][ii[e]]
                            }
                        })
                        .product()
                }));
            }
        }
        Self {
            degree,
            basis,
            quadrature,
            values,
            gradients,
            weights,
            points,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn basis_1d(&self) -> &LagrangeBasis {
        &self.basis
    }

    pub fn quadrature_1d(&self) -> &Quadrature {
        &self.quadrature
    }

    pub fn dofs_per_cell(&self) -> usize {
        (self.degree + 1).pow(D as u32)
    }

    pub fn n_q_points(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn shape_value(&self, q: usize, i: usize) -> f64 {
        self.values[q * self.dofs_per_cell() + i]
    }

    #[inline]
    pub fn shape_grad(&self, q: usize, i: usize) -> &[f64; D] {
        &self.gradients[q * self.dofs_per_cell() + i]
    }

    pub fn reference_weight(&self, q: usize) -> f64 {
        self.weights[q]
    }

    pub fn reference_point(&self, q: usize) -> &[f64; D] {
        &self.points[q]
    }

    /// Value of local basis function `i` at an arbitrary reference point.
    pub fn value_at(&self, i: usize, xi: &[f64; D]) -> f64 {
        let ii = unravel::<D>(i, self.degree + 1);
        (0..D).map(|d| self.basis.value(ii[d], xi[d])).product()
    }

    /// Reference coordinates of local node `i`.
    pub fn node(&self, i: usize) -> [f64; D] {
        let ii = unravel::<D>(i, self.degree + 1);
        std::array::from_fn(|d| self.basis.nodes()[ii[d]])
    }
}
