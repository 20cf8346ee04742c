//! Manufactured solutions and the smooth initial bump.

use crate::fe::quadrature::Quadrature;
use crate::multigrid::ProblemType;
use std::f64::consts::PI;

/// `u = Π sin(π x_d) · g(t)` with `g(t) = exp(-f t)` for heat and `sin(2π f t)` for wave.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExactSolution<const D: usize> {
    problem: ProblemType,
    frequency: f64,
}

impl<const D: usize> ExactSolution<D> {
    pub fn new(problem: ProblemType, frequency: f64) -> Self {
        Self { problem, frequency }
    }

    fn space_part(p: &[f64; D]) -> f64 {
        p.iter().map(|x| (PI * x).sin()).product()
    }

    fn time_part(&self, t: f64) -> (f64, f64) {
        let f = self.frequency;
        match self.problem {
            ProblemType::Heat => {
                let e = (-f * t).exp();
                (e, -f * e)
            }
            ProblemType::Wave => {
                let w = 2.0 * PI * f;
                ((w * t).sin(), w * (w * t).cos())
            }
        }
    }

    pub fn value(&self, p: &[f64; D], t: f64) -> f64 {
        Self::space_part(p) * self.time_part(t).0
    }

    pub fn gradient(&self, p: &[f64; D], t: f64) -> [f64; D] {
        let g = self.time_part(t).0;
        std::array::from_fn(|d| {
            let others: f64 = (0..D)
                .filter(|&e| e != d)
                .map(|e| (PI * p[e]).sin())
                .product();
            PI * (PI * p[d]).cos() * others * g
        })
    }

    /// `∂u/∂t`, the initial velocity of the wave problem.
    pub fn velocity(&self, p: &[f64; D], t: f64) -> f64 {
        Self::space_part(p) * self.time_part(t).1
    }

    /// Source making `u` solve the equation with unit coefficient.
    pub fn rhs(&self, p: &[f64; D], t: f64) -> f64 {
        let f = self.frequency;
        let laplace = D as f64 * PI * PI;
        match self.problem {
            ProblemType::Heat => (laplace - f) * self.value(p, t),
            ProblemType::Wave => (laplace - 4.0 * PI * PI * f * f) * self.value(p, t),
        }
    }
}

/// `C^∞` cutoff `exp(1 - 1/(1 - r²/R²))` around `center`, scaled to unit integral.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutoffBump<const D: usize> {
    center: [f64; D],
    radius: f64,
    scale: f64,
}

impl<const D: usize> CutoffBump<D> {
    pub fn new(center: [f64; D], radius: f64) -> Self {
        // Radial integral over the unit ball, times the sphere surface.
        let q = Quadrature::gauss(40);
        let radial: f64 = q
            .points
            .iter()
            .zip(&q.weights)
            .map(|(&s, &w)| w * profile(s) * s.powi(D as i32 - 1))
            .sum();
        let surface = match D {
            1 => 2.0,
            2 => 2.0 * PI,
            _ => 4.0 * PI,
        };
        Self {
            center,
            radius,
            scale: 1.0 / (surface * radial * radius.powi(D as i32)),
        }
    }

    pub fn value(&self, p: &[f64; D]) -> f64 {
        let r2: f64 = (0..D).map(|d| (p[d] - self.center[d]).powi(2)).sum();
        let s = r2.sqrt() / self.radius;
        self.scale * profile(s)
    }
}

fn profile(s: f64) -> f64 {
    if s >= 1.0 {
        0.0
    } else {
        (1.0 - 1.0 / (1.0 - s * s)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn heat_source_matches_the_equation() {
        let u = ExactSolution::<2>::new(ProblemType::Heat, 1.5);
        let (p, t, h) = ([0.3, 0.6], 0.4, 1e-5);
        let u_t = (u.value(&p, t + h) - u.value(&p, t - h)) / (2.0 * h);
        let lap: f64 = (0..2)
            .map(|d| {
                let (mut a, mut b) = (p, p);
                a[d] += h;
                b[d] -= h;
                (u.value(&a, t) - 2.0 * u.value(&p, t) + u.value(&b, t)) / (h * h)
            })
            .sum();
        assert_abs_diff_eq!(u.rhs(&p, t), u_t - lap, epsilon = 1e-4);
        assert_abs_diff_eq!(u.velocity(&p, t), u_t, epsilon = 1e-6);
    }

    #[test]
    fn wave_solution_starts_at_rest_position() {
        let u = ExactSolution::<3>::new(ProblemType::Wave, 1.0);
        let p = [0.5, 0.5, 0.5];
        assert_eq!(u.value(&p, 0.0), 0.0);
        assert_abs_diff_eq!(u.velocity(&p, 0.0), 2.0 * PI, epsilon = 1e-12);
        let g = u.gradient(&[0.25, 0.5, 0.5], 0.125);
        assert_abs_diff_eq!(g[1], 0.0, epsilon = 1e-12);
        assert!(g[0] > 0.0);
    }

    #[test]
    fn bump_has_unit_mass_and_compact_support() {
        let b = CutoffBump::<2>::new([0.5, 0.5], 0.1);
        assert_eq!(b.value(&[0.5, 0.61]), 0.0);
        let n = 400;
        let h = 0.2 / n as f64;
        let mut mass = 0.0;
        for i in 0..n {
            for j in 0..n {
                let p = [0.4 + (i as f64 + 0.5) * h, 0.4 + (j as f64 + 0.5) * h];
                mass += b.value(&p) * h * h;
            }
        }
        assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-3);
    }
}
