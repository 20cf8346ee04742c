//! Piecewise constant diffusion coefficient with optional per-cell random perturbation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed of the coefficient perturbation; fixed so runs are reproducible.
pub const COEFFICIENT_SEED: u64 = 5489;

/// `c1` below `y = 0.2`; above it `c2` left of `x = 0.2` and `c3` elsewhere.
///
/// With a distortion `d > 0` the value is multiplied by a factor drawn uniformly from
/// `[1-d, 1+d]` for each cell of the base subdivision.
#[derive(Clone, Debug)]
pub struct Coefficient<const D: usize> {
    c1: f64,
    c2: f64,
    c3: f64,
    distortion: Option<Distortion<D>>,
}

#[derive(Clone, Debug)]
struct Distortion<const D: usize> {
    subdivisions: [usize; D],
    lower: [f64; D],
    step: [f64; D],
    factors: Vec<f64>,
}

impl<const D: usize> Coefficient<D> {
    pub fn new(c1: f64, c2: f64, c3: f64) -> Self {
        Self {
            c1,
            c2,
            c3,
            distortion: None,
        }
    }

    /// Default values `1, 9, 16`.
    pub fn layered() -> Self {
        Self::new(1.0, 9.0, 16.0)
    }

    /// Perturb each base cell of the `subdivisions` grid over `[lower, upper]`.
    pub fn with_distortion(
        mut self,
        distort: f64,
        subdivisions: [usize; D],
        lower: [f64; D],
        upper: [f64; D],
    ) -> Self {
        if distort == 0.0 {
            self.distortion = None;
            return self;
        }
        let n: usize = subdivisions.iter().product();
        let mut rng = StdRng::seed_from_u64(COEFFICIENT_SEED);
        let factors = (0..n)
            .map(|_| rng.gen_range(1.0 - distort..=1.0 + distort))
            .collect();
        self.distortion = Some(Distortion {
            subdivisions,
            lower,
            step: std::array::from_fn(|d| (upper[d] - lower[d]) / subdivisions[d] as f64),
            factors,
        });
        self
    }

    pub fn value(&self, p: &[f64; D]) -> f64 {
        let (x, y) = (p[0], if D > 1 { p[1] } else { 0.0 });
        let base = if y >= 0.2 {
            if x < 0.2 { self.c2 } else { self.c3 }
        } else {
            self.c1
        };
        match &self.distortion {
            None => base,
            Some(dist) => {
                let mut idx = 0;
                for d in (0..D).rev() {
                    let i = ((p[d] - dist.lower[d]) / dist.step[d]).floor().max(0.0) as usize;
                    idx = idx * dist.subdivisions[d] + i.min(dist.subdivisions[d] - 1);
                }
                base * dist.factors[idx]
            }
        }
    }
}
