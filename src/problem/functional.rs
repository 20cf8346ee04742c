//! Point values of the solution, sampled in time and appended to a text log.

use crate::core::block_vector::BlockVector;
use crate::error::KError;
use crate::fe::space::FeSpace;
use crate::fe::tools::point_value;
use crate::time::TimeBasis;
use faer::Mat;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Records `u(p, t)` for a fixed set of points at `(k+1)²` equidistant times per step.
///
/// Each line holds the time followed by one value per point; every step ends with a blank line.
pub struct PointFunctional<const D: usize> {
    points: Vec<[f64; D]>,
    basis: TimeBasis,
    time_evaluator: Mat<f64>,
    /// Point values at the end of the previous step.
    previous: Vec<f64>,
    path: PathBuf,
}

impl<const D: usize> PointFunctional<D> {
    /// `initial` is the field the first slab starts from.
    pub fn new(
        space: &FeSpace<D>,
        points: Vec<[f64; D]>,
        basis: TimeBasis,
        initial: &[f64],
        path: impl Into<PathBuf>,
    ) -> Self {
        let samples = (basis.degree() + 1) * (basis.degree() + 1);
        let time_evaluator = basis.evaluation_matrix::<f64>(samples);
        let previous = evaluate(space, &points, initial);
        Self {
            points,
            basis,
            time_evaluator,
            previous,
            path: path.into(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.time_evaluator.nrows()
    }

    /// Sample every step of the slab starting at `time` and append the rows.
    pub fn record(
        &mut self,
        space: &FeSpace<D>,
        x: &BlockVector<f64>,
        time: f64,
        tau: f64,
        n_steps: usize,
    ) -> Result<(), KError> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        self.write_slab(&mut out, space, x, time, tau, n_steps)?;
        out.flush()?;
        Ok(())
    }

    fn write_slab(
        &mut self,
        out: &mut impl Write,
        space: &FeSpace<D>,
        x: &BlockVector<f64>,
        time: f64,
        tau: f64,
        n_steps: usize,
    ) -> Result<(), KError> {
        let per_step = self.basis.dofs_per_step();
        let shift = usize::from(self.basis.kind().is_cgp());
        let n_points = self.points.len();
        let samples = self.n_samples();
        let sample_step = if samples > 1 { 1.0 / (samples - 1) as f64 } else { 0.0 };
        for it in 0..n_steps {
            let mut nodal = Mat::<f64>::zeros(self.basis.trial().len(), n_points);
            if shift == 1 {
                for (c, &v) in self.previous.iter().enumerate() {
                    nodal[(0, c)] = v;
                }
            }
            let mut last = Vec::new();
            for t_dof in 0..per_step {
                last = evaluate(space, &self.points, x.block(it * per_step + t_dof));
                for (c, &v) in last.iter().enumerate() {
                    nodal[(t_dof + shift, c)] = v;
                }
            }
            let values = &self.time_evaluator * &nodal;
            for row in 0..samples {
                let t = time + tau * (it as f64 + row as f64 * sample_step);
                write!(out, "{:>16}", c_scientific(t))?;
                for c in 0..n_points {
                    write!(out, "{:>16}{}", " ", c_scientific(values[(row, c)]))?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
            self.previous = last;
        }
        Ok(())
    }
}

/// Values at `points`; points outside the mesh read as NaN.
fn evaluate<const D: usize>(space: &FeSpace<D>, points: &[[f64; D]], v: &[f64]) -> Vec<f64> {
    points
        .iter()
        .map(|p| point_value(space, v, p).unwrap_or(f64::NAN))
        .collect()
}

/// `printf("%e")` formatting: six digits and a signed exponent of at least two digits.
fn c_scientific(v: f64) -> String {
    let s = format!("{v:.6e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}
