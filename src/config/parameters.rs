//! Run parameters read from JSON parameter files.
//!
//! Every field has a default, so a parameter file only lists what differs. Geometry fields are
//! stored as plain vectors and checked against the spatial dimension by
//! [`Parameters::validate`].

use crate::error::KError;
use crate::integrator::SolverSettings;
use crate::multigrid::{MultigridSettings, ProblemType, SmootherType};
use crate::preconditioner::PatchType;
use crate::time::TimeStepType;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    #[serde(rename = "type")]
    pub time_type: TimeStepType,
    pub problem: ProblemType,
    /// Polynomial degree in time; space uses `Q_{fe_degree+1}`.
    pub fe_degree: usize,
    pub n_deg_cycles: usize,
    pub refinement: usize,
    pub n_ref_cycles: usize,
    pub n_timesteps_at_once: usize,
    pub n_timesteps_at_once_min: usize,
    pub fe_degree_min: usize,
    pub space_time_mg: bool,
    pub time_before_space: bool,
    pub end_time: f64,
    pub frequency: f64,
    pub subdivisions: Vec<usize>,
    pub hyperrect_lower_left: Vec<f64>,
    pub hyperrect_upper_right: Vec<f64>,
    pub distort_grid: f64,
    pub distort_coeff: f64,
    /// Centre of the initial bump outside convergence runs.
    pub source: Vec<f64>,
    pub source_radius: f64,
    pub evaluation_points: Vec<Vec<f64>>,
    pub space_time_conv_test: bool,
    pub extrapolate: bool,
    pub functional_file: String,
    pub print_timing: bool,
    pub solver_tolerance: f64,
    pub solver_max_iterations: usize,
    pub solver_restart: usize,
    pub smoothing_steps: usize,
    /// Smoother damping; without a value the smoother's own default applies.
    pub smoothing_damping: Option<f64>,
    pub smoother: SmootherType,
    pub patch_type: PatchType,
    pub coarse_direct_max: usize,
    pub coarse_smoothing_steps: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            time_type: TimeStepType::Dg,
            problem: ProblemType::Heat,
            fe_degree: 1,
            n_deg_cycles: 1,
            refinement: 2,
            n_ref_cycles: 1,
            n_timesteps_at_once: 1,
            n_timesteps_at_once_min: 1,
            fe_degree_min: 0,
            space_time_mg: true,
            time_before_space: false,
            end_time: 1.0,
            frequency: 1.0,
            subdivisions: Vec::new(),
            hyperrect_lower_left: Vec::new(),
            hyperrect_upper_right: Vec::new(),
            distort_grid: 0.0,
            distort_coeff: 0.0,
            source: Vec::new(),
            source_radius: 1e-2,
            evaluation_points: Vec::new(),
            space_time_conv_test: true,
            extrapolate: false,
            functional_file: "functionals.txt".into(),
            print_timing: false,
            solver_tolerance: 1e-12,
            solver_max_iterations: 100,
            solver_restart: 100,
            smoothing_steps: 1,
            smoothing_damping: None,
            smoother: SmootherType::Vanka,
            patch_type: PatchType::Vertex,
            coarse_direct_max: 4000,
            coarse_smoothing_steps: 10,
        }
    }
}

/// Box and base subdivision of the spatial domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry<const D: usize> {
    pub subdivisions: [usize; D],
    pub lower: [f64; D],
    pub upper: [f64; D],
}

impl Parameters {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(text: &str) -> Result<Self, KError> {
        Ok(serde_json::from_str(text)?)
    }

    /// All configuration checks, run before any setup work.
    pub fn validate(&self, dim: usize) -> Result<(), KError> {
        if dim != 2 && dim != 3 {
            return Err(KError::InvalidParameter(format!("dimension {dim} is not 2 or 3")));
        }
        self.time_type.check_degree(self.fe_degree)?;
        if self.refinement < 1 {
            return Err(KError::InvalidRefinement(self.refinement));
        }
        if self.n_deg_cycles == 0 || self.n_ref_cycles == 0 {
            return Err(invalid("cycle counts must be positive"));
        }
        if self.n_timesteps_at_once == 0 || self.n_timesteps_at_once_min == 0 {
            return Err(invalid("steps at once must be positive"));
        }
        if self.n_timesteps_at_once_min > self.n_timesteps_at_once {
            return Err(invalid("n_timesteps_at_once_min exceeds n_timesteps_at_once"));
        }
        if self.end_time.is_nan() || self.end_time <= 0.0 {
            return Err(invalid("end_time must be positive"));
        }
        if self.solver_tolerance.is_nan()
            || self.solver_tolerance <= 0.0
            || self.solver_max_iterations == 0
            || self.solver_restart == 0
        {
            return Err(invalid("solver tolerance and iteration limits must be positive"));
        }
        if self.smoothing_damping.is_some_and(|w| w.is_nan() || w <= 0.0) {
            return Err(invalid("smoothing damping must be positive"));
        }
        if !(0.0..0.5).contains(&self.distort_grid) {
            return Err(invalid("distort_grid must lie in [0, 0.5)"));
        }
        if !(0.0..1.0).contains(&self.distort_coeff) {
            return Err(invalid("distort_coeff must lie in [0, 1)"));
        }
        check_len("subdivisions", self.subdivisions.len(), dim)?;
        check_len("hyperrect_lower_left", self.hyperrect_lower_left.len(), dim)?;
        check_len("hyperrect_upper_right", self.hyperrect_upper_right.len(), dim)?;
        check_len("source", self.source.len(), dim)?;
        for p in &self.evaluation_points {
            if p.len() != dim {
                return Err(KError::mismatch("evaluation point", dim, p.len()));
            }
        }
        if self.subdivisions.contains(&0) {
            return Err(invalid("subdivisions must be positive"));
        }
        let lower = self.hyperrect_lower_left.iter();
        let upper = self.hyperrect_upper_right.iter();
        if lower.zip(upper).any(|(l, u)| u <= l) {
            return Err(invalid("upper right corner must exceed lower left corner"));
        }
        Ok(())
    }

    /// Domain in `D` dimensions; empty lists mean one unit cell per direction.
    pub fn geometry<const D: usize>(&self) -> Result<Geometry<D>, KError> {
        Ok(Geometry {
            subdivisions: array_or(&self.subdivisions, 1)?,
            lower: array_or(&self.hyperrect_lower_left, 0.0)?,
            upper: array_or(&self.hyperrect_upper_right, 1.0)?,
        })
    }

    /// Centre of the initial bump, by default the middle of the domain.
    pub fn source_point<const D: usize>(&self) -> Result<[f64; D], KError> {
        if self.source.is_empty() {
            let g = self.geometry::<D>()?;
            return Ok(std::array::from_fn(|d| 0.5 * (g.lower[d] + g.upper[d])));
        }
        array_or(&self.source, 0.0)
    }

    /// Points where functionals are recorded.
    pub fn evaluation_points<const D: usize>(&self) -> Result<Vec<[f64; D]>, KError> {
        if self.evaluation_points.is_empty() {
            let defaults: Vec<Vec<f64>> = match D {
                2 => vec![vec![0.75, 0.0]],
                _ => vec![vec![0.75, 0.0, 0.0], vec![0.0, 0.0, 0.75], vec![0.75, 0.1, 0.75]],
            };
            return defaults.iter().map(|p| array_or(p, 0.0)).collect();
        }
        self.evaluation_points.iter().map(|p| array_or(p, 0.0)).collect()
    }

    /// Lowest time degree reached by degree coarsening.
    pub fn time_degree_min(&self, k: usize) -> usize {
        self.fe_degree_min.max(self.time_type.minimum_degree()).min(k)
    }

    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            tolerance: self.solver_tolerance,
            max_iterations: self.solver_max_iterations,
            restart: self.solver_restart,
            extrapolate: self.extrapolate,
        }
    }

    pub fn multigrid_settings(&self) -> MultigridSettings {
        MultigridSettings {
            smoothing_steps: self.smoothing_steps,
            damping: self.smoothing_damping.unwrap_or_else(|| self.smoother.default_damping()),
            smoother: self.smoother,
            patch_type: self.patch_type,
            coarse_direct_max: self.coarse_direct_max,
            coarse_smoothing_steps: self.coarse_smoothing_steps,
        }
    }
}

fn invalid(msg: &str) -> KError {
    KError::InvalidParameter(msg.to_string())
}

fn check_len(what: &'static str, len: usize, dim: usize) -> Result<(), KError> {
    if len != 0 && len != dim {
        return Err(KError::mismatch(what, dim, len));
    }
    Ok(())
}

fn array_or<T: Copy, const D: usize>(v: &[T], default: T) -> Result<[T; D], KError> {
    match v.len() {
        0 => Ok([default; D]),
        n if n == D => Ok(std::array::from_fn(|d| v[d])),
        n => Err(KError::mismatch("coordinate list", D, n)),
    }
}
