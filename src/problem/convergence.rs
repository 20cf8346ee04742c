//! The convergence study: one space-time run per time degree and refinement.

use crate::config::Parameters;
use crate::core::block_vector::BlockVector;
use crate::core::scalar::Scalar;
use crate::error::KError;
use crate::fe::mesh::Mesh;
use crate::fe::space::FeSpace;
use crate::fe::tools::interpolate;
use crate::integrator::{
    SlabPreconditioner, SourceFn, TimeIntegrator, TimeIntegratorHeat, TimeIntegratorWave,
};
use crate::multigrid::{ProblemType, SpaceTimeMultigrid, TimeLevel, coarsening_sequence};
use crate::operator::{Coefficient, MatrixFreeOperator, SpatialOperator};
use crate::problem::error_calculator::{ErrorCalculator, SlabErrors};
use crate::problem::exact::{CutoffBump, ExactSolution};
use crate::problem::functional::PointFunctional;
use crate::time::TimeBasis;
use crate::utils::timer::Timer;
use log::{debug, info};
use std::fmt::Write;
use std::sync::Arc;

/// Seed of the random grid distortion.
pub const GRID_SEED: u64 = 42;

/// Spatial dimension of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Two,
    Three,
}

impl Dimension {
    pub fn value(self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }
}

impl TryFrom<usize> for Dimension {
    type Error = KError;

    fn try_from(dim: usize) -> Result<Self, KError> {
        match dim {
            2 => Ok(Dimension::Two),
            3 => Ok(Dimension::Three),
            _ => Err(KError::InvalidParameter(format!("dimension {dim} is not 2 or 3"))),
        }
    }
}

/// Error norms over the whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorNorms {
    pub linfty: f64,
    pub l2: f64,
    pub h1_semi: f64,
}

/// Results of one `(k, r)` run.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceRow {
    pub k: usize,
    pub refinement: usize,
    pub cells: usize,
    pub s_dofs: usize,
    pub t_dofs: usize,
    pub st_dofs: usize,
    pub work: usize,
    /// Present in convergence runs only.
    pub errors: Option<ErrorNorms>,
    pub total_iterations: usize,
    pub n_slabs: usize,
}

impl ConvergenceRow {
    pub fn average_iterations(&self) -> f64 {
        if self.n_slabs == 0 {
            0.0
        } else {
            self.total_iterations as f64 / self.n_slabs as f64
        }
    }
}

/// Run every `(k, r)` pair of `params`, logging a table per degree and the iteration table.
pub fn run_convergence_study(
    params: &Parameters,
    dim: Dimension,
    precondition_float: bool,
) -> Result<Vec<ConvergenceRow>, KError> {
    params.validate(dim.value())?;
    let mut rows = Vec::new();
    for k in params.fe_degree..params.fe_degree + params.n_deg_cycles {
        let start = rows.len();
        for r in params.refinement..params.refinement + params.n_ref_cycles {
            let row = match (dim, precondition_float) {
                (Dimension::Two, true) => run_case::<2, f32>(params, k, r)?,
                (Dimension::Two, false) => run_case::<2, f64>(params, k, r)?,
                (Dimension::Three, true) => run_case::<3, f32>(params, k, r)?,
                (Dimension::Three, false) => run_case::<3, f64>(params, k, r)?,
            };
            rows.push(row);
        }
        info!("Convergence table k={k}\n{}", convergence_table(&rows[start..]));
    }
    info!("Iteration count table\n{}", iteration_table(&rows));
    Ok(rows)
}

enum Stepper<const D: usize> {
    Heat(TimeIntegratorHeat<D>),
    Wave {
        integrator: TimeIntegratorWave<D>,
        v: BlockVector<f64>,
    },
}

/// One space-time solve over `[0, end_time]` with time degree `k` on refinement `r`.
pub fn run_case<const D: usize, T: Scalar>(
    params: &Parameters,
    k: usize,
    r: usize,
) -> Result<ConvergenceRow, KError> {
    let kind = params.time_type;
    kind.check_degree(k)?;
    if r < 1 {
        return Err(KError::InvalidRefinement(r));
    }
    let geometry = params.geometry::<D>()?;
    let mut mesh = Mesh::hyper_rectangle(geometry.subdivisions, geometry.lower, geometry.upper, r)?;
    let spc_step = mesh.base_minimal_cell_diameter() / (D as f64).sqrt();
    if params.distort_grid != 0.0 {
        mesh.distort_random(params.distort_grid, GRID_SEED);
    }
    let space = Arc::new(FeSpace::new(mesh.clone(), k + 1)?);
    let error_space = Arc::new(FeSpace::with_quadrature(mesh, k + 1, k + 3, true)?);
    let n_dofs = space.n_dofs();
    info!(":: Number of active cells: {}", space.n_cells());
    info!(":: Number of degrees of freedom: {n_dofs}");

    let n_at_once = params.n_timesteps_at_once;
    let end_time = params.end_time;
    let n_steps = ((end_time / spc_step) as usize).max(1);
    let tau = end_time * 0.5f64.powi(r as i32 + 1) / n_steps as f64;
    let basis = TimeBasis::new(kind, k)?;
    let n_blocks = basis.dofs_per_step() * n_at_once;
    let conv_test = params.space_time_conv_test;

    let coefficient = if conv_test {
        None
    } else {
        Some(Coefficient::<D>::layered().with_distortion(
            params.distort_coeff,
            geometry.subdivisions,
            geometry.lower,
            geometry.upper,
        ))
    };
    let coefficient_fn = |p: &[f64; D]| coefficient.as_ref().map_or(1.0, |c| c.value(p));
    let coefficient_ref: Option<&(dyn Fn(&[f64; D]) -> f64 + Sync)> = if coefficient.is_some() {
        Some(&coefficient_fn)
    } else {
        None
    };

    let mut k_mf = MatrixFreeOperator::<f64, D>::laplace(Arc::clone(&space));
    if coefficient.is_some() {
        k_mf.set_coefficient(coefficient_fn);
    }
    let k_op: Arc<dyn SpatialOperator<f64>> = Arc::new(k_mf);
    let m_op: Arc<dyn SpatialOperator<f64>> =
        Arc::new(MatrixFreeOperator::<f64, D>::mass(Arc::clone(&space)));

    let timer = Arc::new(Timer::new());
    let (k_min, n_min) = if params.space_time_mg {
        (params.time_degree_min(k), params.n_timesteps_at_once_min.max(1))
    } else {
        (k, n_at_once)
    };
    let sequence = coarsening_sequence(r, k, k_min, n_at_once, n_min, params.time_before_space);
    let finest_time = TimeLevel {
        kind,
        k,
        n_steps: n_at_once,
        tau,
    };
    let mg = SpaceTimeMultigrid::<T>::new(
        Arc::clone(&space),
        finest_time,
        params.problem,
        &sequence,
        coefficient_ref,
        params.multigrid_settings(),
    )?
    .with_timer(Arc::clone(&timer));
    info!(":: Min Level 0  Max Level {}", mg.max_level());
    let preconditioner: SlabPreconditioner = Box::new(mg);

    let exact = ExactSolution::<D>::new(params.problem, params.frequency);
    let source: Option<SourceFn<D>> = if conv_test {
        Some(Arc::new(move |p: &[f64; D], t: f64| exact.rhs(p, t)))
    } else {
        None
    };
    let bump = CutoffBump::new(params.source_point::<D>()?, params.source_radius);
    let initial_u = |p: &[f64; D]| if conv_test { exact.value(p, 0.0) } else { bump.value(p) };
    let initial_v = |p: &[f64; D]| if conv_test { exact.velocity(p, 0.0) } else { 0.0 };

    let mut x = BlockVector::<f64>::new(n_blocks, n_dofs);
    let mut u0: Vec<f64> = interpolate(&space, initial_u);
    space.constraints.distribute(&mut u0);
    x.block_mut(n_blocks - 1).copy_from_slice(&u0);

    let settings = params.solver_settings();
    let timer_opt = Some(Arc::clone(&timer));
    let mut stepper = match params.problem {
        ProblemType::Heat => Stepper::Heat(TimeIntegratorHeat::new(
            &space, k_op, m_op, kind, k, tau, n_at_once, preconditioner, source, settings, timer_opt,
        )?),
        ProblemType::Wave => {
            let mut v = x.zeros_like();
            let mut v0: Vec<f64> = interpolate(&space, initial_v);
            space.constraints.distribute(&mut v0);
            v.block_mut(n_blocks - 1).copy_from_slice(&v0);
            Stepper::Wave {
                integrator: TimeIntegratorWave::new(
                    &space, k_op, m_op, kind, k, tau, n_at_once, preconditioner, source, settings,
                    timer_opt,
                )?,
                v,
            }
        }
    };

    let error_calculator = ErrorCalculator::new(Arc::clone(&error_space), basis.clone());
    let mut functional = if conv_test {
        None
    } else {
        Some(PointFunctional::new(
            &space,
            params.evaluation_points::<D>()?,
            basis,
            &u0,
            &params.functional_file,
        ))
    };

    let mut time = 0.0;
    let mut step_number = 0;
    let mut total_iterations = 0;
    let mut errors = SlabErrors::default();
    let slab_length = n_at_once as f64 * tau;
    while time < end_time - 1e-12 * end_time {
        let _step = timer.scope("step");
        step_number += 1;
        debug!("Step {step_number} t = {time}");
        let prev_x = x.block(n_blocks - 1).to_vec();
        let iterations = match &mut stepper {
            Stepper::Heat(integrator) => {
                integrator.solve(&mut x, &prev_x, step_number, time, tau)?;
                integrator.last_step()
            }
            Stepper::Wave { integrator, v } => {
                let prev_v = v.block(n_blocks - 1).to_vec();
                integrator.solve(&mut x, v, &prev_x, &prev_v, step_number, time, tau)?;
                integrator.last_step()
            }
        };
        total_iterations += iterations;
        if conv_test {
            let e = error_calculator.evaluate_error(&exact, time, tau, &x, &prev_x, n_at_once);
            errors.l2_squared += e.l2_squared;
            errors.h1_semi_squared += e.h1_semi_squared;
            errors.linfty = errors.linfty.max(e.linfty);
        } else if let Some(f) = functional.as_mut() {
            f.record(&space, &x, time, tau, n_at_once)?;
        }
        time += slab_length;
    }

    let row = ConvergenceRow {
        k,
        refinement: r,
        cells: space.n_cells(),
        s_dofs: n_dofs,
        t_dofs: n_blocks,
        st_dofs: step_number * n_dofs * n_blocks,
        work: n_dofs * n_blocks * total_iterations,
        errors: conv_test.then(|| ErrorNorms {
            linfty: errors.linfty,
            l2: errors.l2_squared.sqrt(),
            h1_semi: errors.h1_semi_squared.sqrt(),
        }),
        total_iterations,
        n_slabs: step_number,
    };
    info!(
        "Average GMRES iterations {} ({} gmres_iterations / {} timesteps)",
        row.average_iterations(),
        total_iterations,
        step_number
    );
    if params.print_timing {
        timer.log_summary();
    }
    Ok(row)
}

/// Rate `log2(e_prev / e)` between consecutive rows.
fn rate(prev: Option<f64>, cur: f64) -> String {
    match prev {
        Some(p) if p > 0.0 && cur > 0.0 => format!("{:.2}", (p / cur).log2()),
        _ => "-".into(),
    }
}

/// Table of sizes, work and error norms with log2 reduction rates.
pub fn convergence_table(rows: &[ConvergenceRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>8} {:>10} {:>6} {:>12} {:>12} {:>12} {:>6} {:>12} {:>6} {:>12} {:>6}",
        "cells", "s-dofs", "t-dofs", "st-dofs", "work", "L∞-L∞", "", "L2-L2", "", "L2-H1_semi", ""
    );
    let mut prev: Option<ErrorNorms> = None;
    for row in rows {
        let _ = write!(
            out,
            "{:>8} {:>10} {:>6} {:>12} {:>12}",
            row.cells, row.s_dofs, row.t_dofs, row.st_dofs, row.work
        );
        match row.errors {
            Some(e) => {
                let _ = write!(
                    out,
                    " {:>12.5e} {:>6} {:>12.5e} {:>6} {:>12.5e} {:>6}",
                    e.linfty,
                    rate(prev.map(|p| p.linfty), e.linfty),
                    e.l2,
                    rate(prev.map(|p| p.l2), e.l2),
                    e.h1_semi,
                    rate(prev.map(|p| p.h1_semi), e.h1_semi)
                );
            }
            None => {
                let _ = write!(out, " {:>12} {:>6} {:>12} {:>6} {:>12} {:>6}", "nan", "-", "nan", "-", "nan", "-");
            }
        }
        let _ = writeln!(out);
        prev = row.errors;
    }
    out
}

/// Average GMRES iterations, one line per degree and one column per refinement.
pub fn iteration_table(rows: &[ConvergenceRow]) -> String {
    let mut refinements: Vec<usize> = rows.iter().map(|r| r.refinement).collect();
    refinements.sort_unstable();
    refinements.dedup();
    let mut degrees: Vec<usize> = rows.iter().map(|r| r.k).collect();
    degrees.sort_unstable();
    degrees.dedup();
    let mut out = String::new();
    let _ = write!(out, "{:>6}", "k \\ r");
    for r in &refinements {
        let _ = write!(out, " {r:>8}");
    }
    let _ = writeln!(out);
    for k in degrees {
        let _ = write!(out, "{k:>6}");
        for &r in &refinements {
            match rows.iter().find(|row| row.k == k && row.refinement == r) {
                Some(row) => {
                    let _ = write!(out, " {:>8.3}", row.average_iterations());
                }
                None => {
                    let _ = write!(out, " {:>8}", "-");
                }
            }
        }
        let _ = writeln!(out);
    }
    out
}
