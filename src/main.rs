//! Space-time convergence study driver.
//!
//! Usage:
//!   stmg -f params.json -d 2
//!   stmg -f params.json -d 3 --precondition-float false
//!   RUST_LOG=debug stmg -f params.json

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use stmg::{Dimension, Parameters, run_convergence_study};

#[derive(Parser, Debug)]
#[command(name = "stmg", about = "Space-time multigrid solver for the heat and wave equations")]
struct Args {
    /// Path to a JSON parameter file; defaults are used when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Spatial dimension (2 or 3)
    #[arg(short, long, default_value_t = 2)]
    dim: usize,

    /// Run the multigrid preconditioner in single precision
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    precondition_float: bool,

    /// Worker threads for cell loops and patch solves (default: all cores)
    #[arg(short, long)]
    threads: Option<usize>,
}

fn run(args: &Args) -> Result<(), stmg::KError> {
    let params = match &args.file {
        Some(path) => Parameters::from_file(path)?,
        None => Parameters::default(),
    };
    let dim = Dimension::try_from(args.dim)?;

    #[cfg(feature = "rayon")]
    {
        let threads = args.threads.unwrap_or_else(num_cpus::get);
        // The global pool can only be set once; a second call keeps the existing pool.
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global();
        info!("Using {threads} threads");
    }

    info!(
        "{:?} problem, {:?} in time, {}D, preconditioner in {}",
        params.problem,
        params.time_type,
        dim.value(),
        if args.precondition_float { "f32" } else { "f64" }
    );
    let rows = run_convergence_study(&params, dim, args.precondition_float)?;
    info!("Finished {} runs", rows.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
