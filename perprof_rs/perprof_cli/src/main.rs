use std::io;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod args;
mod backend;

use args::{process_arguments, Args};
use backend::build_profiler;

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let (parser, profiler) = process_arguments(args).context("invalid arguments")?;
    debug!(
        "backend={} format={:?} tables={}",
        profiler.backend,
        profiler.output_format,
        parser.sources.len()
    );

    let t_load = Instant::now();
    let profiler = build_profiler(&parser, &profiler).context("failed to load solver tables")?;
    let data = profiler.data();
    info!(
        "{} solvers, {} problems loaded in {:.3}s",
        data.solvers().len(),
        data.problems().len(),
        t_load.elapsed().as_secs_f64()
    );
    for summary in data.summary() {
        if summary.solved == 0 {
            warn!("{}: solved 0 of {}", summary.name, summary.total);
        } else {
            info!("{}: solved {} of {}", summary.name, summary.solved, summary.total);
        }
    }

    if !data.any_success() {
        warn!("no solver solved any problem");
    }

    profiler.plot()?;
    if let Some(path) = profiler.output() {
        debug!(
            "{} profile written to {}",
            profiler.options().backend,
            path.display()
        );
    }
    Ok(())
}
