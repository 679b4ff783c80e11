use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tracing::{error, info};
use xps_exp::{start, Experiment, RunOpts};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file with one section per experiment.
    #[arg(short, long, default_value = "experiments.cfg")]
    pub config: PathBuf,
    /// Worker threads; defaults to the number of available cores.
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,
    /// Minimum number of repetitions handed to a worker at once.
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Delete files in experiment directories before running.
    #[arg(short, long)]
    pub delete: bool,
    /// Only run the named experiments; repeatable.
    #[arg(short = 'e', long = "experiment", value_name = "NAME")]
    pub experiments: Vec<String>,
}

impl RunArgs {
    pub fn opts(&self) -> RunOpts {
        let defaults = RunOpts::default();
        RunOpts {
            workers: self.workers.unwrap_or(defaults.workers),
            chunk_size: self.chunk_size,
            delete: self.delete,
            experiments: self.experiments.clone(),
        }
    }
}

pub fn run<E, F>(args: &RunArgs, factory: F) -> Result<(), Box<dyn Error>>
where
    E: Experiment,
    F: Fn() -> E + Sync,
{
    let summary = start(factory, &args.config, &args.opts())?;
    if !summary.dispatched {
        error!(
            config = %args.config.display(),
            "invalid experiment configuration, nothing was run"
        );
        return Err("invalid experiment configuration, nothing was run".into());
    }
    info!(
        config = %args.config.display(),
        experiments = summary.experiments,
        repetitions = summary.repetitions,
        completed = summary.completed,
        skipped = summary.skipped,
        "run finished"
    );
    Ok(())
}
