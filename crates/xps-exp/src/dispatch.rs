use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::{write_experiment_config, ConfigFile, ParamSet};

use crate::expand::{expand_params, persist_parent};
use crate::runner::{Experiment, RepetitionOutcome, Runner};

/// Options governing experiment execution.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Worker threads; 1 runs every repetition serially in work-list order.
    pub workers: usize,
    /// Minimum number of consecutive repetitions handed to one worker.
    pub chunk_size: Option<usize>,
    /// Remove existing files in each experiment directory before running.
    pub delete: bool,
    /// Only run configuration sections with these names (all when empty).
    pub experiments: Vec<String>,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            chunk_size: None,
            delete: false,
            experiments: Vec::new(),
        }
    }
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// False when validation failed and no work was launched.
    pub dispatched: bool,
    /// Concrete experiments after expansion.
    pub experiments: usize,
    /// Repetitions in the work list.
    pub repetitions: usize,
    /// Repetitions that executed at least one iteration.
    pub completed: usize,
    /// Repetitions whose logs were already complete.
    pub skipped: usize,
}

impl RunSummary {
    fn aborted() -> Self {
        Self::default()
    }
}

/// One unit of work: a concrete parameter set and a repetition index.
#[derive(Debug, Clone)]
struct Task {
    params: ParamSet,
    rep: usize,
}

/// Reads `config_path`, applies the experiment filter and runs the result.
pub fn start<E, F>(factory: F, config_path: &Path, opts: &RunOpts) -> Result<RunSummary, XpsError>
where
    E: Experiment,
    F: Fn() -> E + Sync,
{
    let config = ConfigFile::load(config_path)?;
    for wanted in &opts.experiments {
        if !config.section_names().any(|name| name == wanted.as_str()) {
            warn!(experiment = %wanted, "requested experiment not present in config");
        }
    }
    let sets: Vec<ParamSet> = config
        .section_names()
        .filter(|name| {
            opts.experiments.is_empty() || opts.experiments.iter().any(|e| e.as_str() == *name)
        })
        .filter_map(|name| config.section(name))
        .collect();
    run(factory, &sets, opts)
}

/// Expands `sets`, prepares experiment directories and executes every
/// repetition with experiments built by `factory`.
pub fn run<E, F>(factory: F, sets: &[ParamSet], opts: &RunOpts) -> Result<RunSummary, XpsError>
where
    E: Experiment,
    F: Fn() -> E + Sync,
{
    let expansion = match expand_params(sets) {
        Ok(expansion) => expansion,
        Err(XpsError::Validation(info)) => {
            error!(%info, "invalid parameter set, nothing dispatched");
            return Ok(RunSummary::aborted());
        }
        Err(other) => return Err(other),
    };
    for params in &expansion.experiments {
        if let Err(err) = params.validate() {
            error!(%err, "invalid parameter set, nothing dispatched");
            return Ok(RunSummary::aborted());
        }
    }

    for parent in &expansion.parents {
        persist_parent(parent)?;
    }
    for params in &expansion.experiments {
        prepare_dir(params, opts.delete)?;
    }

    let tasks = enumerate_tasks(&expansion.experiments);
    let mut summary = RunSummary {
        dispatched: true,
        experiments: expansion.experiments.len(),
        repetitions: tasks.len(),
        ..RunSummary::default()
    };
    let runner = Runner::new();

    let outcomes = if opts.workers <= 1 {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let mut experiment = factory();
            outcomes.push(runner.run_repetition(&mut experiment, &task.params, task.rep)?);
        }
        outcomes
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .build()
            .map_err(|err| XpsError::Io(ErrorInfo::new("thread-pool", err.to_string())))?;
        let results: Vec<Result<RepetitionOutcome, XpsError>> = pool.install(|| {
            tasks
                .par_iter()
                .with_min_len(opts.chunk_size.unwrap_or(1).max(1))
                .map(|task| {
                    let mut experiment = factory();
                    let result = runner.run_repetition(&mut experiment, &task.params, task.rep);
                    if let Err(err) = &result {
                        error!(
                            experiment = %task.params.name().unwrap_or_default(),
                            rep = task.rep,
                            %err,
                            "repetition failed"
                        );
                    }
                    result
                })
                .collect()
        });
        results.into_iter().collect::<Result<Vec<_>, _>>()?
    };

    for outcome in outcomes {
        match outcome {
            RepetitionOutcome::Skipped => summary.skipped += 1,
            RepetitionOutcome::Completed { .. } => summary.completed += 1,
        }
    }
    info!(
        experiments = summary.experiments,
        repetitions = summary.repetitions,
        completed = summary.completed,
        skipped = summary.skipped,
        "dispatch finished"
    );
    Ok(summary)
}

/// Creates the experiment directory, optionally clears its files, and
/// writes the experiment's configuration record.
fn prepare_dir(params: &ParamSet, delete: bool) -> Result<(), XpsError> {
    let Some(dir) = params.dir() else {
        return Err(XpsError::Validation(ErrorInfo::new(
            "missing-required-keys",
            "experiment needs 'name' and 'path'",
        )));
    };
    fs::create_dir_all(&dir).map_err(|err| XpsError::io("experiment-dir", &dir, err))?;
    if delete {
        let entries = fs::read_dir(&dir).map_err(|err| XpsError::io("experiment-list", &dir, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| XpsError::io("experiment-list", &dir, err))?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|err| XpsError::io("experiment-clear", &path, err))?;
            }
        }
    }
    write_experiment_config(params, &dir)
}

fn enumerate_tasks(experiments: &[ParamSet]) -> Vec<Task> {
    let mut tasks = Vec::new();
    for params in experiments {
        for rep in 0..params.repetitions().unwrap_or(0) {
            tasks.push(Task {
                params: params.clone(),
                rep,
            });
        }
    }
    tasks
}
