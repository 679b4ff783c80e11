//! Locating experiments on disk and summarising their progress.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;
use xps_core::errors::XpsError;
use xps_core::{read_experiment_config, ConfigFile, ParamSet, EXPERIMENT_CFG};

use crate::log::{inspect_log, log_path};

fn is_experiment(dir: &Path) -> bool {
    dir.join(EXPERIMENT_CFG).is_file()
}

/// Every directory below `root` that holds an experiment record and has no
/// experiment beneath it, sorted. An absent root yields nothing.
pub fn get_exps(root: &Path) -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir() && is_experiment(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    let mut leaves: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| !dirs.iter().any(|other| other != *dir && other.starts_with(dir)))
        .cloned()
        .collect();
    leaves.sort();
    leaves
}

/// Parameters of the experiment stored at `exp`.
pub fn get_params(exp: &Path) -> Result<ParamSet, XpsError> {
    read_experiment_config(exp)
}

/// Directories below `root` whose record is titled `name`.
pub fn find_exp(name: &str, root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == EXPERIMENT_CFG)
        .filter(|entry| {
            ConfigFile::load(entry.path())
                .map(|config| config.section_names().any(|section| section == name))
                .unwrap_or(false)
        })
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();
    found.sort();
    found
}

/// Integer percentage of iterations logged by repetition `rep`.
pub fn progress(params: &ParamSet, rep: usize) -> Result<u32, XpsError> {
    let Some(dir) = params.dir() else {
        return Ok(0);
    };
    let iterations = params.iterations().unwrap_or(0);
    if iterations == 0 {
        return Ok(0);
    }
    let rows = inspect_log(&log_path(&dir, rep))?.map_or(0, |status| status.rows);
    Ok((100 * rows.min(iterations) / iterations) as u32)
}

/// Mean progress over all repetitions of an experiment.
pub fn experiment_progress(params: &ParamSet) -> Result<u32, XpsError> {
    let reps = params.repetitions().unwrap_or(0);
    if reps == 0 {
        return Ok(0);
    }
    let mut total = 0u32;
    for rep in 0..reps {
        total += progress(params, rep)?;
    }
    Ok(total / reps as u32)
}

/// Summary of one experiment directory for browsing.
#[derive(Debug, Clone)]
pub struct ExperimentInfo {
    pub dir: PathBuf,
    pub params: ParamSet,
    /// Earliest modification time among the record and its logs.
    pub started: Option<SystemTime>,
    /// Latest modification time among its logs.
    pub finished: Option<SystemTime>,
    pub progress: u32,
}

pub fn describe(exp: &Path) -> Result<ExperimentInfo, XpsError> {
    let params = get_params(exp)?;
    let mut started: Option<SystemTime> = None;
    let mut finished: Option<SystemTime> = None;
    let entries = fs::read_dir(exp).map_err(|err| XpsError::io("experiment-list", exp, err))?;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_log = path.extension().is_some_and(|ext| ext == "log");
        let is_cfg = path.extension().is_some_and(|ext| ext == "cfg");
        if !(is_log || is_cfg) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
            continue;
        };
        started = Some(started.map_or(modified, |s| s.min(modified)));
        if is_log {
            finished = Some(finished.map_or(modified, |f| f.max(modified)));
        }
    }
    let progress = experiment_progress(&params)?;
    Ok(ExperimentInfo {
        dir: exp.to_path_buf(),
        params,
        started,
        finished,
        progress,
    })
}
