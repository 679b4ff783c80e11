use std::collections::BTreeSet;
use std::fs;
use std::sync::Mutex;

use tracing::{debug, info, warn};
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::ParamSet;

use crate::log::{inspect_log, log_path, LogWriter, Row};

/// User experiment hooks invoked by the [`Runner`].
///
/// A fresh instance handles each repetition, so per-repetition state can
/// live in `self`. Every hook error is propagated unchanged to the caller.
pub trait Experiment {
    /// Whether an interrupted repetition may continue from its last logged
    /// row. When false, partial logs are discarded and the repetition
    /// restarts at iteration 0.
    const RESTORE_SUPPORTED: bool = false;

    /// Called once at the start of every repetition, fresh or resumed.
    fn reset(&mut self, _params: &ParamSet, _rep: usize) -> Result<(), XpsError> {
        Ok(())
    }

    /// Executes iteration `n` and returns the values to log.
    fn iterate(&mut self, params: &ParamSet, rep: usize, n: usize) -> Result<Row, XpsError>;

    /// Persists whatever is needed to resume after iteration `n`.
    /// Only called when [`Experiment::RESTORE_SUPPORTED`] is set.
    fn save_state(&mut self, _params: &ParamSet, _rep: usize, _n: usize) -> Result<(), XpsError> {
        Ok(())
    }

    /// Rebuilds in-memory state for a repetition with `n` logged rows; the
    /// next iteration to run is `n`.
    fn restore_state(
        &mut self,
        _params: &ParamSet,
        _rep: usize,
        _n: usize,
    ) -> Result<(), XpsError> {
        Ok(())
    }

    /// Called once after the last iteration of a repetition.
    fn finalize(&mut self, _params: &ParamSet, _rep: usize) -> Result<(), XpsError> {
        Ok(())
    }
}

/// What a call to [`Runner::run_repetition`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepetitionOutcome {
    /// The log was already complete; nothing ran.
    Skipped,
    /// Iterations `resumed_from..iterations` ran and were logged.
    Completed { resumed_from: usize },
}

/// Executes repetitions and owns the once-per-tag rename warnings.
#[derive(Debug, Default)]
pub struct Runner {
    warned_tags: Mutex<BTreeSet<String>>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs (or resumes, or skips) repetition `rep` of a concrete experiment.
    pub fn run_repetition<E: Experiment>(
        &self,
        experiment: &mut E,
        params: &ParamSet,
        rep: usize,
    ) -> Result<RepetitionOutcome, XpsError> {
        let name = params.name().unwrap_or_default();
        let (Some(dir), Some(iterations)) = (params.dir(), params.iterations()) else {
            return Err(XpsError::Validation(
                ErrorInfo::new(
                    "missing-required-keys",
                    "repetition needs 'name', 'path' and a positive 'iterations'",
                )
                .with_context("experiment", name),
            ));
        };
        fs::create_dir_all(&dir).map_err(|err| XpsError::io("experiment-dir", &dir, err))?;
        let path = log_path(&dir, rep);
        let status = inspect_log(&path)?;
        let logged = status.as_ref().map_or(0, |status| status.rows);

        if logged >= iterations {
            if logged > iterations {
                warn!(experiment = %name, rep, logged, iterations, "log holds more rows than configured iterations");
            }
            debug!(experiment = %name, rep, "repetition already complete");
            return Ok(RepetitionOutcome::Skipped);
        }

        let resume_from = if E::RESTORE_SUPPORTED { logged } else { 0 };
        if logged > 0 && !E::RESTORE_SUPPORTED {
            info!(experiment = %name, rep, logged, "restore not supported, restarting repetition");
        }

        experiment.reset(params, rep)?;
        let mut writer = match status {
            Some(status) if resume_from > 0 => {
                info!(experiment = %name, rep, resume_from, "resuming repetition");
                experiment.restore_state(params, rep, resume_from)?;
                LogWriter::append(&path, &status)?
            }
            _ => LogWriter::create(&path)?,
        };

        for n in resume_from..iterations {
            let row = experiment.iterate(params, rep, n)?;
            if E::RESTORE_SUPPORTED {
                experiment.save_state(params, rep, n)?;
            }
            let row = self.sanitize_row(row)?;
            writer.write_row(&row)?;
        }

        experiment.finalize(params, rep)?;
        writer.finish()?;
        Ok(RepetitionOutcome::Completed { resumed_from: resume_from })
    }

    fn sanitize_row(&self, row: Row) -> Result<Row, XpsError> {
        let mut clean = Row::with_capacity(row.len());
        for (tag, value) in row {
            let renamed = sanitize_tag(&tag);
            if renamed != tag {
                let mut warned = self
                    .warned_tags
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if warned.insert(tag.clone()) {
                    warn!(tag = %tag, renamed = %renamed, "log tag contained illegal characters and was renamed");
                }
            }
            if clean.insert(renamed.clone(), value).is_some() {
                return Err(XpsError::Validation(
                    ErrorInfo::new("log-tag-collision", "two tags map to the same log column")
                        .with_context("tag", renamed),
                ));
            }
        }
        Ok(clean)
    }
}

/// Replaces characters that would break the log layout with `_`.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, ',' | '"') {
                '_'
            } else {
                c
            }
        })
        .collect()
}
