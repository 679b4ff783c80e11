//! Experiment execution for xps: sweep expansion, resumable repetitions,
//! parallel dispatch and log queries.

mod aggregate;
mod discover;
mod dispatch;
mod expand;
mod history;
mod log;
mod runner;

pub use aggregate::{
    aggregate_across_repetitions, max, mean, median, min, std_dev, Aggregation, AggregationNote,
};
pub use discover::{
    describe, experiment_progress, find_exp, get_exps, get_params, progress, ExperimentInfo,
};
pub use dispatch::{run, start, RunOpts, RunSummary};
pub use expand::{
    axis_token, dirname, expand, expand_params, persist_parent, Expansion, ExpansionMode,
};
pub use history::{
    compare_values, histories_across_fixed_params, history, history_tags, parse_log_value, value,
    values_across_fixed_params, FixedParamMatch, History, Selection, TagSelector, Which,
};
pub use log::{inspect_log, log_path, read_log, LogStatus, LogTable, LogWriter, Row};
pub use runner::{sanitize_tag, Experiment, RepetitionOutcome, Runner};

/// Alias of [`get_params`] matching the record-reading vocabulary of the CLI.
pub use discover::get_params as read_params;
