//! Per-iteration reduction of histories across repetitions.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::ParamValue;

use crate::discover::get_params;
use crate::history::{history, history_tags, Selection, TagSelector};

/// Something the aggregator had to adjust while stacking histories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationNote {
    /// Repetition `rep` had no values for `tag` and was left out.
    Dropped { tag: String, rep: usize },
    /// Repetition `rep` had only `len` values, shortening the result.
    Truncated { tag: String, rep: usize, len: usize },
    /// Repetition `rep` had `len` values, more than the configured iterations;
    /// the surplus was ignored.
    Cropped { tag: String, rep: usize, len: usize },
}

/// Aggregated sequences plus the adjustments made to produce them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub values: Selection<Vec<f64>>,
    pub notes: Vec<AggregationNote>,
}

/// Reduces every iteration column of `tags` across the repetitions of `exp`.
///
/// Empty repetitions are dropped; shorter ones cut the result to the shortest
/// length seen. Selecting all tags always produces a mapping.
pub fn aggregate_across_repetitions<F>(
    exp: &Path,
    tags: &TagSelector,
    aggregate: F,
) -> Result<Aggregation, XpsError>
where
    F: Fn(&[f64]) -> f64,
{
    let params = get_params(exp)?;
    let repetitions = params.repetitions().unwrap_or(0);
    let iterations = params.iterations().unwrap_or(0);
    let mut notes = Vec::new();

    let tags = tags.normalized();
    let wanted: Vec<String> = match &tags {
        TagSelector::One(tag) => vec![tag.clone()],
        TagSelector::Many(many) => many.clone(),
        TagSelector::All => {
            let mut all: Vec<String> = Vec::new();
            for rep in 0..repetitions {
                for tag in history_tags(exp, rep)? {
                    if !all.contains(&tag) {
                        all.push(tag);
                    }
                }
            }
            all
        }
    };

    let mut out = IndexMap::new();
    for tag in &wanted {
        let selector = TagSelector::One(tag.clone());
        let mut stack: Vec<Vec<f64>> = Vec::with_capacity(repetitions);
        let mut width = iterations;
        for rep in 0..repetitions {
            let values = history(exp, rep, &selector)?.single().unwrap_or_default();
            if values.is_empty() {
                notes.push(AggregationNote::Dropped {
                    tag: tag.clone(),
                    rep,
                });
                continue;
            }
            if values.len() > iterations {
                warn!(
                    %tag,
                    rep,
                    len = values.len(),
                    iterations,
                    "history longer than configured iterations; cropping"
                );
                notes.push(AggregationNote::Cropped {
                    tag: tag.clone(),
                    rep,
                    len: values.len(),
                });
            }
            if values.len() < width {
                warn!(%tag, rep, len = values.len(), "history shorter than expected; truncating");
                notes.push(AggregationNote::Truncated {
                    tag: tag.clone(),
                    rep,
                    len: values.len(),
                });
                width = values.len();
            }
            stack.push(numeric(tag, rep, &values)?);
        }
        let dropped = repetitions - stack.len();
        if dropped > 0 {
            warn!(%tag, dropped, "repetitions without values were skipped");
        }
        let column: Vec<f64> = if stack.is_empty() {
            warn!(%tag, "no repetition has values; aggregate is empty");
            Vec::new()
        } else {
            (0..width)
                .map(|idx| {
                    let cells: Vec<f64> = stack.iter().map(|row| row[idx]).collect();
                    aggregate(&cells)
                })
                .collect()
        };
        out.insert(tag.clone(), column);
    }

    let values = match tags {
        TagSelector::One(tag) => Selection::Single(out.shift_remove(&tag).unwrap_or_default()),
        _ => Selection::Multi(out),
    };
    Ok(Aggregation { values, notes })
}

fn numeric(tag: &str, rep: usize, values: &[ParamValue]) -> Result<Vec<f64>, XpsError> {
    values
        .iter()
        .map(|value| {
            value.as_f64().ok_or_else(|| {
                XpsError::Validation(
                    ErrorInfo::new("non-numeric-history", "cannot aggregate non-numeric values")
                        .with_context("tag", tag)
                        .with_context("rep", rep.to_string())
                        .with_context("value", value.to_string()),
                )
            })
        })
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NAN, f64::min)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NAN, f64::max)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
