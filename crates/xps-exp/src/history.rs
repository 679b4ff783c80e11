//! Read-only queries over repetition logs.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::{parse_number, ParamSet, ParamValue};

use crate::discover::{get_exps, get_params};
use crate::expand::{axis_token, contains_token};
use crate::log::{inspect_log, log_path, read_log};

/// Which tags a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSelector {
    /// Every tag in the log header.
    All,
    /// A single tag; results are bare values.
    One(String),
    /// Several tags; results are keyed by tag.
    Many(Vec<String>),
}

impl TagSelector {
    /// Collapses a one-element `Many` into `One`.
    pub fn normalized(&self) -> TagSelector {
        match self {
            TagSelector::Many(tags) if tags.len() == 1 => TagSelector::One(tags[0].clone()),
            other => other.clone(),
        }
    }

    fn wants(&self, tag: &str) -> bool {
        match self {
            TagSelector::All => true,
            TagSelector::One(one) => one == tag,
            TagSelector::Many(tags) => tags.iter().any(|t| t == tag),
        }
    }
}

impl From<&str> for TagSelector {
    fn from(tag: &str) -> Self {
        if tag == "all" {
            TagSelector::All
        } else {
            TagSelector::One(tag.to_string())
        }
    }
}

impl From<Vec<String>> for TagSelector {
    fn from(tags: Vec<String>) -> Self {
        TagSelector::Many(tags).normalized()
    }
}

/// A bare result for a single tag, or results keyed by tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selection<T> {
    Single(T),
    Multi(IndexMap<String, T>),
}

impl<T> Selection<T> {
    pub fn single(self) -> Option<T> {
        match self {
            Selection::Single(value) => Some(value),
            Selection::Multi(_) => None,
        }
    }

    pub fn multi(self) -> Option<IndexMap<String, T>> {
        match self {
            Selection::Single(_) => None,
            Selection::Multi(map) => Some(map),
        }
    }
}

/// Logged values of one or more tags in iteration order.
pub type History = Selection<Vec<ParamValue>>;

/// How a history is reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Which {
    #[default]
    Last,
    Min,
    Max,
    /// Position in the history; negative values count from the end.
    Index(i64),
}

impl FromStr for Which {
    type Err = XpsError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim() {
            "last" => Ok(Which::Last),
            "min" => Ok(Which::Min),
            "max" => Ok(Which::Max),
            other => other.parse::<i64>().map(Which::Index).map_err(|_| {
                XpsError::Validation(
                    ErrorInfo::new("unrecognized-which", format!("cannot reduce a history by '{other}'"))
                        .with_hint("use 'last', 'min', 'max' or an integer index"),
                )
            }),
        }
    }
}

impl Which {
    /// Reduces `values`; `None` when empty or the index is out of range.
    pub fn reduce(&self, values: &[ParamValue]) -> Option<ParamValue> {
        match self {
            Which::Last => values.last().cloned(),
            Which::Min => values.iter().min_by(|a, b| compare_values(a, b)).cloned(),
            Which::Max => values.iter().max_by(|a, b| compare_values(a, b)).cloned(),
            Which::Index(idx) => {
                let len = values.len() as i64;
                let pos = if *idx < 0 { len + idx } else { *idx };
                if (0..len).contains(&pos) {
                    values.get(pos as usize).cloned()
                } else {
                    None
                }
            }
        }
    }
}

/// Interprets one logged field: numbers become numbers, all else stays text.
pub fn parse_log_value(field: &str) -> ParamValue {
    parse_number(field).unwrap_or_else(|| ParamValue::Str(field.to_string()))
}

/// Orders numbers numerically and before strings; strings lexicographically.
pub fn compare_values(a: &ParamValue, b: &ParamValue) -> Ordering {
    fn rank(value: &ParamValue) -> u8 {
        match value {
            ParamValue::Int(_) | ParamValue::Float(_) => 0,
            ParamValue::Bool(_) => 1,
            ParamValue::Str(_) => 2,
            ParamValue::List(_) => 3,
        }
    }
    match (a, b) {
        (ParamValue::Int(x), ParamValue::Int(y)) => x.cmp(y),
        _ if a.is_number() && b.is_number() => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (ParamValue::Bool(x), ParamValue::Bool(y)) => x.cmp(y),
        (ParamValue::Str(x), ParamValue::Str(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

/// Header tags of the log of repetition `rep`; empty when there is no log.
pub fn history_tags(exp: &Path, rep: usize) -> Result<Vec<String>, XpsError> {
    Ok(inspect_log(&log_path(exp, rep))?
        .and_then(|status| status.header)
        .unwrap_or_default())
}

/// Reconstructs the logged values of `tags` for repetition `rep` of `exp`.
///
/// A missing or empty log, or an experiment that does not exist at all,
/// yields an empty sequence (single tag) or an empty mapping.
pub fn history(exp: &Path, rep: usize, tags: &TagSelector) -> Result<History, XpsError> {
    let tags = tags.normalized();
    let table = read_log(&log_path(exp, rep))?.unwrap_or_default();
    let mut columns: IndexMap<String, Vec<ParamValue>> = IndexMap::new();
    for (idx, tag) in table.tags.iter().enumerate() {
        if !tags.wants(tag) {
            continue;
        }
        let values = table
            .rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(|field| parse_log_value(field))
            .collect();
        columns.insert(tag.clone(), values);
    }
    Ok(match tags {
        TagSelector::One(tag) => Selection::Single(columns.shift_remove(&tag).unwrap_or_default()),
        _ => Selection::Multi(columns),
    })
}

/// Like [`history`] but reduces each tag's sequence to a single value.
///
/// Tags whose history is empty (or too short for an index) are left out of
/// a mapping; `None` when nothing could be reduced.
pub fn value(
    exp: &Path,
    rep: usize,
    tags: &TagSelector,
    which: Which,
) -> Result<Option<Selection<ParamValue>>, XpsError> {
    Ok(match history(exp, rep, tags)? {
        Selection::Single(values) => which.reduce(&values).map(Selection::Single),
        Selection::Multi(columns) => {
            let reduced: IndexMap<String, ParamValue> = columns
                .into_iter()
                .filter_map(|(tag, values)| which.reduce(&values).map(|v| (tag, v)))
                .collect();
            (!reduced.is_empty()).then_some(Selection::Multi(reduced))
        }
    })
}

/// A sub-experiment selected by fixed parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedParamMatch<T> {
    pub exp: PathBuf,
    pub params: ParamSet,
    pub result: T,
}

/// Sub-experiments of `exp` whose names encode every `fixed` value.
fn matching_subexps(exp: &Path, fixed: &ParamSet) -> Result<Vec<(PathBuf, ParamSet)>, XpsError> {
    let tokens: Vec<String> = fixed
        .iter()
        .map(|(key, value)| axis_token(key, value))
        .collect();
    let mut matches = Vec::new();
    for sub in get_exps(exp) {
        if sub == exp {
            continue;
        }
        let relative = sub
            .strip_prefix(exp)
            .unwrap_or(sub.as_path())
            .to_string_lossy()
            .replace('\\', "/");
        if tokens.iter().all(|token| contains_token(&relative, token)) {
            let params = get_params(&sub)?;
            matches.push((sub, params));
        }
    }
    Ok(matches)
}

/// Reduced values of `tag` for every sub-experiment matching `fixed`.
pub fn values_across_fixed_params(
    exp: &Path,
    rep: usize,
    tag: &str,
    which: Which,
    fixed: &ParamSet,
) -> Result<Vec<FixedParamMatch<Option<ParamValue>>>, XpsError> {
    let selector = TagSelector::One(tag.to_string());
    matching_subexps(exp, fixed)?
        .into_iter()
        .map(|(sub, params)| {
            let result = value(&sub, rep, &selector, which)?.and_then(Selection::single);
            Ok(FixedParamMatch {
                exp: sub,
                params,
                result,
            })
        })
        .collect()
}

/// Full histories of `tag` for every sub-experiment matching `fixed`.
pub fn histories_across_fixed_params(
    exp: &Path,
    rep: usize,
    tag: &str,
    fixed: &ParamSet,
) -> Result<Vec<FixedParamMatch<Vec<ParamValue>>>, XpsError> {
    let selector = TagSelector::One(tag.to_string());
    matching_subexps(exp, fixed)?
        .into_iter()
        .map(|(sub, params)| {
            let result = history(&sub, rep, &selector)?.single().unwrap_or_default();
            Ok(FixedParamMatch {
                exp: sub,
                params,
                result,
            })
        })
        .collect()
}
