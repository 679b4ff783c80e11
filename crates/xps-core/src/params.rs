//! Parameter values and insertion-ordered parameter sets.

use std::fmt::{self, Display};
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, XpsError};

/// Keys every concrete experiment must carry before it can be dispatched.
pub const REQUIRED_KEYS: [&str; 4] = ["name", "iterations", "repetitions", "path"];

/// A single configured value.
///
/// Scalars are numbers, booleans or strings. A [`ParamValue::List`] holds
/// scalars only and marks the parameter as a sweep axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean literal (`True` / `False`).
    Bool(bool),
    /// Signed integer literal.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// Plain or quoted string.
    Str(String),
    /// Ordered sequence of scalars.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Returns true when the value is a sequence and therefore a sweep axis.
    pub fn is_sweep(&self) -> bool {
        matches!(self, ParamValue::List(_))
    }

    /// Returns true for integer and float values.
    pub fn is_number(&self) -> bool {
        matches!(self, ParamValue::Int(_) | ParamValue::Float(_))
    }

    /// Integer view; floats with an integral value are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            ParamValue::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                Some(*value as i64)
            }
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(value) => Some(*value as f64),
            ParamValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// String view of [`ParamValue::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Boolean view of [`ParamValue::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Elements of a sweep axis.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

/// Formats a float so that it always reads back as a float (`1.0`, `0.5`, `1e-5`).
pub(crate) fn float_repr(value: f64) -> String {
    format!("{value:?}")
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{}", float_repr(*value)),
            ParamValue::Str(value) => write!(f, "{value}"),
            ParamValue::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    match value {
                        ParamValue::Str(text) => write!(f, "'{text}'")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Flat, insertion-ordered mapping of parameter name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    values: IndexMap<String, ParamValue>,
}

impl ParamSet {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value. Replacing keeps the original key position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`ParamSet::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes a key while preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Hierarchical experiment name, e.g. `exp1/alpha1`.
    pub fn name(&self) -> Option<String> {
        self.values.get("name").map(ToString::to_string)
    }

    /// Base directory the experiment tree lives under.
    pub fn path(&self) -> Option<PathBuf> {
        self.values
            .get("path")
            .map(|value| PathBuf::from(value.to_string()))
    }

    pub fn iterations(&self) -> Option<usize> {
        self.positive("iterations")
    }

    pub fn repetitions(&self) -> Option<usize> {
        self.positive("repetitions")
    }

    /// Value of the `experiment` key selecting the expansion mode.
    pub fn experiment_mode(&self) -> Option<String> {
        self.values.get("experiment").map(ToString::to_string)
    }

    /// Filesystem location of the experiment: `path/name`.
    pub fn dir(&self) -> Option<PathBuf> {
        Some(self.path()?.join(self.name()?))
    }

    /// Keys whose value is a sequence, in insertion order.
    pub fn sweep_axes(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(_, value)| value.is_sweep())
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Checks that the keys required for dispatch are present and well formed.
    pub fn validate(&self) -> Result<(), XpsError> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !self.values.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(XpsError::Validation(
                ErrorInfo::new(
                    "missing-required-keys",
                    "parameter set does not contain all required keys: name, iterations, repetitions, path",
                )
                .with_context("experiment", self.name().unwrap_or_default())
                .with_context("missing", missing.join(",")),
            ));
        }
        for key in ["iterations", "repetitions"] {
            if self.positive(key).is_none() {
                return Err(XpsError::Validation(
                    ErrorInfo::new("non-positive-count", format!("'{key}' must be a positive integer"))
                        .with_context("experiment", self.name().unwrap_or_default())
                        .with_context("value", self.values[key].to_string()),
                ));
            }
        }
        Ok(())
    }

    fn positive(&self, key: &str) -> Option<usize> {
        match self.values.get(key) {
            Some(ParamValue::Int(value)) if *value > 0 => Some(*value as usize),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for ParamSet
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ParamSet::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

impl IntoIterator for ParamSet {
    type Item = (String, ParamValue);
    type IntoIter = indexmap::map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
