use std::collections::BTreeSet;
use std::fs;

use tracing::info;
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::{write_experiment_config, ParamSet, ParamValue};

/// How the sweep axes of one parameter set are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// Cartesian product of all axes (the default).
    Grid,
    /// Axes zipped pointwise; all axes must have the same length.
    List,
    /// No expansion; sequences are kept literally.
    Single,
}

impl ExpansionMode {
    /// Reads the `experiment` key of a parameter set.
    pub fn of(params: &ParamSet) -> Result<Self, XpsError> {
        match params.experiment_mode().as_deref() {
            None | Some("grid") => Ok(ExpansionMode::Grid),
            Some("list") => Ok(ExpansionMode::List),
            Some("single") => Ok(ExpansionMode::Single),
            Some(other) => Err(XpsError::Config(
                ErrorInfo::new(
                    "unexpected-experiment-mode",
                    format!("unexpected value '{other}' for parameter 'experiment'"),
                )
                .with_context("experiment", params.name().unwrap_or_default())
                .with_hint("use 'grid', 'list' or 'single'"),
            )),
        }
    }
}

/// Result of expanding a batch of parameter sets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expansion {
    /// Unexpanded sets that had sweep axes; persisted so browsers can find them.
    pub parents: Vec<ParamSet>,
    /// Concrete, scalar-only (unless `single`) sets in input order.
    pub experiments: Vec<ParamSet>,
}

/// Expands parameter sets without touching the filesystem.
pub fn expand_params(sets: &[ParamSet]) -> Result<Expansion, XpsError> {
    let mut expansion = Expansion::default();
    for params in sets {
        let axes = params.sweep_axes();
        if axes.is_empty() {
            expansion.experiments.push(params.clone());
            continue;
        }
        let mode = ExpansionMode::of(params)?;
        if mode == ExpansionMode::Single {
            expansion.experiments.push(params.clone());
            continue;
        }
        let base = params.name().ok_or_else(|| {
            XpsError::Validation(ErrorInfo::new(
                "missing-required-keys",
                "cannot expand a parameter set without 'name'",
            ))
        })?;
        let axis_values: Vec<(&str, &[ParamValue])> = axes
            .iter()
            .map(|axis| {
                let values = params.get(axis).and_then(ParamValue::as_list).unwrap_or(&[]);
                (*axis, values)
            })
            .collect();
        for (axis, values) in &axis_values {
            if values.is_empty() {
                return Err(XpsError::Config(
                    ErrorInfo::new("empty-sweep-axis", format!("sweep axis '{axis}' has no values"))
                        .with_context("experiment", base.clone()),
                ));
            }
        }
        let combos = match mode {
            ExpansionMode::List => zip_axes(&base, &axis_values)?,
            _ => product_axes(&axis_values),
        };
        expansion.parents.push(params.clone());
        for combo in combos {
            let mut child = params.clone();
            let mut tokens = Vec::with_capacity(combo.len());
            for ((axis, _), value) in axis_values.iter().zip(combo) {
                tokens.push(axis_token(axis, value));
                child.insert(*axis, value.clone());
            }
            let name = format!("{base}/{}", tokens.join("_"));
            info!(experiment = %name, "expanded sub-experiment");
            child.insert("name", name);
            expansion.experiments.push(child);
        }
    }
    ensure_unique_names(&expansion.experiments)?;
    Ok(expansion)
}

/// Expands parameter sets and persists every parent record at `path/name`.
pub fn expand(sets: &[ParamSet]) -> Result<Vec<ParamSet>, XpsError> {
    let expansion = expand_params(sets)?;
    for parent in &expansion.parents {
        persist_parent(parent)?;
    }
    Ok(expansion.experiments)
}

/// Writes the unexpanded configuration of a swept experiment into its own directory.
pub fn persist_parent(parent: &ParamSet) -> Result<(), XpsError> {
    let dir = parent.dir().ok_or_else(|| {
        XpsError::Validation(
            ErrorInfo::new("missing-required-keys", "parent experiment needs 'name' and 'path'")
                .with_context("experiment", parent.name().unwrap_or_default()),
        )
    })?;
    fs::create_dir_all(&dir).map_err(|err| XpsError::io("parent-dir", &dir, err))?;
    write_experiment_config(parent, &dir)
}

fn product_axes<'a>(axes: &[(&str, &'a [ParamValue])]) -> Vec<Vec<&'a ParamValue>> {
    let mut combos: Vec<Vec<&ParamValue>> = vec![Vec::new()];
    for (_, values) in axes {
        let values: &'a [ParamValue] = *values;
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.push(value);
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

fn zip_axes<'a>(
    base: &str,
    axes: &[(&str, &'a [ParamValue])],
) -> Result<Vec<Vec<&'a ParamValue>>, XpsError> {
    let len = axes[0].1.len();
    if axes.iter().any(|(_, values)| values.len() != len) {
        let lengths = axes
            .iter()
            .map(|(axis, values)| format!("{axis}={}", values.len()))
            .collect::<Vec<_>>()
            .join(",");
        return Err(XpsError::Config(
            ErrorInfo::new(
                "list-length-mismatch",
                "sweep axes must have equal lengths in 'list' mode",
            )
            .with_context("experiment", base)
            .with_context("lengths", lengths),
        ));
    }
    Ok((0..len)
        .map(|idx| {
            axes.iter()
                .map(|(_, values)| {
                    let values: &'a [ParamValue] = *values;
                    &values[idx]
                })
                .collect()
        })
        .collect())
}

fn ensure_unique_names(experiments: &[ParamSet]) -> Result<(), XpsError> {
    let mut seen = BTreeSet::new();
    for params in experiments {
        if let Some(name) = params.name() {
            if !seen.insert(name.clone()) {
                return Err(XpsError::Config(
                    ErrorInfo::new("duplicate-experiment-name", "two experiments share one name")
                        .with_context("experiment", name)
                        .with_hint("remove repeated sweep values or rename the clashing section"),
                ));
            }
        }
    }
    Ok(())
}

/// Renders a scalar as a filesystem-safe token.
///
/// Numbers use their canonical form (`3`, `0.5`, `1.0`, `1e-5`). Strings keep
/// ASCII alphanumerics and `-.+`; every other byte is written as `%XX`, so
/// distinct strings never share a token and no token contains `_` or `/`.
pub fn dirname(value: &ParamValue) -> String {
    match value {
        ParamValue::Str(text) => encode(text),
        other => encode(&other.to_string()),
    }
}

/// Token identifying one axis value inside a sub-experiment name.
pub fn axis_token(axis: &str, value: &ParamValue) -> String {
    format!("{}{}", sanitize_axis(axis), dirname(value))
}

fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'+') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn sanitize_axis(axis: &str) -> String {
    axis.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '+'))
        .collect()
}

/// True when `token` occurs in `name` delimited by `_`, `/` or the ends.
pub(crate) fn contains_token(name: &str, token: &str) -> bool {
    if token.is_empty() {
        return true;
    }
    let is_boundary = |c: Option<char>| matches!(c, None | Some('_') | Some('/'));
    name.match_indices(token).any(|(start, _)| {
        let before = name[..start].chars().next_back();
        let after = name[start + token.len()..].chars().next();
        is_boundary(before) && is_boundary(after)
    })
}
