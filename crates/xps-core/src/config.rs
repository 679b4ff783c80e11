//! Sectioned configuration files.
//!
//! The format is the classic INI layout: `[section]` headers followed by
//! `key = value` (or `key: value`) lines, `#`/`;` comment lines and an
//! optional `[DEFAULT]` section inherited by every other section. Values go
//! through [`parse_literal`].

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::errors::{ErrorInfo, XpsError};
use crate::literal::{parse_literal, render_literal};
use crate::params::ParamSet;

/// Section providing values inherited by every other section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// File name of the per-experiment configuration record.
pub const EXPERIMENT_CFG: &str = "experiment.cfg";

/// A parsed configuration file: defaults plus named sections in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    defaults: ParamSet,
    sections: IndexMap<String, ParamSet>,
}

fn config_error(code: &str, message: impl Into<String>, line: usize) -> XpsError {
    XpsError::Config(ErrorInfo::new(code, message).with_context("line", line.to_string()))
}

impl ConfigFile {
    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, XpsError> {
        let mut config = ConfigFile::default();
        let mut current: Option<String> = None;
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let header = header.trim();
                if header.is_empty() {
                    return Err(config_error("config-empty-section", "empty section name", line_no));
                }
                if header != DEFAULT_SECTION {
                    if config.sections.contains_key(header) {
                        return Err(config_error(
                            "config-duplicate-section",
                            format!("section '{header}' defined twice"),
                            line_no,
                        ));
                    }
                    config.sections.insert(header.to_string(), ParamSet::new());
                }
                current = Some(header.to_string());
                continue;
            }
            let Some(split) = line.find(['=', ':']) else {
                return Err(config_error(
                    "config-malformed-line",
                    format!("expected 'key = value', found '{line}'"),
                    line_no,
                ));
            };
            let key = line[..split].trim();
            let value = &line[split + 1..];
            if key.is_empty() {
                return Err(config_error("config-empty-key", "empty key", line_no));
            }
            let Some(section) = current.as_deref() else {
                return Err(config_error(
                    "config-missing-section",
                    format!("key '{key}' appears before any section header"),
                    line_no,
                ));
            };
            let target = if section == DEFAULT_SECTION {
                &mut config.defaults
            } else {
                config
                    .sections
                    .get_mut(section)
                    .ok_or_else(|| config_error("config-missing-section", "unknown section", line_no))?
            };
            if target.contains_key(key) {
                return Err(config_error(
                    "config-duplicate-key",
                    format!("key '{key}' defined twice in section '{section}'"),
                    line_no,
                ));
            }
            target.insert(key, parse_literal(value));
        }
        Ok(config)
    }

    /// Reads and parses a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, XpsError> {
        let text = fs::read_to_string(path).map_err(|err| {
            XpsError::Config(
                ErrorInfo::new("config-read", format!("config file {} not found", path.display()))
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        Self::parse(&text).map_err(|err| match err {
            XpsError::Config(info) => {
                XpsError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    pub fn defaults(&self) -> &ParamSet {
        &self.defaults
    }

    /// Section names in file order, excluding `DEFAULT`.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Parameters of one section merged over the defaults, with `name` set
    /// to the section title.
    pub fn section(&self, name: &str) -> Option<ParamSet> {
        let own = self.sections.get(name)?;
        let mut merged = self.defaults.clone();
        for (key, value) in own.iter() {
            merged.insert(key, value.clone());
        }
        merged.insert("name", name);
        Some(merged)
    }

    /// All sections as parameter sets, in file order.
    pub fn experiments(&self) -> Vec<ParamSet> {
        self.section_names()
            .filter_map(|name| self.section(name))
            .collect()
    }
}

/// Renders a single-section record for one experiment.
pub fn render_experiment_config(params: &ParamSet) -> Result<String, XpsError> {
    let name = params.name().ok_or_else(|| {
        XpsError::Validation(ErrorInfo::new(
            "config-missing-name",
            "cannot write a configuration record without 'name'",
        ))
    })?;
    let mut out = format!("[{name}]\n");
    for (key, value) in params.iter().filter(|(key, _)| *key != "name") {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{key} = {}", render_literal(value));
    }
    out.push('\n');
    Ok(out)
}

/// Writes `experiment.cfg` for one experiment into `dir`.
pub fn write_experiment_config(params: &ParamSet, dir: &Path) -> Result<(), XpsError> {
    let text = render_experiment_config(params)?;
    let path = dir.join(EXPERIMENT_CFG);
    fs::write(&path, text).map_err(|err| XpsError::io("config-write", &path, err))
}

/// Reads the parameters persisted in `dir/experiment.cfg`.
///
/// Unlike history lookups this fails when the record is absent, since the
/// caller expects an existing experiment.
pub fn read_experiment_config(dir: &Path) -> Result<ParamSet, XpsError> {
    let path = dir.join(EXPERIMENT_CFG);
    if !path.is_file() {
        return Err(XpsError::NotFound(
            ErrorInfo::new("experiment-not-found", format!("experiment {} not found", dir.display()))
                .with_context("path", path.display().to_string()),
        ));
    }
    let config = ConfigFile::load(&path)?;
    let name = config.section_names().next().map(str::to_string);
    name.and_then(|name| config.section(&name)).ok_or_else(|| {
        XpsError::Config(
            ErrorInfo::new("config-no-section", "experiment record has no section")
                .with_context("path", path.display().to_string()),
        )
    })
}

