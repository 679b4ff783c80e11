//! Built-in experiments used by the `simple` and `random` binaries.

use std::fs;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::{ParamSet, ParamValue};
use xps_exp::{Experiment, Row};

/// Echoes `alpha` and `beta` together with the loop counters.
#[derive(Debug, Default)]
pub struct Simple;

impl Experiment for Simple {
    fn iterate(&mut self, params: &ParamSet, rep: usize, n: usize) -> Result<Row, XpsError> {
        let mut row = Row::new();
        row.insert("rep".into(), ParamValue::from(rep));
        row.insert("iter".into(), ParamValue::from(n));
        for key in ["alpha", "beta"] {
            let value = params.get(key).cloned().ok_or_else(|| {
                XpsError::hook("missing-parameter", format!("parameter '{key}' is required"))
            })?;
            row.insert(key.into(), value);
        }
        Ok(row)
    }
}

/// Draws normal samples and tracks how fast the sample mean converges.
///
/// Resumable: the drawn numbers are saved after every iteration and the
/// generator is replayed up to the resume point.
#[derive(Debug)]
pub struct RandomWalk {
    numbers: Vec<f64>,
    rng: StdRng,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            numbers: Vec::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }
}

fn float_param(params: &ParamSet, key: &str) -> Result<f64, XpsError> {
    params.get(key).and_then(ParamValue::as_f64).ok_or_else(|| {
        XpsError::hook(
            "missing-parameter",
            format!("numeric parameter '{key}' is required"),
        )
    })
}

fn state_path(params: &ParamSet, rep: usize) -> Result<PathBuf, XpsError> {
    params
        .dir()
        .map(|dir| dir.join(format!("numbers_{rep}.json")))
        .ok_or_else(|| XpsError::hook("missing-parameter", "experiment has no directory"))
}

impl RandomWalk {
    fn seed(params: &ParamSet, rep: usize) -> u64 {
        let seed = params.get("seed").and_then(ParamValue::as_i64).unwrap_or(0);
        (seed as u64).wrapping_add(rep as u64)
    }

    /// Box-Muller transform; always consumes two uniforms.
    fn standard_normal(&mut self) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

impl Experiment for RandomWalk {
    const RESTORE_SUPPORTED: bool = true;

    fn reset(&mut self, params: &ParamSet, rep: usize) -> Result<(), XpsError> {
        self.numbers = Vec::with_capacity(params.iterations().unwrap_or(0));
        self.rng = StdRng::seed_from_u64(Self::seed(params, rep));
        Ok(())
    }

    fn iterate(&mut self, params: &ParamSet, _rep: usize, n: usize) -> Result<Row, XpsError> {
        let mean = float_param(params, "mean")?;
        let std = float_param(params, "std")?;
        let number = mean + std * self.standard_normal();
        self.numbers.push(number);
        let sample_mean = self.numbers.iter().sum::<f64>() / self.numbers.len() as f64;

        let mut row = Row::new();
        row.insert("n".into(), ParamValue::from(n));
        row.insert("number".into(), ParamValue::Float(number));
        row.insert("samplemean".into(), ParamValue::Float(sample_mean));
        row.insert("offset".into(), ParamValue::Float((mean - sample_mean).abs()));
        Ok(row)
    }

    fn save_state(&mut self, params: &ParamSet, rep: usize, _n: usize) -> Result<(), XpsError> {
        let path = state_path(params, rep)?;
        let bytes = serde_json::to_vec(&self.numbers)
            .map_err(|err| XpsError::Serde(ErrorInfo::new("state-encode", err.to_string())))?;
        fs::write(&path, bytes).map_err(|err| XpsError::io("state-write", &path, err))
    }

    fn restore_state(&mut self, params: &ParamSet, rep: usize, n: usize) -> Result<(), XpsError> {
        let path = state_path(params, rep)?;
        let bytes = fs::read(&path).map_err(|err| XpsError::io("state-read", &path, err))?;
        let mut numbers: Vec<f64> = serde_json::from_slice(&bytes)
            .map_err(|err| XpsError::Serde(ErrorInfo::new("state-decode", err.to_string())))?;
        if numbers.len() < n {
            return Err(XpsError::hook(
                "state-behind-log",
                format!("saved state holds {} numbers but {n} rows are logged", numbers.len()),
            ));
        }
        numbers.truncate(n);
        for _ in 0..n {
            self.standard_normal();
        }
        self.numbers = numbers;
        Ok(())
    }
}
