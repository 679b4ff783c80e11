#![doc = "Shared data model for the xps experiment suite: errors, parameter sets, literal parsing and configuration files."]

pub mod config;
pub mod errors;
pub mod literal;
pub mod params;

pub use config::{
    read_experiment_config, render_experiment_config, write_experiment_config, ConfigFile,
    DEFAULT_SECTION, EXPERIMENT_CFG,
};
pub use errors::{ErrorInfo, XpsError};
pub use literal::{parse_literal, parse_number, render_literal};
pub use params::{ParamSet, ParamValue, REQUIRED_KEYS};
