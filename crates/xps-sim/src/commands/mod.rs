pub mod browse;
pub mod query;
pub mod run;
