use std::error::Error;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;
use xps_exp::{aggregate_across_repetitions, history as load_history, value as load_value};
use xps_exp::{TagSelector, Which};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Experiment directory.
    pub exp: PathBuf,
    /// Repetition index.
    #[arg(short, long, default_value_t = 0)]
    pub rep: usize,
    /// Tags to report; all tags when omitted.
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ValueArgs {
    #[command(flatten)]
    pub history: HistoryArgs,
    /// `last`, `min`, `max` or an integer index (negative counts from the end).
    #[arg(short, long, default_value = "last", allow_hyphen_values = true)]
    pub which: Which,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Median,
    Min,
    Max,
    Std,
}

impl Reducer {
    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Reducer::Mean => xps_exp::mean(values),
            Reducer::Median => xps_exp::median(values),
            Reducer::Min => xps_exp::min(values),
            Reducer::Max => xps_exp::max(values),
            Reducer::Std => xps_exp::std_dev(values),
        }
    }
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Experiment directory.
    pub exp: PathBuf,
    /// Tags to aggregate; all tags when omitted.
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Reduction applied to each iteration across repetitions.
    #[arg(short, long = "fn", value_enum, default_value_t = Reducer::Mean)]
    pub reducer: Reducer,
}

/// Maps repeated `--tag` flags onto a selector; none or `all` means every tag.
pub fn selector(tags: &[String]) -> TagSelector {
    match tags {
        [] => TagSelector::All,
        [one] => TagSelector::from(one.as_str()),
        many => TagSelector::Many(many.to_vec()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn history(args: &HistoryArgs) -> Result<(), Box<dyn Error>> {
    let history = load_history(&args.exp, args.rep, &selector(&args.tags))?;
    print_json(&history)
}

pub fn value(args: &ValueArgs) -> Result<(), Box<dyn Error>> {
    let query = &args.history;
    let value = load_value(&query.exp, query.rep, &selector(&query.tags), args.which)?;
    print_json(&value)
}

pub fn aggregate(args: &AggregateArgs) -> Result<(), Box<dyn Error>> {
    let reducer = args.reducer;
    let aggregation =
        aggregate_across_repetitions(&args.exp, &selector(&args.tags), |v| reducer.apply(v))?;
    print_json(&aggregation)
}
