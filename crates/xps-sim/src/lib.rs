//! Command line front-end shared by the xps demonstration suites.

pub mod commands;
pub mod demos;
pub mod logging;

use std::error::Error;

use clap::{Parser, Subcommand};
use commands::browse::{self, BrowseArgs, ProgressArgs};
use commands::query::{self, AggregateArgs, HistoryArgs, ValueArgs};
use commands::run::{self, RunArgs};
use xps_exp::Experiment;

#[derive(Parser, Debug)]
#[command(about = "Parameter sweep experiment runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Expand the configuration and run every pending repetition.
    Run(RunArgs),
    /// List experiments below a directory without running anything.
    Browse(BrowseArgs),
    /// Show a progress bar per experiment.
    Progress(ProgressArgs),
    /// Print the logged history of one repetition as JSON.
    History(HistoryArgs),
    /// Print a reduced value of one repetition as JSON.
    Value(ValueArgs),
    /// Print per-iteration aggregates across repetitions as JSON.
    Aggregate(AggregateArgs),
}

/// Parses the process arguments and executes the requested command, using
/// `factory` to build an experiment for every repetition.
pub fn main_with<E, F>(factory: F) -> Result<(), Box<dyn Error>>
where
    E: Experiment,
    F: Fn() -> E + Sync,
{
    logging::init();
    let cli = Cli::parse();
    execute(cli.command, factory)
}

pub fn execute<E, F>(command: Command, factory: F) -> Result<(), Box<dyn Error>>
where
    E: Experiment,
    F: Fn() -> E + Sync,
{
    match command {
        Command::Run(args) => run::run(&args, factory),
        Command::Browse(args) => browse::browse(&args),
        Command::Progress(args) => browse::progress(&args),
        Command::History(args) => query::history(&args),
        Command::Value(args) => query::value(&args),
        Command::Aggregate(args) => query::aggregate(&args),
    }
}
