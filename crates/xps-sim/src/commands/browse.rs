use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use clap::Args;
use xps_exp::{describe, experiment_progress, get_exps, get_params, ExperimentInfo};

#[derive(Args, Debug)]
pub struct BrowseArgs {
    /// Configuration file whose directory is searched when `--root` is absent.
    #[arg(short, long, default_value = "experiments.cfg")]
    pub config: PathBuf,
    /// Directory to search for experiments.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Show every parameter instead of the essentials.
    #[arg(short = 'B', long)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Configuration file whose directory is searched when `--root` is absent.
    #[arg(short, long, default_value = "experiments.cfg")]
    pub config: PathBuf,
    /// Directory to search for experiments.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Explicit root, else the directory holding the configuration file.
pub fn search_root(root: Option<&Path>, config: &Path) -> PathBuf {
    if let Some(root) = root {
        return root.to_path_buf();
    }
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

const ESSENTIAL: [&str; 3] = ["name", "path", "experiment"];

pub fn browse(args: &BrowseArgs) -> Result<(), Box<dyn Error>> {
    let root = search_root(args.root.as_deref(), &args.config);
    for exp in get_exps(&root) {
        let info = describe(&exp)?;
        print!("{}", render_info(&info, args.verbose));
    }
    Ok(())
}

pub fn progress(args: &ProgressArgs) -> Result<(), Box<dyn Error>> {
    let root = search_root(args.root.as_deref(), &args.config);
    for exp in get_exps(&root) {
        let params = get_params(&exp)?;
        let percent = experiment_progress(&params)?;
        println!("{:>70} {} {percent}%", exp.display(), progress_bar(percent));
    }
    Ok(())
}

/// Twenty-five character bar, one mark per four percent.
pub fn progress_bar(percent: u32) -> String {
    let filled = (percent.min(100) / 4) as usize;
    format!("[{}{}]", "=".repeat(filled), " ".repeat(25 - filled))
}

fn timestamp(time: Option<SystemTime>) -> String {
    time.map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_info(info: &ExperimentInfo, verbose: bool) -> String {
    let mut out = String::new();
    let line = |out: &mut String, key: &str, value: &str| {
        out.push_str(&format!("{key:>16} {value}\n"));
    };
    line(&mut out, "experiment", &info.dir.display().to_string());
    line(&mut out, "started", &timestamp(info.started));
    if info.progress >= 100 {
        line(&mut out, "finished", &timestamp(info.finished));
    }
    let count = |key: &str| {
        info.params
            .get(key)
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
    };
    line(&mut out, "repetitions", &count("repetitions"));
    line(&mut out, "iterations", &count("iterations"));
    line(
        &mut out,
        "progress",
        &format!("{} {}%", progress_bar(info.progress), info.progress),
    );
    for (key, value) in info.params.iter() {
        if matches!(key, "repetitions" | "iterations") {
            continue;
        }
        if verbose || ESSENTIAL.contains(&key) {
            line(&mut out, key, &value.to_string());
        }
    }
    out.push('\n');
    out
}
