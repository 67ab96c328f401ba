//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a test batch against a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Built-in pipeline name or path to a pipeline YAML file
    #[arg(short, long)]
    pub pipeline: String,

    /// Path to the test cases JSON file
    #[arg(short, long)]
    pub tests: PathBuf,

    /// Write the run report as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Comparator applied to cases that don't name one
    #[arg(short, long)]
    pub comparator: Option<String>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a test batch file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the test cases JSON file
    #[arg(short, long)]
    pub tests: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show stored test runs
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show one run in full
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
