//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Run labeled test cases against LLM prompt pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "promptcheck")]
#[command(version)]
#[command(about = "Run labeled test cases against LLM prompt pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Model identifier, overriding OPENAI_MODEL
    #[arg(short, long, global = true)]
    pub model: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a test batch against a pipeline
    Run(RunCommand),

    /// Validate a test batch file
    Validate(ValidateCommand),

    /// Print the JSON Schema of test batch files
    Schema,

    /// List built-in pipelines
    Pipelines,

    /// Show stored test runs
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
