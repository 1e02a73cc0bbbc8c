//! Command-Line Interface

use crate::PipelineError;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

/// hvc: classify birdsong syllables and other animal vocalizations.
#[derive(Parser, Debug)]
#[command(name = "hvc", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Extract features from annotated audio into a feature file.
    Extract { config: PathBuf },
    /// Train and compare models on a feature file.
    Select { config: PathBuf },
    /// Label new audio with a saved model.
    Predict { config: PathBuf },
    /// Run every section present in the config, in order.
    Run { config: PathBuf },
}

impl Command {
    pub fn config_path(&self) -> &Path {
        match self {
            Command::Extract { config }
            | Command::Select { config }
            | Command::Predict { config }
            | Command::Run { config } => config,
        }
    }
}

impl Cli {
    pub fn level(&self) -> Result<Level, PipelineError> {
        self.log_level
            .parse()
            .map_err(|_| PipelineError::Config(format!("unknown log level '{}'", self.log_level)))
    }
}
