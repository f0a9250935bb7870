// Command-line arguments for the ETL binary.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Execution mode of the ETL run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Build the transformed collection from the raw collection.
    Transforming,
    /// Report the data available for model training.
    Training,
    /// Placeholder for inference.
    Predicting,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Transforming => "transforming",
            Mode::Training => "training",
            Mode::Predicting => "predicting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Parser)]
#[command(name = "goalcast-etl", version, about = "Soccer match feature ETL")]
pub struct Cli {
    /// Execution mode.
    #[arg(long, value_enum)]
    pub mode: Mode,

    /// Directory holding `config/` and `defaults/`.
    #[arg(long, default_value = ".")]
    pub config_dir: PathBuf,
}

/// Arguments shared by the collector binary.
#[derive(Debug, Parser)]
#[command(name = "collector", version, about = "Download raw soccer match data")]
pub struct CollectorCli {
    /// Directory holding `config/` and `defaults/`.
    #[arg(long, default_value = ".")]
    pub config_dir: PathBuf,
}
