//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One thread per worker in this process (default)
    #[default]
    Local,
    /// Rank 0 of a multi-process group: accept workers, validate, report
    Coordinator,
    /// Join a coordinator and compute one partition
    Worker,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::Coordinator => write!(f, "coordinator"),
            ExecutionMode::Worker => write!(f, "worker"),
        }
    }
}

/// geomean - geometric mean of a random vector, computed by a group of workers
///
/// Options left unset fall back to the configuration file (if any) and then to
/// the documented defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "geomean")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Vector size (1 to --max-size); not used in worker mode
    #[arg(value_name = "SIZE")]
    pub size: Option<u64>,

    /// Number of workers [default: CPU count (local), 1 (coordinator)]
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Execution mode [default: local]
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,

    /// Address the coordinator listens on [default: 0.0.0.0:7878]
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Coordinator address for worker mode [default: 127.0.0.1:7878]
    #[arg(long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Connection attempts in worker mode [default: 50]
    #[arg(long)]
    pub connect_retries: Option<u32>,

    /// Largest accepted vector size [default: 8]
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Seed for reproducible values (each worker mixes in its rank)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Upper bound of drawn values [default: 2147483647]
    #[arg(long)]
    pub max_value: Option<u64>,

    /// Print every drawn value as `vector[i] = value`
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Also write the report as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Do not print the processing time
    #[arg(long)]
    pub no_timing: bool,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate flag combinations clap cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.max_size == Some(0) {
            anyhow::bail!("max_size must be at least 1");
        }

        if self.mode == Some(ExecutionMode::Worker) && self.workers.is_some() {
            anyhow::bail!("--workers is decided by the coordinator, not by a worker");
        }

        Ok(())
    }
}
