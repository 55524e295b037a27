//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! A TOML file supplies defaults; flags given on the command line win.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::source::DEFAULT_MAX_VALUE;
use cli::ExecutionMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Problem definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Vector size requested on the coordinator
    pub size: Option<u64>,
    /// Largest accepted vector size
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Seed for reproducible value streams (mixed with each worker's rank)
    pub seed: Option<u64>,
    /// Upper bound of drawn values, inclusive
    #[serde(default = "default_max_value")]
    pub max_value: u64,
}

fn default_max_size() -> u64 {
    8
}

fn default_max_value() -> u64 {
    DEFAULT_MAX_VALUE
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size: None,
            max_size: default_max_size(),
            seed: None,
            max_value: default_max_value(),
        }
    }
}

/// Group formation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Group size; see [`Config::group_size`] for the defaults
    pub workers: Option<usize>,
    /// Coordinator listen address
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Coordinator address a worker process connects to
    #[serde(default = "default_connect")]
    pub connect: String,
    /// Connection attempts before a worker process gives up
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

fn default_listen() -> String {
    "0.0.0.0:7878".to_string()
}

fn default_connect() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_connect_retries() -> u32 {
    50
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            workers: None,
            listen: default_listen(),
            connect: default_connect(),
            connect_retries: default_connect_retries(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Print every drawn value
    #[serde(default)]
    pub verbose: bool,
    /// Also write the report as JSON to this path
    pub json_output: Option<PathBuf>,
    /// Print the processing-time line
    #[serde(default = "default_timing")]
    pub timing: bool,
    /// Debug-level logging
    #[serde(default)]
    pub debug: bool,
}

fn default_timing() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            json_output: None,
            timing: default_timing(),
            debug: false,
        }
    }
}

impl Config {
    /// Number of workers in the group this process takes part in
    ///
    /// - local: the configured count, or one per CPU clamped to the requested
    ///   size so a default run never fails the size check
    /// - coordinator: the configured count including the coordinator, or 1
    /// - worker: 1; the real size arrives from the coordinator
    pub fn group_size(&self) -> usize {
        match self.group.mode {
            ExecutionMode::Local => self.group.workers.unwrap_or_else(|| {
                let cpus = num_cpus::get();
                match self.run.size {
                    Some(size) if size > 0 => cpus.min(usize::try_from(size).unwrap_or(usize::MAX)),
                    _ => cpus,
                }
                .max(1)
            }),
            ExecutionMode::Coordinator => self.group.workers.unwrap_or(1),
            ExecutionMode::Worker => 1,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Run: {}", self.run)?;
        writeln!(f, "  Group: {}", self.group)?;
        writeln!(f, "  Output: {}", self.output)?;
        Ok(())
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "size={}", size)?,
            None => write!(f, "size=<unset>")?,
        }
        write!(f, ", max_size={}, max_value={}", self.max_size, self.max_value)?;
        if let Some(seed) = self.seed {
            write!(f, ", seed={}", seed)?;
        }
        Ok(())
    }
}

impl fmt::Display for GroupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode={}", self.mode)?;
        if let Some(workers) = self.workers {
            write!(f, ", workers={}", workers)?;
        }
        match self.mode {
            ExecutionMode::Local => Ok(()),
            ExecutionMode::Coordinator => write!(f, ", listen={}", self.listen),
            ExecutionMode::Worker => write!(
                f,
                ", connect={} (retries={})",
                self.connect, self.connect_retries
            ),
        }
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.verbose {
            parts.push("verbose".to_string());
        }
        if !self.timing {
            parts.push("no timing".to_string());
        }
        if let Some(ref path) = self.json_output {
            parts.push(format!("json={}", path.display()));
        }
        if self.debug {
            parts.push("debug".to_string());
        }

        if parts.is_empty() {
            write!(f, "default")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}
