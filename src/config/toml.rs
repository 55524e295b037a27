//! TOML configuration file parsing
//!
//! ```toml
//! [run]
//! size = 8
//! max_size = 16
//! seed = 42
//!
//! [group]
//! mode = "coordinator"
//! workers = 4
//! listen = "0.0.0.0:7878"
//!
//! [output]
//! verbose = true
//! json_output = "report.json"
//! ```

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(size) = cli.size {
        config.run.size = Some(size);
    }
    if let Some(max_size) = cli.max_size {
        config.run.max_size = max_size;
    }
    if let Some(seed) = cli.seed {
        config.run.seed = Some(seed);
    }
    if let Some(max_value) = cli.max_value {
        config.run.max_value = max_value;
    }

    if let Some(mode) = cli.mode {
        config.group.mode = mode;
    }
    if let Some(workers) = cli.workers {
        config.group.workers = Some(workers);
    }
    if let Some(ref listen) = cli.listen {
        config.group.listen = listen.clone();
    }
    if let Some(ref connect) = cli.connect {
        config.group.connect = connect.clone();
    }
    if let Some(retries) = cli.connect_retries {
        config.group.connect_retries = retries;
    }

    // Switches can only turn behaviour on (or timing off) from the command line
    if cli.verbose {
        config.output.verbose = true;
    }
    if cli.no_timing {
        config.output.timing = false;
    }
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.debug {
        config.output.debug = true;
    }

    config
}

/// Build the effective configuration: the file named by `--config` (if any),
/// overridden by the command line
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    Ok(merge_cli_with_config(cli, base))
}
