//! Configuration validation
//!
//! Two kinds of checks live here. [`validate_config`] rejects configurations
//! that can never run (bad addresses, zero bounds) before any group is
//! formed. [`validate_size`] is the coordinator's check of the requested
//! vector size against the formed group; its failures become an abort
//! broadcast rather than a local exit.

use super::*;
use anyhow::{Context, Result};
use std::net::SocketAddr;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_run(&config.run)?;
    validate_group(&config.group)?;
    Ok(())
}

/// Validate the problem definition
pub fn validate_run(run: &RunConfig) -> Result<()> {
    if run.max_size == 0 {
        anyhow::bail!("run.max_size must be at least 1");
    }

    if run.max_value == 0 {
        tracing::warn!("run.max_value is 0: every drawn value and the mean will be 0");
    }

    Ok(())
}

/// Validate group formation settings
pub fn validate_group(group: &GroupConfig) -> Result<()> {
    if group.workers == Some(0) {
        anyhow::bail!("group.workers must be at least 1");
    }

    match group.mode {
        ExecutionMode::Local => {}
        ExecutionMode::Coordinator => {
            group
                .listen
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid listen address: {}", group.listen))?;
        }
        ExecutionMode::Worker => {
            if group.connect.is_empty() {
                anyhow::bail!("group.connect must name the coordinator");
            }
            if group.connect_retries == 0 {
                anyhow::bail!("group.connect_retries must be at least 1");
            }
        }
    }

    Ok(())
}

/// Check a requested vector size against the group it will be split across
///
/// Returns the accepted size, or the usage message to report.
pub fn validate_size(requested: Option<u64>, workers: usize, max_size: u64) -> std::result::Result<u64, String> {
    let size = requested.ok_or_else(|| "a vector size argument is required".to_string())?;

    if size == 0 || size > max_size {
        return Err(format!("vector size must be between 1 and {}, got {}", max_size, size));
    }

    if size < workers as u64 {
        return Err(format!(
            "vector size {} is smaller than the number of workers ({}); every worker needs at least one element",
            size, workers
        ));
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_size_accepts_reference_range() {
        for size in 1..=8 {
            assert_eq!(validate_size(Some(size), 1, 8), Ok(size));
        }
    }

    #[test]
    fn test_validate_size_missing() {
        let err = validate_size(None, 1, 8).unwrap_err();
        assert!(err.contains("required"));
    }

    #[test]
    fn test_validate_size_out_of_range() {
        assert!(validate_size(Some(0), 1, 8).is_err());
        assert!(validate_size(Some(9), 1, 8).is_err());
        assert_eq!(validate_size(Some(9), 1, 16), Ok(9));
    }

    #[test]
    fn test_validate_size_smaller_than_group() {
        let err = validate_size(Some(3), 4, 8).unwrap_err();
        assert!(err.contains("smaller than the number of workers"));
        assert_eq!(validate_size(Some(4), 4, 8), Ok(4));
    }

    #[test]
    fn test_validate_config_defaults() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_group() {
        let mut group = GroupConfig::default();
        group.workers = Some(0);
        assert!(validate_group(&group).is_err());

        let mut group = GroupConfig::default();
        group.mode = ExecutionMode::Coordinator;
        group.listen = "not an address".to_string();
        assert!(validate_group(&group).is_err());

        group.listen = "127.0.0.1:0".to_string();
        assert!(validate_group(&group).is_ok());

        let mut group = GroupConfig::default();
        group.mode = ExecutionMode::Worker;
        group.connect_retries = 0;
        assert!(validate_group(&group).is_err());
    }

    #[test]
    fn test_validate_run() {
        let mut run = RunConfig::default();
        assert!(validate_run(&run).is_ok());

        run.max_size = 0;
        assert!(validate_run(&run).is_err());
    }
}
