//! geomean CLI entry point

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::CommandFactory;
use geomean::config::cli::{Cli, ExecutionMode};
use geomean::config::toml::load_config;
use geomean::config::validator::{validate_config, validate_size};
use geomean::config::Config;
use geomean::distributed::TcpComm;
use geomean::group::{Communicator, LocalGroup};
use geomean::output::json::write_json_output;
use geomean::output::text::print_results;
use geomean::run::{run_rank, Report, RunSettings};
use geomean::GeomeanError;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    if let Err(e) = cli.validate() {
        usage_error(&e.to_string());
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(GeomeanError::Usage(reason)) = e.downcast_ref::<GeomeanError>() {
                usage_error(reason);
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Print `message` with the usage line to stderr and exit with status 2
fn usage_error(message: &str) -> ! {
    Cli::command().error(ErrorKind::ValueValidation, message).exit()
}

/// Log to stderr; `--debug` raises our own events to debug, `RUST_LOG` wins
fn init_logging(debug: bool) {
    let default = if debug { "warn,geomean=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded; keep that one
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    init_logging(config.output.debug);

    validate_config(&config).context("Configuration validation failed")?;
    debug!("{}", config);

    let settings = RunSettings::from(&config);
    let report = match config.group.mode {
        ExecutionMode::Local => run_local(&config, &settings)?,
        ExecutionMode::Coordinator => run_coordinator(&config, &settings)?,
        ExecutionMode::Worker => {
            run_worker(&config, &settings)?;
            None
        }
    };

    if let Some(report) = report {
        print_results(&report, config.output.timing).context("Failed to print results")?;

        if let Some(ref path) = config.output.json_output {
            write_json_output(path, &report, true)?;
            info!(path = %path.display(), "JSON report written");
        }
    }

    Ok(())
}

/// All workers as threads of this process
fn run_local(config: &Config, settings: &RunSettings) -> Result<Option<Report>> {
    let workers = config.group_size();
    debug!(workers, "starting local group");

    let results = LocalGroup::run(workers, |mut comm| run_rank(&mut comm, config.run.size, settings))?;

    // Rank 0 comes first, so a rejected request surfaces as the usage error
    let mut report = None;
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(Some(r)) => report = Some(r),
            Ok(None) => {}
            Err(GeomeanError::Aborted { .. }) => {}
            Err(e @ GeomeanError::Usage(_)) => return Err(e.into()),
            Err(e) => return Err(e).with_context(|| format!("Worker {} failed", rank)),
        }
    }

    Ok(report)
}

/// Rank 0 of a multi-process group
fn run_coordinator(config: &Config, settings: &RunSettings) -> Result<Option<Report>> {
    let workers = config.group_size();

    // Reject a bad request before binding; no worker has joined yet
    validate_size(config.run.size, workers, settings.max_size).map_err(GeomeanError::Usage)?;
    info!(workers, listen = %config.group.listen, "forming group");

    let mut comm = TcpComm::coordinator(&config.group.listen, workers)?;
    Ok(run_rank(&mut comm, config.run.size, settings)?)
}

/// One non-coordinator rank of a multi-process group
fn run_worker(config: &Config, settings: &RunSettings) -> Result<()> {
    let mut comm = TcpComm::worker(&config.group.connect, config.group.connect_retries)?;
    info!(rank = comm.rank(), size = comm.size(), "joined group");

    run_rank(&mut comm, None, settings)?;
    Ok(())
}
