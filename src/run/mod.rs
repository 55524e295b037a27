//! The program every member of a group executes
//!
//! ```text
//! coordinator: validate size ─┐
//!                             ▼
//! all ranks:   broadcast(Directive) ─► partition ─► local product ─► reduce_product
//!                                                                       │
//! coordinator:                                          geometric mean ◄┘
//! ```
//!
//! Only the coordinator validates the request. If the request is unusable it
//! broadcasts [`Directive::Abort`] instead of a size, so no rank is ever left
//! waiting in a collective the coordinator will not join.

use crate::config::validator::validate_size;
use crate::config::Config;
use crate::error::{GeomeanError, GroupResult};
use crate::group::{Communicator, Directive, COORDINATOR};
use crate::partition::{partition, partition_all, Partition};
use crate::reduce::geometric_mean;
use crate::source::UniformSource;
use crate::util::time::Timestamp;
use crate::worker::Worker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Per-run parameters every rank needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Largest accepted vector size (checked by the coordinator only)
    pub max_size: u64,
    pub seed: Option<u64>,
    pub max_value: u64,
    /// Print every drawn value
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_size: config.run.max_size,
            seed: config.run.seed,
            max_value: config.run.max_value,
            verbose: config.output.verbose,
        }
    }
}

/// Outcome of a run, produced by the coordinator only
///
/// Serialize-only: a non-finite product or mean is written to JSON as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Product of every drawn value
    pub product: f64,
    /// Vector size
    pub size: u64,
    pub geometric_mean: f64,
    /// Group size
    pub workers: usize,
    pub partitions: Vec<Partition>,
    /// Wall-clock seconds from the broadcast to the mean
    pub elapsed_secs: f64,
    pub generated_at: DateTime<Utc>,
}

/// Execute one run as the calling rank
///
/// `requested` is only read on the coordinator. Returns `Some(report)` on the
/// coordinator and `None` on every other rank.
///
/// # Errors
///
/// - [`GeomeanError::Usage`] on the coordinator when the request was rejected
/// - [`GeomeanError::Aborted`] on the other ranks in the same case
/// - transport errors from either collective
pub fn run_rank<C: Communicator>(
    comm: &mut C,
    requested: Option<u64>,
    settings: &RunSettings,
) -> GroupResult<Option<Report>> {
    let started = Timestamp::now();
    let rank = comm.rank();
    let workers = comm.size();

    let proposal = comm.is_coordinator().then(|| {
        match validate_size(requested, workers, settings.max_size) {
            Ok(size) => Directive::Run { size },
            Err(reason) => {
                debug!(%reason, "rejecting request, aborting group");
                Directive::Abort { reason }
            }
        }
    });

    let size = match comm.broadcast(proposal, COORDINATOR)? {
        Directive::Run { size } => size,
        Directive::Abort { reason } if comm.is_coordinator() => {
            return Err(GeomeanError::Usage(reason));
        }
        Directive::Abort { reason } => {
            debug!(rank, %reason, "coordinator aborted the run");
            return Err(GeomeanError::Aborted { reason });
        }
    };

    let part = partition(size, workers, rank);
    debug!(rank, size, partition = %part, "partition assigned");

    let source = UniformSource::for_rank(rank, settings.seed, settings.max_value);
    let local = Worker::new(rank, part, Box::new(source))
        .with_echo(settings.verbose)
        .run();

    let Some(product) = comm.reduce_product(local.product, COORDINATOR)? else {
        return Ok(None);
    };

    let mean = geometric_mean(product, size);
    info!(size, workers, product, mean, "run complete");

    Ok(Some(Report {
        product,
        size,
        geometric_mean: mean,
        workers,
        partitions: partition_all(size, workers),
        elapsed_secs: started.elapsed_secs(),
        generated_at: Utc::now(),
    }))
}
