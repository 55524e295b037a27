//! geomean - geometric mean of a random vector, computed by a worker group
//!
//! The vector is never materialised. Its index range `[0, V-1]` is split into
//! contiguous partitions, one per worker; each worker draws and multiplies the
//! values of its own partition, and a collective reduce delivers the product
//! of all partial products to the coordinator (rank 0), which reports
//! `product^(1/V)`.
//!
//! # Architecture
//!
//! - **partition**: contiguous, disjoint, exhaustive index ranges
//! - **worker** / **source**: per-rank local products from a private RNG
//! - **reduce**: the combine operation and the geometric mean
//! - **group**: the `Communicator` trait and the in-process transport
//! - **distributed**: the multi-process transport over TCP
//! - **run**: the program every rank executes

pub mod config;
pub mod distributed;
pub mod error;
pub mod group;
pub mod output;
pub mod partition;
pub mod reduce;
pub mod run;
pub mod source;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::GeomeanError;
pub use group::{Communicator, LocalGroup};
pub use run::{run_rank, Report, RunSettings};

/// Result type used at the application seams
pub type Result<T> = anyhow::Result<T>;
