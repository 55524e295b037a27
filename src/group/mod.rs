//! Worker groups and their collective operations
//!
//! A group is a fixed set of `n` workers with ranks `0..n`. Rank 0 is the
//! coordinator. Workers share no mutable state; they exchange values only
//! through the two collectives of the [`Communicator`] trait:
//!
//! - **broadcast**: the root's [`Directive`] is delivered to every rank
//! - **reduce_product**: every rank contributes one `f64`, the root receives
//!   their product
//!
//! Both collectives block the caller until the operation has completed for it.
//! Every rank must call them the same number of times and in the same order.
//! A rank that never arrives stalls the rest of the group: there are no
//! timeouts.
//!
//! # Transports
//!
//! - [`local`]: one thread per worker inside this process, crossbeam channels
//! - [`crate::distributed`]: one process per worker, TCP through the coordinator

pub mod local;

use crate::error::GroupResult;
use serde::{Deserialize, Serialize};

pub use local::{LocalComm, LocalGroup};

/// Worker identity within a group
pub type Rank = usize;

/// Rank of the coordinator
pub const COORDINATOR: Rank = 0;

/// Broadcast payload sent by the coordinator before any work starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Proceed with a vector of `size` elements
    Run { size: u64 },
    /// Stop without reducing anything
    Abort { reason: String },
}

/// Group membership and collectives, as seen from one worker
pub trait Communicator {
    /// Rank of the calling worker
    fn rank(&self) -> Rank;

    /// Number of workers in the group
    fn size(&self) -> usize;

    /// Deliver the root's directive to every rank
    ///
    /// The root passes `Some`, every other rank passes `None`. All ranks,
    /// the root included, get the root's directive back.
    fn broadcast(&mut self, directive: Option<Directive>, root: Rank) -> GroupResult<Directive>;

    /// Multiply one value from every rank together at `root`
    ///
    /// Returns `Some(product)` on the root and `None` everywhere else. The
    /// order in which partial products are combined is transport-defined.
    fn reduce_product(&mut self, local: f64, root: Rank) -> GroupResult<Option<f64>>;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }
}

/// Check that `root` names a member of a group of `size`
pub(crate) fn check_root(root: Rank, size: usize) -> GroupResult<()> {
    if root >= size {
        return Err(crate::error::GeomeanError::InvalidRoot { root, size });
    }
    Ok(())
}

/// Resolve the directive a root passes into a broadcast
pub(crate) fn root_directive(directive: Option<Directive>) -> GroupResult<Directive> {
    directive.ok_or_else(|| crate::error::GeomeanError::UnexpectedMessage {
        operation: "broadcast",
        got: "no directive supplied at root".to_string(),
    })
}
