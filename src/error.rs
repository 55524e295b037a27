//! Domain errors
//!
//! Application seams (config loading, bootstrap, `main`) use `anyhow` with
//! context. The conditions below are the ones callers need to tell apart, for
//! example to pick an exit code or to recognise an aborted run.

use crate::group::Rank;

/// Result of group and run-protocol operations
pub type GroupResult<T> = std::result::Result<T, GeomeanError>;

/// Errors raised by the run protocol and the group transports
#[derive(Debug, thiserror::Error)]
pub enum GeomeanError {
    /// Invalid invocation, detected by the coordinator before any reduction
    #[error("{0}")]
    Usage(String),

    /// The coordinator broadcast an abort instead of a problem size
    #[error("run aborted by coordinator: {reason}")]
    Aborted { reason: String },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u32, remote: u32 },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("unexpected message during {operation}: {got}")]
    UnexpectedMessage {
        operation: &'static str,
        got: String,
    },

    #[error("invalid root {root}: group size is {size}")]
    InvalidRoot { root: Rank, size: usize },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeomeanError {
    /// Whether this error should be reported as a usage error (exit status 2)
    pub fn is_usage(&self) -> bool {
        matches!(self, GeomeanError::Usage(_))
    }
}
