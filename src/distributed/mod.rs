//! Multi-process groups over TCP
//!
//! # Architecture
//!
//! - **Coordinator**: rank 0, binds a listener, admits `n - 1` workers and relays
//!   every collective
//! - **Worker**: connects to the coordinator, gets its rank, runs the same
//!   program as every other member
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `comm`: the [`TcpComm`] communicator

pub mod comm;
pub mod protocol;

pub use comm::TcpComm;
pub use protocol::{Message, PROTOCOL_VERSION};
