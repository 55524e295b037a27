//! Result reporting
//!
//! - `text`: the console lines printed by the coordinator
//! - `json`: the same report as a JSON document

pub mod json;
pub mod text;
