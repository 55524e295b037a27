//! Small helpers shared by the binary and the library

pub mod time;
