//! Wall-clock timing for the processing-time report

use std::time::{Duration, Instant};

/// Start point of a timed section
///
/// Thin wrapper around `std::time::Instant` so callers never mix monotonic
/// and wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    instant: Instant,
}

impl Timestamp {
    #[inline]
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
        }
    }

    /// Elapsed time since this timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Elapsed time in seconds, as printed on the `Processing time` line
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}
