//! Clock helpers.
//!
//! Durations are measured on tokio's monotonic clock, which follows
//! `tokio::time::pause` in tests. Wall-clock milliseconds are only used to
//! timestamp snapshots.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Milliseconds since the Unix epoch. Returns 0 if the system clock is set
/// before the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Elapsed milliseconds between two timestamps, saturating at zero.
#[must_use]
pub const fn elapsed_ms(start_ms: u128, end_ms: u128) -> u128 {
    end_ms.saturating_sub(start_ms)
}

/// Monotonic millisecond clock anchored at the start of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    origin: Instant,
}

impl RunClock {
    /// Anchor a clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since the clock was started.
    #[must_use]
    pub fn now_ms(&self) -> u128 {
        self.origin.elapsed().as_millis()
    }
}
