//! Wall-clock helpers
//!
//! Timestamps recorded in `hold` are Unix seconds; a clock set before the
//! epoch reads as zero instead of panicking.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Current Unix timestamp as a `Duration`
pub fn current_timestamp_duration() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_else(|_| {
        warn!("System clock is before the Unix epoch, reading it as 0");
        Duration::ZERO
    })
}

/// Current Unix timestamp in seconds
pub fn current_timestamp() -> u64 {
    current_timestamp_duration().as_secs()
}

/// Milliseconds since `started`, as reported to admins
pub fn elapsed_millis(started: Instant) -> u128 {
    started.elapsed().as_millis()
}
