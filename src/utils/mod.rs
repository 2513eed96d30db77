//! Utils module - Utility functions and helpers

pub mod logging;

use std::sync::OnceLock;
use std::time::Instant;

static CLOCK_ANCHOR: OnceLock<(Instant, i64)> = OnceLock::new();

/// Monotonic milliseconds, anchored to the wall clock on first use.
///
/// The wall clock is read once; after that the value only advances by
/// elapsed `Instant` time, so a system clock step cannot move it backwards.
pub fn now_ms() -> i64 {
    let (start, epoch_ms) = CLOCK_ANCHOR
        .get_or_init(|| (Instant::now(), chrono::Utc::now().timestamp_millis()));
    let elapsed = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
    epoch_ms.saturating_add(elapsed)
}
