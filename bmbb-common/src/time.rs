//! Monotonic time helpers
//!
//! Both playback workers are driven from one shared start instant taken from
//! the tokio clock, so tests can pause and advance time deterministically.

use std::time::Duration;
use tokio::time::Instant;

/// Read the monotonic clock
pub fn now() -> Instant {
    Instant::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Deadline for an offset relative to `start`.
///
/// Negative offsets land before `start`, which makes them already due when
/// the session begins. If the clock cannot represent the earlier instant the
/// deadline saturates at `start`.
pub fn deadline_after(start: Instant, offset_ms: i64) -> Instant {
    let magnitude = millis_to_duration(offset_ms.unsigned_abs());
    if offset_ms >= 0 {
        start + magnitude
    } else {
        start.checked_sub(magnitude).unwrap_or(start)
    }
}

/// Milliseconds elapsed since `start`, as a signed value for log output
pub fn elapsed_ms(start: Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}
