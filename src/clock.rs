//! Local millisecond clock
//!
//! Playtimes, timing references and output updates share one 32-bit
//! millisecond counter that wraps roughly every 49 days. Compare values
//! with [`ms_diff`], never with `<`.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since the first call in this process, wrapping at `u32::MAX`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> u32 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u32
}

/// Signed distance `a - b` between two wrapping millisecond stamps
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn ms_diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}
