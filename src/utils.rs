//! Time helpers shared across the exchange.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Get the current time in milliseconds since the UNIX epoch.
///
/// Used for wall-clock fields on trades and outbound messages. Falls back
/// to 0 if the system clock is before the epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

static CLOCK_START: OnceLock<Instant> = OnceLock::new();
static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Get a strictly monotonic timestamp in nanoseconds since process start.
///
/// Two calls never return the same value, even across threads, so the
/// result is usable directly as a time-priority key: for any two orders,
/// the one stamped first wins ties at the same price level.
pub fn monotonic_nanos() -> u64 {
    let start = *CLOCK_START.get_or_init(Instant::now);
    let now = start.elapsed().as_nanos() as u64;
    let mut prev = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_STAMP.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}
