//! Per-team rolling submission-rate window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling window of recent submission instants for one team.
///
/// Rolling (not fixed-bucket) semantics: an order counts against the
/// window for exactly one window length after it arrives, so a burst
/// cannot double its budget by straddling a bucket boundary.
#[derive(Debug, Default)]
pub struct RateWindow {
    stamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submission at `now` and return how many submissions,
    /// including this one, fall inside the trailing `window`.
    pub fn record_and_count(&mut self, now: Instant, window: Duration) -> usize {
        while let Some(front) = self.stamps.front() {
            if now.duration_since(*front) >= window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
        self.stamps.push_back(now);
        self.stamps.len()
    }
}
