//! Market phase state machine: time-of-day driven gating of submission,
//! cancellation, and matching.

mod manager;
mod schedule;

pub use manager::run_phase_manager;
pub use schedule::{PhaseSchedule, PhaseWindow};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A mode of the market controlling which operations are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No submissions, no matching
    Closed,
    /// Orders accepted and buffered; no matching yet
    PreOpen,
    /// Orders accepted for the batch cross
    OpeningAuction,
    /// Normal continuous trading
    Continuous,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Closed => "closed",
            Phase::PreOpen => "pre_open",
            Phase::OpeningAuction => "opening_auction",
            Phase::Continuous => "continuous",
        };
        write!(f, "{s}")
    }
}

/// How accepted orders execute during a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStyle {
    /// No execution at all
    None,
    /// Single batch cross when the phase ends
    Batch,
    /// Match-on-arrival
    Continuous,
}

/// The full gating state derived from the current phase.
///
/// Written by the phase manager into a single-writer watch cell; the
/// validator and matcher read their gates from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseState {
    /// Which phase the market is in
    pub phase: Phase,
    /// Whether new orders are accepted
    pub submit_allowed: bool,
    /// Whether cancellations are accepted
    pub cancel_allowed: bool,
    /// Whether the matcher is running
    pub match_enabled: bool,
    /// How accepted orders execute
    pub execution_style: ExecutionStyle,
}

impl PhaseState {
    /// The built-in flag set for a phase. Configuration may override the
    /// flags per window; these are the defaults.
    #[must_use]
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Closed => Self {
                phase,
                submit_allowed: false,
                cancel_allowed: false,
                match_enabled: false,
                execution_style: ExecutionStyle::None,
            },
            Phase::PreOpen => Self {
                phase,
                submit_allowed: true,
                cancel_allowed: true,
                match_enabled: false,
                execution_style: ExecutionStyle::None,
            },
            Phase::OpeningAuction => Self {
                phase,
                submit_allowed: true,
                cancel_allowed: false,
                match_enabled: false,
                execution_style: ExecutionStyle::Batch,
            },
            Phase::Continuous => Self {
                phase,
                submit_allowed: true,
                cancel_allowed: true,
                match_enabled: true,
                execution_style: ExecutionStyle::Continuous,
            },
        }
    }

    /// State outside every scheduled window.
    #[must_use]
    pub fn closed() -> Self {
        Self::for_phase(Phase::Closed)
    }

    /// State for open continuous trading.
    #[must_use]
    pub fn continuous() -> Self {
        Self::for_phase(Phase::Continuous)
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::closed()
    }
}
