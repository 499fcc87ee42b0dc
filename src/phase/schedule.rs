//! Weekly phase schedule: (weekday, time-of-day) -> phase state.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Utc, Weekday};

use super::PhaseState;

/// One scheduled window of a phase.
#[derive(Debug, Clone)]
pub struct PhaseWindow {
    /// Gating state while inside this window
    pub state: PhaseState,
    /// Days this window applies
    pub weekdays: Vec<Weekday>,
    /// Inclusive local start time
    pub start: NaiveTime,
    /// Exclusive local end time; a start after the end wraps past midnight
    pub end: NaiveTime,
}

impl PhaseWindow {
    fn contains(&self, weekday: Weekday, time: NaiveTime) -> bool {
        if !self.weekdays.contains(&weekday) {
            return false;
        }
        if self.start == self.end {
            // Degenerate window covers the whole day.
            true
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// The full weekly schedule, evaluated against the wall clock in a fixed
/// UTC-offset timezone. Windows are checked in declared order; anything
/// outside every window is closed.
#[derive(Debug, Clone)]
pub struct PhaseSchedule {
    timezone: FixedOffset,
    windows: Vec<PhaseWindow>,
}

impl PhaseSchedule {
    /// Build a schedule from windows in declared order.
    pub fn new(timezone: FixedOffset, windows: Vec<PhaseWindow>) -> Self {
        Self { timezone, windows }
    }

    /// A schedule that is always in continuous trading. Used by tests and
    /// by deployments that never close.
    pub fn always_open() -> Self {
        Self {
            timezone: FixedOffset::east_opt(0).expect("zero offset is valid"),
            windows: vec![PhaseWindow {
                state: PhaseState::continuous(),
                weekdays: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                    Weekday::Sat,
                    Weekday::Sun,
                ],
                start: NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"),
                end: NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"),
            }],
        }
    }

    /// The phase state in effect at the given instant.
    pub fn state_at(&self, now: DateTime<Utc>) -> PhaseState {
        let local = now.with_timezone(&self.timezone);
        let weekday = local.weekday();
        let time = NaiveTime::from_hms_opt(local.hour(), local.minute(), local.second())
            .expect("clock components are in range");
        self.windows
            .iter()
            .find(|w| w.contains(weekday, time))
            .map(|w| w.state)
            .unwrap_or_else(PhaseState::closed)
    }

    /// The configured timezone offset.
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }
}
