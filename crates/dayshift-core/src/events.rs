use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Status;
use crate::tips::Tip;

/// Every state change in the system produces an Event.
/// The CLI prints them as JSON lines; hosts render them into title/badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Idle -> Listening, either by command or by auto-start.
    ListeningStarted {
        auto: bool,
        at: DateTime<Utc>,
    },
    ListeningCancelled {
        at: DateTime<Utc>,
    },
    /// First activity observed; the countdown is running.
    SessionStarted {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        total_duration_ms: u64,
        at: DateTime<Utc>,
    },
    SessionFinished {
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    SessionReset {
        from: Status,
        at: DateTime<Utc>,
    },
    /// Total duration changed. `end_time` is set only when a running
    /// session was re-timed.
    SessionReconfigured {
        total_duration_ms: u64,
        end_time: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    DayRolledOver {
        previous_day: NaiveDate,
        today: NaiveDate,
        at: DateTime<Utc>,
    },
    TipUpdated {
        tip: Tip,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: Status,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        remaining_ms: u64,
        progress: f64,
        total_duration_ms: u64,
        focus_task: String,
        auto_start: bool,
        wake_lock_active: bool,
        at: DateTime<Utc>,
    },
}
