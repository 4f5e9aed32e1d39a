//! Persisted shape of the work-session timer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default session length: 8 hours.
pub const DEFAULT_TOTAL_DURATION_MS: u64 = 8 * 60 * 60 * 1000;

/// Longest accepted session: one week.
pub const MAX_TOTAL_DURATION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    /// Waiting for the first input event before the countdown starts.
    Listening,
    Running,
    Finished,
}

/// Timer state, stored as JSON under `timer_state`.
///
/// Timestamps are epoch milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: Status,
}

impl TimerState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn listening() -> Self {
        Self {
            status: Status::Listening,
            ..Self::default()
        }
    }

    /// A session started at `start`. `None` when the duration is out of
    /// range.
    pub fn running(start: DateTime<Utc>, total_duration_ms: u64) -> Option<Self> {
        Some(Self {
            start_time: Some(start),
            end_time: Some(end_time_for(start, total_duration_ms)?),
            status: Status::Running,
        })
    }

    /// Milliseconds left until `end_time`, never negative.
    ///
    /// Zero whenever there is no end time.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.end_time {
            Some(end) => (end - now).num_milliseconds().max(0) as u64,
            None => 0,
        }
    }

    /// Fraction of the session elapsed, clamped to `0.0..=1.0`.
    pub fn progress(&self, now: DateTime<Utc>, total_duration_ms: u64) -> f64 {
        match self.status {
            Status::Idle | Status::Listening => 0.0,
            Status::Finished => 1.0,
            Status::Running => {
                if total_duration_ms == 0 {
                    return 0.0;
                }
                let remaining = self.remaining_ms(now) as f64;
                (1.0 - remaining / total_duration_ms as f64).clamp(0.0, 1.0)
            }
        }
    }

    /// Whether the shape matches what its status requires.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            Status::Idle | Status::Listening => {
                self.start_time.is_none() && self.end_time.is_none()
            }
            Status::Running => match (self.start_time, self.end_time) {
                (Some(start), Some(end)) => end >= start,
                _ => false,
            },
            Status::Finished => true,
        }
    }
}

/// `start + total_duration_ms`, or `None` for a zero or over-long duration
/// and for results past the representable range.
pub fn end_time_for(start: DateTime<Utc>, total_duration_ms: u64) -> Option<DateTime<Utc>> {
    if total_duration_ms == 0 || total_duration_ms > MAX_TOTAL_DURATION_MS {
        return None;
    }
    let ms = i64::try_from(total_duration_ms).ok()?;
    start.checked_add_signed(Duration::milliseconds(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn serializes_with_camel_case_and_epoch_millis() {
        let state = TimerState::running(at(9, 0), 3_600_000).unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["startTime"], at(9, 0).timestamp_millis());
        assert_eq!(json["endTime"], at(10, 0).timestamp_millis());
    }

    #[test]
    fn idle_serializes_null_times() {
        let json = serde_json::to_string(&TimerState::idle()).unwrap();
        assert_eq!(json, r#"{"startTime":null,"endTime":null,"status":"idle"}"#);
    }

    #[test]
    fn missing_time_fields_default_to_none() {
        let state: TimerState = serde_json::from_str(r#"{"status":"listening"}"#).unwrap();
        assert_eq!(state, TimerState::listening());
    }

    #[test]
    fn remaining_and_progress_are_derived_from_end_time() {
        let state = TimerState::running(at(9, 0), 4 * 3_600_000).unwrap();
        assert_eq!(state.remaining_ms(at(11, 0)), 2 * 3_600_000);
        assert!((state.progress(at(11, 0), 4 * 3_600_000) - 0.5).abs() < f64::EPSILON);
        assert_eq!(state.remaining_ms(at(14, 0)), 0);
        assert_eq!(state.progress(at(14, 0), 4 * 3_600_000), 1.0);
    }

    #[test]
    fn consistency_rules() {
        assert!(TimerState::idle().is_consistent());
        assert!(TimerState::running(at(9, 0), 1).unwrap().is_consistent());

        let backwards = TimerState {
            start_time: Some(at(10, 0)),
            end_time: Some(at(9, 0)),
            status: Status::Running,
        };
        assert!(!backwards.is_consistent());

        let idle_with_times = TimerState {
            status: Status::Idle,
            ..TimerState::running(at(9, 0), 1).unwrap()
        };
        assert!(!idle_with_times.is_consistent());

        let finished_after_reset = TimerState {
            status: Status::Finished,
            ..TimerState::idle()
        };
        assert!(finished_after_reset.is_consistent());
    }

    #[test]
    fn end_time_rejects_out_of_range_durations() {
        assert_eq!(end_time_for(at(9, 0), 3_600_000), Some(at(10, 0)));
        assert!(end_time_for(at(9, 0), MAX_TOTAL_DURATION_MS).is_some());
        assert_eq!(end_time_for(at(9, 0), 0), None);
        assert_eq!(end_time_for(at(9, 0), MAX_TOTAL_DURATION_MS + 1), None);
        assert_eq!(end_time_for(at(9, 0), u64::MAX), None);
        assert_eq!(end_time_for(DateTime::<Utc>::MAX_UTC, 1), None);
        assert!(TimerState::running(at(9, 0), u64::MAX).is_none());
    }
}
