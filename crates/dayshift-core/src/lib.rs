//! # Dayshift Core Library
//!
//! This library provides the core logic for the Dayshift work-session timer:
//! one bounded work period per day, started by the first user input and
//! abandoned at midnight. The CLI binary is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine that writes every
//!   transition through to storage and returns the side effects to apply
//! - **Storage**: SQLite key-value store for session state and TOML-based
//!   configuration
//! - **Session Controller**: Applies effects (activity subscription, ticker,
//!   wake lock, notifications, chime) and runs the single-threaded event loop
//! - **Tips**: Fallible contextual-tip lookup with a fixed local fallback
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SessionController`]: Effect dispatcher and event loop
//! - [`Database`]: Key-value persistence
//! - [`Config`]: Application configuration management

pub mod activity;
pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod rollover;
pub mod session;
pub mod storage;
pub mod timer;
pub mod tips;
pub mod wake_lock;

pub use activity::{ActivityDetector, ActivityKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use rollover::DayRolloverMonitor;
pub use session::{Backends, Command, ControllerOptions, SessionController};
pub use storage::{Config, Database, KvStore, MemoryStore, SessionStore};
pub use timer::{Effect, Status, TimerEngine, TimerState, Transition, MAX_TOTAL_DURATION_MS};
pub use tips::{Tip, TipLookup, TipProvider};

/// Convert a duration in hours to whole milliseconds.
///
/// # Errors
/// Returns an error for non-finite or non-positive hours, values that
/// round down to zero milliseconds, and anything past
/// [`MAX_TOTAL_DURATION_MS`].
pub fn hours_to_ms(hours: f64) -> Result<i64, ValidationError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(ValidationError::InvalidHours(hours));
    }
    let ms = (hours * 3_600_000.0).round();
    if ms < 1.0 {
        return Err(ValidationError::InvalidHours(hours));
    }
    if ms > MAX_TOTAL_DURATION_MS as f64 {
        return Err(ValidationError::DurationTooLong {
            ms: ms.min(i64::MAX as f64) as i64,
            max_ms: MAX_TOTAL_DURATION_MS,
        });
    }
    Ok(ms as i64)
}

/// Reject out-of-range durations before they reach the engine.
///
/// # Errors
/// Returns [`ValidationError::NonPositiveDuration`] for `ms <= 0` and
/// [`ValidationError::DurationTooLong`] above [`MAX_TOTAL_DURATION_MS`].
pub fn validate_duration_ms(ms: i64) -> Result<i64, ValidationError> {
    if ms <= 0 {
        return Err(ValidationError::NonPositiveDuration(ms));
    }
    if u64::try_from(ms).map_or(true, |v| v > MAX_TOTAL_DURATION_MS) {
        return Err(ValidationError::DurationTooLong {
            ms,
            max_ms: MAX_TOTAL_DURATION_MS,
        });
    }
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_convert_to_millis() {
        assert_eq!(hours_to_ms(8.0), Ok(28_800_000));
        assert_eq!(hours_to_ms(0.5), Ok(1_800_000));
        assert!(hours_to_ms(0.0).is_err());
        assert!(hours_to_ms(-1.0).is_err());
        assert!(hours_to_ms(f64::NAN).is_err());
        assert_eq!(hours_to_ms(168.0), Ok(MAX_TOTAL_DURATION_MS as i64));
        assert!(matches!(
            hours_to_ms(1e300),
            Err(ValidationError::DurationTooLong { .. })
        ));
    }

    #[test]
    fn validates_positive_millis() {
        assert_eq!(validate_duration_ms(1), Ok(1));
        assert_eq!(
            validate_duration_ms(0),
            Err(ValidationError::NonPositiveDuration(0))
        );
        assert_eq!(
            validate_duration_ms(i64::MAX),
            Err(ValidationError::DurationTooLong {
                ms: i64::MAX,
                max_ms: MAX_TOTAL_DURATION_MS
            })
        );
    }
}
