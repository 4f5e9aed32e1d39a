//! Typed access to the persisted session keys.
//!
//! Each key is read and written independently and string-encoded, so any
//! key-value backend can hold them. Reads never fail: a missing or corrupt
//! value falls back to its default and the corruption is logged.

use chrono::NaiveDate;
use tracing::warn;

use super::KvStore;
use crate::error::StoreError;
use crate::timer::state::{TimerState, DEFAULT_TOTAL_DURATION_MS, MAX_TOTAL_DURATION_MS};

pub const TIMER_STATE_KEY: &str = "timer_state";
pub const TOTAL_DURATION_KEY: &str = "total_duration";
pub const AUTO_START_KEY: &str = "auto_start";
pub const FOCUS_TASK_KEY: &str = "focus_task";
pub const LAST_ACTIVE_DAY_KEY: &str = "last_active_day";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Outcome of reading `timer_state`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredTimerState {
    Missing,
    Parsed(TimerState),
    Corrupt,
}

pub struct SessionStore {
    kv: Box<dyn KvStore>,
}

impl SessionStore {
    pub fn new(kv: impl KvStore + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.kv.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read persisted value");
                None
            }
        }
    }

    pub fn timer_state(&self) -> StoredTimerState {
        let Some(raw) = self.read(TIMER_STATE_KEY) else {
            return StoredTimerState::Missing;
        };
        match serde_json::from_str::<TimerState>(&raw) {
            Ok(state) => StoredTimerState::Parsed(state),
            Err(e) => {
                warn!(error = %e, "stored timer state is not valid JSON");
                StoredTimerState::Corrupt
            }
        }
    }

    pub fn set_timer_state(&self, state: &TimerState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        self.kv.set(TIMER_STATE_KEY, &json)
    }

    pub fn total_duration_ms(&self) -> u64 {
        match self.read(TOTAL_DURATION_KEY) {
            None => DEFAULT_TOTAL_DURATION_MS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 && ms <= MAX_TOTAL_DURATION_MS => ms,
                _ => {
                    warn!(value = %raw, "ignoring invalid stored total_duration");
                    DEFAULT_TOTAL_DURATION_MS
                }
            },
        }
    }

    pub fn set_total_duration_ms(&self, ms: u64) -> Result<(), StoreError> {
        self.kv.set(TOTAL_DURATION_KEY, &ms.to_string())
    }

    pub fn auto_start(&self) -> bool {
        match self.read(AUTO_START_KEY).as_deref() {
            Some("false") => false,
            Some("true") | None => true,
            Some(other) => {
                warn!(value = other, "ignoring invalid stored auto_start");
                true
            }
        }
    }

    pub fn set_auto_start(&self, enabled: bool) -> Result<(), StoreError> {
        self.kv
            .set(AUTO_START_KEY, if enabled { "true" } else { "false" })
    }

    pub fn focus_task(&self) -> String {
        self.read(FOCUS_TASK_KEY).unwrap_or_default()
    }

    pub fn set_focus_task(&self, task: &str) -> Result<(), StoreError> {
        self.kv.set(FOCUS_TASK_KEY, task)
    }

    pub fn last_active_day(&self) -> Option<NaiveDate> {
        let raw = self.read(LAST_ACTIVE_DAY_KEY)?;
        match NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT) {
            Ok(day) => Some(day),
            Err(_) => {
                warn!(value = %raw, "ignoring invalid stored last_active_day");
                None
            }
        }
    }

    pub fn set_last_active_day(&self, day: NaiveDate) -> Result<(), StoreError> {
        self.kv
            .set(LAST_ACTIVE_DAY_KEY, &day.format(DAY_FORMAT).to_string())
    }
}
