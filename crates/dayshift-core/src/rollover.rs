//! Midnight auto-reset.
//!
//! A session never spans calendar days. The monitor compares the persisted
//! last-active day with today and, on mismatch, abandons whatever the timer
//! is doing, including a session that still has time left.

use std::time::Duration;

use tracing::info;

use crate::events::Event;
use crate::timer::{TimerEngine, Transition};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DayRolloverMonitor {
    interval: Duration,
}

impl Default for DayRolloverMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_INTERVAL)
    }
}

impl DayRolloverMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Compare the stored day with today.
    ///
    /// The first observation just records today. A different stored day is
    /// replaced with today and the engine is reset unconditionally.
    pub fn check(&self, engine: &mut TimerEngine) -> Option<Transition> {
        let today = engine.today();
        match engine.last_active_day() {
            Some(day) if day == today => None,
            None => {
                engine.mark_active_day(today);
                None
            }
            Some(previous_day) => {
                info!(%previous_day, %today, "day rolled over, resetting session");
                engine.mark_active_day(today);
                let mut transition = Transition {
                    events: vec![Event::DayRolledOver {
                        previous_day,
                        today,
                        at: engine.clock().now(),
                    }],
                    effects: Vec::new(),
                };
                transition.chain(engine.reset());
                Some(transition)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{KvStore, MemoryStore, SessionStore};
    use crate::timer::{Effect, Status, TimerState};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Arc;

    fn engine_on_jan_2(kv: &MemoryStore) -> (TimerEngine, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap());
        let engine = TimerEngine::restore(SessionStore::new(kv.clone()), Arc::new(clock.clone()));
        (engine, clock)
    }

    #[test]
    fn first_observation_records_today_without_reset() {
        let kv = MemoryStore::new();
        let (mut engine, _) = engine_on_jan_2(&kv);
        engine.start_listening().unwrap();

        assert!(DayRolloverMonitor::default().check(&mut engine).is_none());
        assert_eq!(engine.status(), Status::Listening);
        assert_eq!(kv.get("last_active_day").unwrap().as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn same_day_is_a_noop() {
        let kv = MemoryStore::new();
        kv.set("last_active_day", "2024-01-02").unwrap();
        let (mut engine, _) = engine_on_jan_2(&kv);
        assert!(DayRolloverMonitor::default().check(&mut engine).is_none());
    }

    #[test]
    fn rollover_abandons_running_session() {
        let kv = MemoryStore::new();
        kv.set("last_active_day", "2024-01-01").unwrap();
        let (mut engine, _) = engine_on_jan_2(&kv);
        engine.start_listening().unwrap();
        engine.start().unwrap();
        assert!(engine.remaining_ms() > 0);

        let t = DayRolloverMonitor::default().check(&mut engine).unwrap();
        assert!(matches!(t.events[0], Event::DayRolledOver { .. }));
        assert!(matches!(
            t.events[1],
            Event::SessionReset { from: Status::Running, .. }
        ));
        assert!(t.effects.contains(&Effect::ReleaseWakeLock));
        assert_eq!(engine.state(), &TimerState::idle());
        assert_eq!(kv.get("last_active_day").unwrap().as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn rollover_detected_after_midnight_passes() {
        let kv = MemoryStore::new();
        let (mut engine, clock) = engine_on_jan_2(&kv);
        let monitor = DayRolloverMonitor::default();
        assert!(monitor.check(&mut engine).is_none());

        clock.advance(ChronoDuration::hours(17));
        assert!(monitor.check(&mut engine).is_some());
        assert!(monitor.check(&mut engine).is_none());
    }
}
