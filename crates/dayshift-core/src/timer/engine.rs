//! Work-session state machine.
//!
//! The engine is wall-clock based and owns no timers or threads: the caller
//! invokes `tick()` periodically and applies the [`Effect`]s each transition
//! returns.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Listening -> Running -> Finished
//!  ^         |           |          |
//!  +---------+-----------+----------+   (cancel / reset / day rollover)
//! ```
//!
//! Every transition writes the new state through to the store before its
//! effects are handed back, so storage never lags behind a side effect that
//! has already fired.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::state::{end_time_for, Status, TimerState, MAX_TOTAL_DURATION_MS};
use crate::clock::Clock;
use crate::events::Event;
use crate::storage::session::{SessionStore, StoredTimerState};

/// Side effects requested by a transition, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SubscribeActivity,
    UnsubscribeActivity,
    StartTicker,
    StopTicker,
    AcquireWakeLock,
    ReleaseWakeLock,
    NotifySessionStarted,
    NotifySessionFinished,
    PlayCompletionSound,
    /// Total duration changed; the contextual tip is stale.
    RefreshTip,
}

/// Result of a state change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub events: Vec<Event>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn single(event: Event) -> Self {
        Self {
            events: vec![event],
            effects: Vec::new(),
        }
    }

    /// Append another transition's events and effects after this one's.
    pub fn chain(&mut self, next: Transition) {
        self.events.extend(next.events);
        self.effects.extend(next.effects);
    }
}

fn on_exit(status: Status) -> &'static [Effect] {
    match status {
        Status::Listening => &[Effect::UnsubscribeActivity],
        Status::Running => &[Effect::StopTicker, Effect::ReleaseWakeLock],
        Status::Idle | Status::Finished => &[],
    }
}

fn on_enter(status: Status) -> &'static [Effect] {
    match status {
        Status::Listening => &[Effect::SubscribeActivity],
        Status::Running => &[
            Effect::StartTicker,
            Effect::AcquireWakeLock,
            Effect::NotifySessionStarted,
        ],
        Status::Finished => &[Effect::NotifySessionFinished, Effect::PlayCompletionSound],
        Status::Idle => &[],
    }
}

/// Effects that re-establish a restored state without replaying its
/// one-shot entry effects (notifications, chime).
fn on_resume(status: Status) -> &'static [Effect] {
    match status {
        Status::Listening => &[Effect::SubscribeActivity],
        Status::Running => &[Effect::StartTicker, Effect::AcquireWakeLock],
        Status::Idle | Status::Finished => &[],
    }
}

/// Core session engine.
pub struct TimerEngine {
    state: TimerState,
    total_duration_ms: u64,
    store: SessionStore,
    clock: Arc<dyn Clock>,
}

impl TimerEngine {
    /// Build the engine from persisted values.
    ///
    /// An unparseable or self-contradictory stored state starts over as
    /// `Idle`. A running session whose end has already passed is left
    /// `Running`; the first `tick()` finishes it.
    pub fn restore(store: SessionStore, clock: Arc<dyn Clock>) -> Self {
        let total_duration_ms = store.total_duration_ms();
        let state = match store.timer_state() {
            StoredTimerState::Missing => TimerState::idle(),
            StoredTimerState::Corrupt => {
                warn!("reinitializing unreadable timer state to idle");
                TimerState::idle()
            }
            StoredTimerState::Parsed(state) if !state.is_consistent() => {
                warn!(?state, "reinitializing inconsistent timer state to idle");
                TimerState::idle()
            }
            StoredTimerState::Parsed(state) => state,
        };

        let engine = Self {
            state,
            total_duration_ms,
            store,
            clock,
        };
        engine.persist();
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.state.remaining_ms(self.clock.now())
    }

    /// 0.0 .. 1.0 progress within the running session.
    pub fn progress(&self) -> f64 {
        self.state.progress(self.clock.now(), self.total_duration_ms)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Effects needed to re-arm subscriptions and timers for the current
    /// state after a restart.
    pub fn resume_effects(&self) -> Vec<Effect> {
        on_resume(self.state.status).to_vec()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> Listening on explicit user request.
    pub fn start_listening(&mut self) -> Option<Transition> {
        if self.state.status != Status::Idle {
            return None;
        }
        let at = self.clock.now();
        Some(self.transition(
            TimerState::listening(),
            Event::ListeningStarted { auto: false, at },
        ))
    }

    /// Idle -> Listening when auto-start is enabled.
    pub fn auto_listen(&mut self) -> Option<Transition> {
        if self.state.status != Status::Idle || !self.store.auto_start() {
            return None;
        }
        let at = self.clock.now();
        Some(self.transition(
            TimerState::listening(),
            Event::ListeningStarted { auto: true, at },
        ))
    }

    /// Listening -> Idle.
    pub fn cancel(&mut self) -> Option<Transition> {
        if self.state.status != Status::Listening {
            return None;
        }
        let at = self.clock.now();
        Some(self.transition(TimerState::idle(), Event::ListeningCancelled { at }))
    }

    /// Listening -> Running. A no-op from any other state, which absorbs
    /// duplicate activity events.
    pub fn start(&mut self) -> Option<Transition> {
        if self.state.status != Status::Listening {
            debug!(status = ?self.state.status, "ignoring start outside listening");
            return None;
        }
        let now = self.clock.now();
        let Some(next) = TimerState::running(now, self.total_duration_ms) else {
            warn!(
                total_duration_ms = self.total_duration_ms,
                "session duration out of range, staying in listening"
            );
            return None;
        };
        let end_time = next.end_time.unwrap_or(now);
        Some(self.transition(
            next,
            Event::SessionStarted {
                start_time: now,
                end_time,
                total_duration_ms: self.total_duration_ms,
                at: now,
            },
        ))
    }

    /// Call periodically. Running -> Finished once the end time is reached.
    pub fn tick(&mut self) -> Option<Transition> {
        if self.state.status != Status::Running {
            return None;
        }
        let now = self.clock.now();
        let end = self.state.end_time?;
        if now < end {
            return None;
        }
        let next = TimerState {
            status: Status::Finished,
            ..self.state.clone()
        };
        Some(self.transition(
            next,
            Event::SessionFinished {
                start_time: self.state.start_time,
                end_time: self.state.end_time,
                at: now,
            },
        ))
    }

    /// Any state -> Idle. Idempotent.
    pub fn reset(&mut self) -> Transition {
        let at = self.clock.now();
        let from = self.state.status;
        self.transition(TimerState::idle(), Event::SessionReset { from, at })
    }

    /// Change the total session duration.
    ///
    /// Non-positive and over-long values are rejected without touching state
    /// or config. While running, `end_time` is recomputed from the unchanged
    /// `start_time`; a finished session keeps its historical times.
    pub fn reconfigure(&mut self, total_duration_ms: i64) -> Option<Transition> {
        let Ok(ms) = u64::try_from(total_duration_ms) else {
            debug!(total_duration_ms, "rejecting negative duration");
            return None;
        };
        if ms == 0 {
            debug!("rejecting zero duration");
            return None;
        }
        if ms > MAX_TOTAL_DURATION_MS {
            debug!(total_duration_ms = ms, "rejecting over-long duration");
            return None;
        }

        // Resolve the new end before anything is written.
        let end_time = match (self.state.status, self.state.start_time) {
            (Status::Running, Some(start)) => {
                let Some(end) = end_time_for(start, ms) else {
                    debug!(total_duration_ms = ms, "rejecting unrepresentable end time");
                    return None;
                };
                Some(end)
            }
            _ => None,
        };

        let changed = ms != self.total_duration_ms;
        self.total_duration_ms = ms;
        if let Err(e) = self.store.set_total_duration_ms(ms) {
            warn!(error = %e, "failed to persist total duration");
        }
        if end_time.is_some() {
            self.state.end_time = end_time;
            self.persist();
        }

        info!(total_duration_ms = ms, "session reconfigured");
        let mut transition = Transition::single(Event::SessionReconfigured {
            total_duration_ms: ms,
            end_time,
            at: self.clock.now(),
        });
        if changed {
            transition.effects.push(Effect::RefreshTip);
        }
        Some(transition)
    }

    pub fn set_auto_start(&mut self, enabled: bool) {
        if let Err(e) = self.store.set_auto_start(enabled) {
            warn!(error = %e, "failed to persist auto_start");
        }
    }

    pub fn set_focus_task(&mut self, task: &str) {
        if let Err(e) = self.store.set_focus_task(task) {
            warn!(error = %e, "failed to persist focus task");
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn last_active_day(&self) -> Option<NaiveDate> {
        self.store.last_active_day()
    }

    pub fn mark_active_day(&mut self, day: NaiveDate) {
        if let Err(e) = self.store.set_last_active_day(day) {
            warn!(error = %e, "failed to persist last active day");
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn transition(&mut self, next: TimerState, event: Event) -> Transition {
        let from = self.state.status;
        let to = next.status;
        self.state = next;
        self.persist();

        let mut effects = Vec::new();
        if from != to {
            info!(?from, ?to, "timer transition");
            effects.extend_from_slice(on_exit(from));
            effects.extend_from_slice(on_enter(to));
        }
        Transition {
            events: vec![event],
            effects,
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.set_timer_state(&self.state) {
            warn!(error = %e, "failed to persist timer state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{KvStore, MemoryStore};
    use chrono::{Duration, TimeZone, Utc};

    const HOUR_MS: u64 = 3_600_000;

    fn engine_with(kv: &MemoryStore) -> (TimerEngine, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        let engine = TimerEngine::restore(SessionStore::new(kv.clone()), Arc::new(clock.clone()));
        (engine, clock)
    }

    fn running_engine() -> (TimerEngine, ManualClock, MemoryStore) {
        let kv = MemoryStore::new();
        let (mut engine, clock) = engine_with(&kv);
        engine.start_listening().unwrap();
        engine.start().unwrap();
        (engine, clock, kv)
    }

    #[test]
    fn starts_idle_with_default_duration() {
        let kv = MemoryStore::new();
        let (engine, _) = engine_with(&kv);
        assert_eq!(engine.status(), Status::Idle);
        assert_eq!(engine.total_duration_ms(), 8 * HOUR_MS);
        assert_eq!(engine.remaining_ms(), 0);
    }

    #[test]
    fn listening_to_running_sets_times_and_effects() {
        let kv = MemoryStore::new();
        let (mut engine, clock) = engine_with(&kv);

        let t = engine.start_listening().unwrap();
        assert_eq!(t.effects, vec![Effect::SubscribeActivity]);

        let t = engine.start().unwrap();
        assert_eq!(
            t.effects,
            vec![
                Effect::UnsubscribeActivity,
                Effect::StartTicker,
                Effect::AcquireWakeLock,
                Effect::NotifySessionStarted,
            ]
        );
        let state = engine.state();
        assert_eq!(state.status, Status::Running);
        assert_eq!(state.start_time, Some(clock.now()));
        assert_eq!(
            state.end_time.unwrap() - state.start_time.unwrap(),
            Duration::milliseconds(8 * HOUR_MS as i64)
        );
    }

    #[test]
    fn start_is_a_noop_outside_listening() {
        let (mut engine, _, _) = running_engine();
        let before = engine.state().clone();
        assert!(engine.start().is_none());
        assert_eq!(engine.state(), &before);

        engine.reset();
        assert!(engine.start().is_none());
        assert_eq!(engine.status(), Status::Idle);
    }

    #[test]
    fn cancel_only_leaves_listening() {
        let kv = MemoryStore::new();
        let (mut engine, _) = engine_with(&kv);
        assert!(engine.cancel().is_none());
        engine.start_listening().unwrap();
        let t = engine.cancel().unwrap();
        assert_eq!(t.effects, vec![Effect::UnsubscribeActivity]);
        assert_eq!(engine.status(), Status::Idle);
    }

    #[test]
    fn tick_finishes_exactly_once() {
        let (mut engine, clock, _) = running_engine();
        assert!(engine.tick().is_none());

        clock.advance(Duration::hours(8));
        let t = engine.tick().unwrap();
        assert_eq!(
            t.effects,
            vec![
                Effect::StopTicker,
                Effect::ReleaseWakeLock,
                Effect::NotifySessionFinished,
                Effect::PlayCompletionSound,
            ]
        );
        assert_eq!(engine.status(), Status::Finished);
        assert!(engine.state().start_time.is_some());

        clock.advance(Duration::seconds(1));
        assert!(engine.tick().is_none());
    }

    #[test]
    fn reset_from_every_state_yields_idle_shape() {
        let kv = MemoryStore::new();
        let (mut engine, clock) = engine_with(&kv);

        // idle
        engine.reset();
        assert_eq!(engine.state(), &TimerState::idle());

        // listening
        engine.start_listening().unwrap();
        let t = engine.reset();
        assert_eq!(t.effects, vec![Effect::UnsubscribeActivity]);
        assert_eq!(engine.state(), &TimerState::idle());

        // running
        engine.start_listening().unwrap();
        engine.start().unwrap();
        let t = engine.reset();
        assert!(t.effects.contains(&Effect::ReleaseWakeLock));
        assert!(t.effects.contains(&Effect::StopTicker));
        assert_eq!(engine.state(), &TimerState::idle());

        // finished
        engine.start_listening().unwrap();
        engine.start().unwrap();
        clock.advance(Duration::hours(9));
        engine.tick().unwrap();
        engine.reset();
        assert_eq!(engine.state(), &TimerState::idle());

        // idempotent
        let t = engine.reset();
        assert!(t.effects.is_empty());
        assert_eq!(engine.state(), &TimerState::idle());
    }

    #[test]
    fn reconfigure_while_running_keeps_start_time() {
        let (mut engine, clock, _) = running_engine();
        let start = engine.state().start_time;
        clock.advance(Duration::minutes(30));

        let t = engine.reconfigure(2 * HOUR_MS as i64).unwrap();
        assert_eq!(t.effects, vec![Effect::RefreshTip]);
        assert_eq!(engine.state().start_time, start);
        assert_eq!(
            engine.state().end_time.unwrap() - start.unwrap(),
            Duration::hours(2)
        );
        assert_eq!(engine.remaining_ms(), 90 * 60 * 1000);
    }

    #[test]
    fn reconfigure_rejects_non_positive_values() {
        let (mut engine, _, kv) = running_engine();
        let before = engine.state().clone();
        let stored = kv.get("total_duration").unwrap();

        assert!(engine.reconfigure(0).is_none());
        assert!(engine.reconfigure(-5).is_none());

        assert_eq!(engine.state(), &before);
        assert_eq!(engine.total_duration_ms(), 8 * HOUR_MS);
        assert_eq!(kv.get("total_duration").unwrap(), stored);
    }

    #[test]
    fn reconfigure_rejects_durations_past_the_maximum() {
        let (mut engine, _, kv) = running_engine();
        let before = engine.state().clone();
        let stored = kv.get("total_duration").unwrap();

        assert!(engine.reconfigure(i64::MAX).is_none());
        assert!(engine.reconfigure(MAX_TOTAL_DURATION_MS as i64 + 1).is_none());
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.total_duration_ms(), 8 * HOUR_MS);
        assert_eq!(kv.get("total_duration").unwrap(), stored);

        // Rejected while idle too, so the next session can still start.
        engine.reset();
        assert!(engine.reconfigure(10_000_000_000_000_000).is_none());
        assert_eq!(kv.get("total_duration").unwrap(), stored);
        engine.start_listening().unwrap();
        assert!(engine.start().is_some());

        let t = engine.reconfigure(MAX_TOTAL_DURATION_MS as i64).unwrap();
        assert!(matches!(
            t.events[0],
            Event::SessionReconfigured { end_time: Some(_), .. }
        ));
    }

    #[test]
    fn reconfigure_same_value_does_not_refresh_tip() {
        let kv = MemoryStore::new();
        let (mut engine, _) = engine_with(&kv);
        let t = engine.reconfigure(8 * HOUR_MS as i64).unwrap();
        assert!(t.effects.is_empty());
    }

    #[test]
    fn every_transition_writes_through() {
        let (mut engine, _, kv) = running_engine();
        let stored: TimerState =
            serde_json::from_str(&kv.get("timer_state").unwrap().unwrap()).unwrap();
        assert_eq!(&stored, engine.state());

        engine.reset();
        let stored: TimerState =
            serde_json::from_str(&kv.get("timer_state").unwrap().unwrap()).unwrap();
        assert_eq!(stored, TimerState::idle());
    }

    #[test]
    fn restore_recovers_corrupt_and_inconsistent_state() {
        let kv = MemoryStore::new();
        kv.set("timer_state", "garbage").unwrap();
        let (engine, _) = engine_with(&kv);
        assert_eq!(engine.state(), &TimerState::idle());
        assert_eq!(
            kv.get("timer_state").unwrap().as_deref(),
            Some(r#"{"startTime":null,"endTime":null,"status":"idle"}"#)
        );

        let kv = MemoryStore::new();
        kv.set("timer_state", r#"{"startTime":null,"endTime":null,"status":"running"}"#)
            .unwrap();
        let (engine, _) = engine_with(&kv);
        assert_eq!(engine.status(), Status::Idle);
    }

    #[test]
    fn restored_expired_session_finishes_on_first_tick() {
        let kv = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stored = TimerState::running(start, HOUR_MS).unwrap();
        kv.set("timer_state", &serde_json::to_string(&stored).unwrap())
            .unwrap();

        let (mut engine, _) = engine_with(&kv);
        assert_eq!(
            engine.resume_effects(),
            vec![Effect::StartTicker, Effect::AcquireWakeLock]
        );
        engine.tick().unwrap();
        assert_eq!(engine.status(), Status::Finished);
    }

    #[test]
    fn auto_listen_respects_flag() {
        let kv = MemoryStore::new();
        kv.set("auto_start", "false").unwrap();
        let (mut engine, _) = engine_with(&kv);
        assert!(engine.auto_listen().is_none());

        engine.set_auto_start(true);
        let t = engine.auto_listen().unwrap();
        assert!(matches!(t.events[0], Event::ListeningStarted { auto: true, .. }));
        assert_eq!(engine.status(), Status::Listening);
        assert!(engine.auto_listen().is_none());
    }
}
