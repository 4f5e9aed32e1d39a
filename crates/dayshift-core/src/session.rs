//! Session runtime: owns the engine and applies its effects.
//!
//! All mutation happens synchronously inside one handler call. The async
//! [`SessionController::run`] loop only decides *which* handler runs next:
//! a command, a running tick, a day check, or a finished tip lookup. It
//! never overlaps two of them.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::activity::{ActivityDetector, ActivityKind};
use crate::events::Event;
use crate::notify::{Chime, NotificationDispatcher, Notifier, Permission};
use crate::rollover::DayRolloverMonitor;
use crate::storage::Config;
use crate::timer::{Effect, Status, TimerEngine, Transition};
use crate::tips::{ms_to_hours, Tip, TipProvider};
use crate::wake_lock::{WakeLock, WakeLockCoordinator, WakeLockStatus};

/// User and host commands accepted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Listen,
    Cancel,
    Reset,
    Activity(ActivityKind),
    Reconfigure(i64),
    SetAutoStart(bool),
    SetFocusTask(String),
    /// Host window became visible (`true`) or hidden.
    Visibility(bool),
    Quit,
}

/// Capability backends the controller drives.
pub struct Backends {
    pub wake_lock: Box<dyn WakeLock>,
    pub notifier: Box<dyn Notifier>,
    pub chime: Box<dyn Chime>,
    pub tips: Option<TipProvider>,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub tick_interval: Duration,
    pub day_check_interval: Duration,
    pub sound_muted: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            day_check_interval: crate::rollover::DEFAULT_CHECK_INTERVAL,
            sound_muted: false,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.timer.tick_interval(),
            day_check_interval: config.timer.day_check_interval(),
            sound_muted: config.notifications.sound_muted,
        }
    }
}

pub struct SessionController {
    engine: TimerEngine,
    detector: ActivityDetector,
    rollover: DayRolloverMonitor,
    wake_lock: WakeLockCoordinator,
    notifications: NotificationDispatcher,
    chime: Box<dyn Chime>,
    tips: Option<Arc<TipProvider>>,
    options: ControllerOptions,
    ticker_armed: bool,
    tip_stale: bool,
}

impl SessionController {
    pub fn new(engine: TimerEngine, backends: Backends, options: ControllerOptions) -> Self {
        Self {
            engine,
            detector: ActivityDetector::new(),
            rollover: DayRolloverMonitor::new(options.day_check_interval),
            wake_lock: WakeLockCoordinator::new(backends.wake_lock),
            notifications: NotificationDispatcher::new(backends.notifier),
            chime: backends.chime,
            tips: backends.tips.map(Arc::new),
            options,
            ticker_armed: false,
            tip_stale: true,
        }
    }

    /// Bring the restored state up to date before anything is exposed:
    /// day check, finish an expired session, re-arm subscriptions and
    /// timers, then apply auto-start.
    pub fn startup(&mut self) -> Vec<Event> {
        self.notifications.request_permission();

        let mut events = Vec::new();
        if let Some(t) = self.rollover.check(&mut self.engine) {
            events.extend(self.apply(t));
        }
        if let Some(t) = self.engine.tick() {
            events.extend(self.apply(t));
        }
        let resume = Transition {
            events: Vec::new(),
            effects: self.engine.resume_effects(),
        };
        events.extend(self.apply(resume));
        events.extend(self.auto_listen());
        events
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn status(&self) -> Status {
        self.engine.status()
    }

    pub fn is_listening_for_activity(&self) -> bool {
        self.detector.is_subscribed()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker_armed
    }

    pub fn wake_lock_status(&self) -> WakeLockStatus {
        self.wake_lock.status()
    }

    pub fn notification_permission(&self) -> Permission {
        self.notifications.permission()
    }

    pub fn request_notification_permission(&mut self) -> Permission {
        self.notifications.request_permission()
    }

    /// Hours the tip should be keyed on: what is left of a running session,
    /// otherwise the configured length.
    pub fn tip_hours(&self) -> f64 {
        match self.engine.status() {
            Status::Running => ms_to_hours(self.engine.remaining_ms()),
            _ => ms_to_hours(self.engine.total_duration_ms()),
        }
    }

    pub fn snapshot(&self) -> Event {
        let state = self.engine.state();
        let store = self.engine.store();
        Event::StateSnapshot {
            status: state.status,
            start_time: state.start_time,
            end_time: state.end_time,
            remaining_ms: self.engine.remaining_ms(),
            progress: self.engine.progress(),
            total_duration_ms: self.engine.total_duration_ms(),
            focus_task: store.focus_task(),
            auto_start: store.auto_start(),
            wake_lock_active: self.wake_lock.status() == WakeLockStatus::Active,
            at: self.engine.clock().now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn handle(&mut self, command: Command) -> Vec<Event> {
        debug!(?command, "handling command");
        match command {
            Command::Listen => {
                let t = self.engine.start_listening();
                self.apply_opt(t)
            }
            // Auto-start is not re-applied here, otherwise cancel would
            // bounce straight back into listening.
            Command::Cancel => {
                let t = self.engine.cancel();
                self.apply_opt(t)
            }
            Command::Reset => self.reset(),
            Command::Activity(kind) => self.activity(kind),
            Command::Reconfigure(ms) => {
                let t = self.engine.reconfigure(ms);
                self.apply_opt(t)
            }
            Command::SetAutoStart(enabled) => {
                self.engine.set_auto_start(enabled);
                self.auto_listen()
            }
            Command::SetFocusTask(task) => {
                self.engine.set_focus_task(&task);
                Vec::new()
            }
            Command::Visibility(visible) => {
                self.wake_lock.visibility_changed(visible);
                Vec::new()
            }
            Command::Quit => Vec::new(),
        }
    }

    /// Reset to idle, then let auto-start take over.
    pub fn reset(&mut self) -> Vec<Event> {
        let t = self.engine.reset();
        let mut events = self.apply(t);
        events.extend(self.auto_listen());
        events
    }

    pub fn activity(&mut self, kind: ActivityKind) -> Vec<Event> {
        if !self.detector.on_event(kind) {
            return Vec::new();
        }
        let t = self.engine.start();
        self.apply_opt(t)
    }

    /// One running tick.
    pub fn tick(&mut self) -> Vec<Event> {
        self.wake_lock.poll_external_release();
        let t = self.engine.tick();
        self.apply_opt(t)
    }

    /// One day-rollover check.
    pub fn check_day(&mut self) -> Vec<Event> {
        match self.rollover.check(&mut self.engine) {
            Some(t) => {
                let mut events = self.apply(t);
                events.extend(self.auto_listen());
                events
            }
            None => Vec::new(),
        }
    }

    /// Consume the pending tip refresh, if any.
    pub fn take_tip_request(&mut self) -> Option<f64> {
        if !std::mem::take(&mut self.tip_stale) {
            return None;
        }
        Some(self.tip_hours())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn auto_listen(&mut self) -> Vec<Event> {
        let t = self.engine.auto_listen();
        self.apply_opt(t)
    }

    fn apply_opt(&mut self, transition: Option<Transition>) -> Vec<Event> {
        transition.map(|t| self.apply(t)).unwrap_or_default()
    }

    fn apply(&mut self, transition: Transition) -> Vec<Event> {
        for effect in transition.effects {
            match effect {
                Effect::SubscribeActivity => self.detector.subscribe(),
                Effect::UnsubscribeActivity => self.detector.unsubscribe(),
                Effect::StartTicker => self.ticker_armed = true,
                Effect::StopTicker => self.ticker_armed = false,
                Effect::AcquireWakeLock => self.wake_lock.request(),
                Effect::ReleaseWakeLock => self.wake_lock.release(),
                Effect::NotifySessionStarted => {
                    let focus_task = self.engine.store().focus_task();
                    self.notifications
                        .session_started(self.engine.state().end_time, &focus_task);
                }
                Effect::NotifySessionFinished => {
                    let focus_task = self.engine.store().focus_task();
                    self.notifications
                        .session_finished(self.engine.total_duration_ms(), &focus_task);
                }
                Effect::PlayCompletionSound => {
                    if !self.options.sound_muted {
                        self.chime.play();
                    }
                }
                Effect::RefreshTip => self.tip_stale = true,
            }
        }
        transition.events
    }

    // ── Event loop ───────────────────────────────────────────────────

    /// Drive the session until `Quit` arrives or the command channel closes.
    ///
    /// Call [`SessionController::startup`] first.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
        events: mpsc::UnboundedSender<Event>,
    ) {
        let emit = |batch: Vec<Event>| {
            for event in batch {
                let _ = events.send(event);
            }
        };

        let mut day_check = interval(self.rollover.interval());
        day_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // startup() already performed the first check.
        day_check.tick().await;

        let mut ticker: Option<Interval> = None;
        let mut tip_task: Option<JoinHandle<Tip>> = None;

        loop {
            self.sync_ticker(&mut ticker);
            if let Some(hours) = self.take_tip_request() {
                if let Some(provider) = self.tips.clone() {
                    if let Some(stale) = tip_task.take() {
                        stale.abort();
                    }
                    tip_task = Some(tokio::spawn(async move { provider.tip(hours).await }));
                }
            }

            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Quit) => break,
                    Some(command) => emit(self.handle(command)),
                },
                _ = next_tick(&mut ticker) => emit(self.tick()),
                _ = day_check.tick() => emit(self.check_day()),
                joined = join_tip(&mut tip_task) => {
                    tip_task = None;
                    if let Ok(tip) = joined {
                        emit(vec![Event::TipUpdated { tip, at: self.engine.clock().now() }]);
                    }
                }
            }
        }

        if let Some(task) = tip_task {
            task.abort();
        }
        info!("session loop stopped");
    }

    /// The ticker lives only while the engine asks for it; leaving
    /// `Running` drops it before the loop can poll it again.
    fn sync_ticker(&self, ticker: &mut Option<Interval>) {
        match (self.ticker_armed, ticker.is_some()) {
            (true, false) => {
                let mut t = interval(self.options.tick_interval);
                t.set_missed_tick_behavior(MissedTickBehavior::Skip);
                *ticker = Some(t);
            }
            (false, true) => *ticker = None,
            _ => {}
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn join_tip(task: &mut Option<JoinHandle<Tip>>) -> Result<Tip, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => pending().await,
    }
}
