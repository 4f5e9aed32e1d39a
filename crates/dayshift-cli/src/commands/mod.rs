pub mod auth;
pub mod config;
pub mod run;
pub mod session;

use std::error::Error;
use std::sync::Arc;

use dayshift_core::notify::{DesktopNotifier, TerminalBell};
use dayshift_core::wake_lock::{InhibitorWakeLock, UnavailableWakeLock, WakeLock};
use dayshift_core::{
    Backends, Config, ControllerOptions, Database, Event, SessionController, SessionStore,
    SystemClock, TimerEngine, TipProvider,
};

pub type CommandResult = Result<(), Box<dyn Error>>;

/// How long the process stays alive, which decides the capabilities worth
/// holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Handles one command and exits.
    OneShot,
    /// Runs the event loop until told to quit.
    Foreground,
}

/// Restore the persisted session and bring it up to date.
///
/// Returns the controller together with whatever startup produced (a day
/// rollover, a session finished while nothing was running, auto-start).
/// Fails on a config that cannot drive the loop or an unusable store.
pub fn open_controller(
    config: &Config,
    lifetime: Lifetime,
) -> dayshift_core::error::Result<(SessionController, Vec<Event>)> {
    config.validate()?;
    let db = Database::open()?;
    let engine = TimerEngine::restore(SessionStore::new(db), Arc::new(SystemClock));

    // A wake lock taken by a one-shot command would die with the process.
    let wake_lock: Box<dyn WakeLock> = match lifetime {
        Lifetime::Foreground if config.wake_lock.enabled => Box::new(InhibitorWakeLock::new()),
        Lifetime::Foreground => Box::new(UnavailableWakeLock::new("disabled in config")),
        Lifetime::OneShot => Box::new(UnavailableWakeLock::new("one-shot command")),
    };
    let tips = match lifetime {
        Lifetime::Foreground if config.tips.enabled => Some(TipProvider::from_config(&config.tips)),
        _ => None,
    };

    let backends = Backends {
        wake_lock,
        notifier: Box::new(DesktopNotifier::new(config.notifications.enabled)),
        chime: Box::new(TerminalBell),
        tips,
    };
    let mut controller =
        SessionController::new(engine, backends, ControllerOptions::from_config(config));
    let events = controller.startup();
    Ok((controller, events))
}

/// One JSON object per line on stdout.
pub fn print_events(events: &[Event]) -> Result<(), serde_json::Error> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayshift_core::{ConfigError, CoreError};

    #[test]
    fn invalid_config_is_refused_before_the_store_opens() {
        let mut config = Config::default();
        config.timer.tick_interval_secs = 0;
        assert!(matches!(
            open_controller(&config, Lifetime::OneShot),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
