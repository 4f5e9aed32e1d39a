//! Session-start and session-end alerts.
//!
//! Granting permission is a decision made outside this system; the
//! dispatcher only asks for it and otherwise stays silent when it is absent.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
#[cfg(all(unix, not(target_os = "macos")))]
use notify_rust::{Hint, Urgency};
use notify_rust::Notification;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    Prompt,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    /// Replaces an earlier notification with the same tag where supported.
    pub tag: Option<String>,
    pub urgent: bool,
}

pub trait Notifier: Send {
    fn query_permission(&self) -> Permission;
    /// Ask for the capability. Returns `Granted` or `Denied`.
    fn request_permission(&mut self) -> Permission;
    fn show(&self, title: &str, body: &str, options: &NotificationOptions)
        -> Result<(), NotifyError>;
}

pub struct NotificationDispatcher {
    notifier: Box<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn permission(&self) -> Permission {
        self.notifier.query_permission()
    }

    /// Only prompts when no decision has been made yet.
    pub fn request_permission(&mut self) -> Permission {
        match self.notifier.query_permission() {
            Permission::Prompt => {
                let decision = self.notifier.request_permission();
                info!(?decision, "notification permission requested");
                decision
            }
            decided => decided,
        }
    }

    pub fn session_started(&self, end_time: Option<DateTime<Utc>>, focus_task: &str) {
        let mut body = match end_time {
            Some(end) => format!(
                "Session running until {}.",
                end.with_timezone(&Local).format("%H:%M")
            ),
            None => "Session running.".to_string(),
        };
        if !focus_task.is_empty() {
            body.push_str(&format!(" Focus: {focus_task}"));
        }
        self.dispatch("Session started", &body, "session-start", false);
    }

    pub fn session_finished(&self, total_duration_ms: u64, focus_task: &str) {
        let hours = total_duration_ms as f64 / 3_600_000.0;
        let mut body = format!("Your {hours:.1}h session is complete. Time to wrap up.");
        if !focus_task.is_empty() {
            body.push_str(&format!(" Focus was: {focus_task}"));
        }
        self.dispatch("Session finished", &body, "session-end", true);
    }

    fn dispatch(&self, title: &str, body: &str, tag: &str, urgent: bool) {
        if self.notifier.query_permission() != Permission::Granted {
            debug!(title, "notification skipped, permission not granted");
            return;
        }
        let options = NotificationOptions {
            tag: Some(tag.to_string()),
            urgent,
        };
        if let Err(e) = self.notifier.show(title, body, &options) {
            warn!(error = %e, "notification not delivered");
        }
    }
}

/// Desktop notifications through the platform notification service.
/// Permission is granted when notifications are enabled and a notification
/// server answers.
#[derive(Debug)]
pub struct DesktopNotifier {
    enabled: bool,
    decision: Option<Permission>,
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            decision: None,
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn server_available() -> bool {
        match notify_rust::get_server_information() {
            Ok(info) => {
                debug!(server = %info.name, "notification server found");
                true
            }
            Err(e) => {
                debug!(error = %e, "no notification server");
                false
            }
        }
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    fn server_available() -> bool {
        true
    }

    fn notification(title: &str, body: &str, options: &NotificationOptions) -> Notification {
        let mut notification = Notification::new();
        notification.summary(title).body(body).appname("dayshift");
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            if options.urgent {
                notification.urgency(Urgency::Critical);
            }
            if let Some(tag) = &options.tag {
                notification.hint(Hint::Custom(STACK_TAG_HINT.to_string(), tag.clone()));
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        let _ = options;
        notification
    }
}

/// Notification daemons that honour it replace the previous alert carrying
/// the same tag.
#[cfg(all(unix, not(target_os = "macos")))]
const STACK_TAG_HINT: &str = "x-dunst-stack-tag";

impl Notifier for DesktopNotifier {
    fn query_permission(&self) -> Permission {
        if !self.enabled {
            return Permission::Denied;
        }
        self.decision.unwrap_or(Permission::Prompt)
    }

    fn request_permission(&mut self) -> Permission {
        let decision = if self.enabled && Self::server_available() {
            Permission::Granted
        } else {
            Permission::Denied
        };
        self.decision = Some(decision);
        decision
    }

    fn show(
        &self,
        title: &str,
        body: &str,
        options: &NotificationOptions,
    ) -> Result<(), NotifyError> {
        Self::notification(title, body, options)
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::ShowFailed(e.to_string()))
    }
}

/// Notifier for headless runs: every alert becomes a log line.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn query_permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn show(
        &self,
        title: &str,
        body: &str,
        _options: &NotificationOptions,
    ) -> Result<(), NotifyError> {
        info!(title, body, "notification");
        Ok(())
    }
}

/// Completion sound.
pub trait Chime: Send {
    fn play(&mut self);
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&mut self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

#[derive(Debug, Default)]
pub struct SilentChime;

impl Chime for SilentChime {
    fn play(&mut self) {}
}
