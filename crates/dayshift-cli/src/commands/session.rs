use clap::{Subcommand, ValueEnum};
use dayshift_core::{hours_to_ms, validate_duration_ms, ActivityKind, Command, Config, Event};
use dayshift_core::error::Result as CoreResult;
use dayshift_core::{TipProvider, ValidationError};
use serde_json::json;

use super::{open_controller, print_events, CommandResult, Lifetime};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Tick once and print the session snapshot as JSON
    Status,
    /// Wait for the first user activity to start the session
    Listen,
    /// Stop waiting for activity
    Cancel,
    /// Abandon the session and return to idle
    Reset,
    /// Deliver one user-activity event
    Activity {
        /// pointer-move, pointer-down, key-down or touch-start
        #[arg(default_value = "key-down")]
        kind: ActivityKind,
    },
    /// Set the total session length
    Duration {
        /// Length in hours (e.g. 7.5)
        #[arg(allow_negative_numbers = true, required_unless_present = "ms")]
        hours: Option<f64>,
        /// Length in milliseconds instead of hours
        #[arg(long, allow_negative_numbers = true, conflicts_with = "hours")]
        ms: Option<i64>,
    },
    /// Turn automatic listening on or off
    AutoStart {
        #[arg(value_enum)]
        mode: Toggle,
    },
    /// Set the focus task, or print it when no text is given
    Task {
        text: Option<String>,
    },
    /// Fetch a tip for the time left in the session
    Tip,
    /// Query and request the notification capability
    NotifyPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

fn duration_ms(hours: Option<f64>, ms: Option<i64>) -> CoreResult<i64> {
    let ms = match (ms, hours) {
        (Some(ms), _) => validate_duration_ms(ms)?,
        (None, Some(hours)) => hours_to_ms(hours)?,
        (None, None) => return Err(ValidationError::NonPositiveDuration(0).into()),
    };
    Ok(ms)
}

pub fn run(action: SessionAction, config: &Config) -> CommandResult {
    // Validate before touching the store so a bad value changes nothing.
    let reconfigure = match &action {
        SessionAction::Duration { hours, ms } => Some(duration_ms(*hours, *ms)?),
        _ => None,
    };

    let (mut controller, mut events) = open_controller(config, Lifetime::OneShot)?;

    match action {
        SessionAction::Status => {
            events.extend(controller.tick());
            events.push(controller.snapshot());
        }
        SessionAction::Listen => events.extend(controller.handle(Command::Listen)),
        SessionAction::Cancel => events.extend(controller.handle(Command::Cancel)),
        SessionAction::Reset => events.extend(controller.handle(Command::Reset)),
        SessionAction::Activity { kind } => {
            events.extend(controller.handle(Command::Activity(kind)));
        }
        SessionAction::Duration { .. } => {
            if let Some(ms) = reconfigure {
                events.extend(controller.handle(Command::Reconfigure(ms)));
            }
        }
        SessionAction::AutoStart { mode } => {
            events.extend(controller.handle(Command::SetAutoStart(mode == Toggle::On)));
            events.push(controller.snapshot());
        }
        SessionAction::Task { text: Some(text) } => {
            controller.handle(Command::SetFocusTask(text));
            events.push(controller.snapshot());
        }
        SessionAction::Task { text: None } => {
            print_events(&events)?;
            println!("{}", controller.engine().store().focus_task());
            return Ok(());
        }
        SessionAction::Tip => {
            let provider = TipProvider::from_config(&config.tips);
            let hours = controller.tip_hours();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let tip = runtime.block_on(provider.tip(hours));
            events.push(Event::TipUpdated {
                tip,
                at: controller.engine().clock().now(),
            });
        }
        SessionAction::NotifyPermission => {
            let permission = controller.request_notification_permission();
            print_events(&events)?;
            println!("{}", json!({ "permission": permission }));
            return Ok(());
        }
    }

    print_events(&events)?;
    Ok(())
}
