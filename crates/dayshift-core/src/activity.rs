//! First-input detection while the timer is listening.
//!
//! The detector holds the subscriptions to raw input classes. It is armed on
//! entry to `Listening` and disarmed on every exit; the first event it sees
//! disarms it before anything else happens, so a burst of input delivered in
//! the same turn starts the session only once.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;

/// Raw input classes that count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    PointerMove,
    PointerDown,
    KeyDown,
    TouchStart,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::PointerMove,
        ActivityKind::PointerDown,
        ActivityKind::KeyDown,
        ActivityKind::TouchStart,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::PointerMove => "pointer-move",
            ActivityKind::PointerDown => "pointer-down",
            ActivityKind::KeyDown => "key-down",
            ActivityKind::TouchStart => "touch-start",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownActivity(s.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct ActivityDetector {
    subscribed: BTreeSet<ActivityKind>,
}

impl ActivityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every activity class.
    pub fn subscribe(&mut self) {
        if self.subscribed.is_empty() {
            debug!("subscribing to activity events");
        }
        self.subscribed.extend(ActivityKind::ALL);
    }

    /// Drop all subscriptions. Safe to call when nothing is subscribed.
    pub fn unsubscribe(&mut self) {
        if !self.subscribed.is_empty() {
            debug!("unsubscribing from activity events");
        }
        self.subscribed.clear();
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscribed.is_empty()
    }

    /// Feed one raw input event. Returns `true` only for the first event
    /// after `subscribe()`; the detector is already unsubscribed by the time
    /// this returns.
    pub fn on_event(&mut self, kind: ActivityKind) -> bool {
        if !self.subscribed.contains(&kind) {
            return false;
        }
        self.unsubscribe();
        debug!(%kind, "first activity observed");
        true
    }
}
