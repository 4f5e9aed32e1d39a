//! Screen wake lock held while a session is running.
//!
//! The coordinator keeps at most one handle. It remembers whether a lock is
//! *desired* separately from whether one is *held*, because platforms drop
//! the lock behind our back (backgrounding, inhibitor killed) and it must be
//! taken again when the host becomes visible.

use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WakeLockError;

/// Opaque token for an acquired lock.
#[derive(Debug, PartialEq, Eq)]
pub struct WakeLockHandle(pub u64);

pub trait WakeLock: Send {
    fn is_available(&self) -> bool;
    fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError>;
    fn release(&mut self, handle: WakeLockHandle);
    /// Whether the lock behind `handle` is still in force. Returning `false`
    /// is how a backend reports an external release.
    fn is_held(&mut self, handle: &WakeLockHandle) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeLockStatus {
    Active,
    Inactive,
}

pub struct WakeLockCoordinator {
    backend: Box<dyn WakeLock>,
    handle: Option<WakeLockHandle>,
    desired: bool,
}

impl WakeLockCoordinator {
    pub fn new(backend: Box<dyn WakeLock>) -> Self {
        Self {
            backend,
            handle: None,
            desired: false,
        }
    }

    pub fn status(&self) -> WakeLockStatus {
        if self.handle.is_some() {
            WakeLockStatus::Active
        } else {
            WakeLockStatus::Inactive
        }
    }

    pub fn is_desired(&self) -> bool {
        self.desired
    }

    /// Called on entry to `Running`.
    pub fn request(&mut self) {
        self.desired = true;
        self.try_acquire();
    }

    /// Called on every exit from `Running`.
    pub fn release(&mut self) {
        self.desired = false;
        if let Some(handle) = self.handle.take() {
            debug!("releasing wake lock");
            self.backend.release(handle);
        }
    }

    /// Forget a handle the platform has already dropped.
    pub fn poll_external_release(&mut self) {
        let dropped = match self.handle.as_ref() {
            Some(handle) => !self.backend.is_held(handle),
            None => false,
        };
        if dropped {
            info!("wake lock released externally");
            self.handle = None;
        }
    }

    /// Host visibility changed. Regaining visibility re-acquires a lock that
    /// is still wanted but no longer held.
    pub fn visibility_changed(&mut self, visible: bool) {
        self.poll_external_release();
        if visible && self.desired && self.handle.is_none() {
            debug!("re-acquiring wake lock after visibility change");
            self.try_acquire();
        }
    }

    fn try_acquire(&mut self) {
        if self.handle.is_some() {
            return;
        }
        if !self.backend.is_available() {
            debug!("wake lock not available on this platform");
            return;
        }
        match self.backend.acquire() {
            Ok(handle) => {
                info!("wake lock acquired");
                self.handle = Some(handle);
            }
            Err(e) => warn!(error = %e, "wake lock unavailable, continuing without it"),
        }
    }
}

/// Backend for platforms or configurations without a wake lock.
#[derive(Debug, Default)]
pub struct UnavailableWakeLock {
    reason: String,
}

impl UnavailableWakeLock {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl WakeLock for UnavailableWakeLock {
    fn is_available(&self) -> bool {
        false
    }

    fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError> {
        Err(WakeLockError::Unavailable(self.reason.clone()))
    }

    fn release(&mut self, _handle: WakeLockHandle) {}

    fn is_held(&mut self, _handle: &WakeLockHandle) -> bool {
        false
    }
}

/// Holds the display awake through a platform inhibitor process
/// (`systemd-inhibit` on Linux, `caffeinate` on macOS). The lock lasts as
/// long as the child lives.
#[derive(Debug, Default)]
pub struct InhibitorWakeLock {
    child: Option<Child>,
    next_id: u64,
}

impl InhibitorWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(target_os = "linux")]
    fn command() -> Option<Command> {
        let mut cmd = Command::new("systemd-inhibit");
        cmd.args([
            "--what=idle:sleep",
            "--who=dayshift",
            "--why=Work session running",
            "--mode=block",
            "sleep",
            "infinity",
        ]);
        Some(cmd)
    }

    #[cfg(target_os = "macos")]
    fn command() -> Option<Command> {
        let mut cmd = Command::new("caffeinate");
        cmd.args(["-d", "-i"]);
        Some(cmd)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn command() -> Option<Command> {
        None
    }
}

impl WakeLock for InhibitorWakeLock {
    fn is_available(&self) -> bool {
        Self::command().is_some()
    }

    fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError> {
        let mut cmd = Self::command()
            .ok_or_else(|| WakeLockError::Unavailable("unsupported platform".into()))?;
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| WakeLockError::AcquireFailed(e.to_string()))?;
        if let Some(mut previous) = self.child.replace(child) {
            let _ = previous.kill();
            let _ = previous.wait();
        }
        self.next_id += 1;
        Ok(WakeLockHandle(self.next_id))
    }

    fn release(&mut self, handle: WakeLockHandle) {
        if handle.0 != self.next_id {
            return;
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn is_held(&mut self, handle: &WakeLockHandle) -> bool {
        if handle.0 != self.next_id {
            return false;
        }
        let exit = self.child.as_mut().map(Child::try_wait);
        match exit {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                self.child = None;
                false
            }
            None => false,
        }
    }
}

impl Drop for InhibitorWakeLock {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
