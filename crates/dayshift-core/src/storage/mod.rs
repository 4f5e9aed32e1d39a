mod config;
pub mod credentials;
pub mod database;
pub mod session;

pub use config::{Config, LogConfig, NotificationsConfig, TimerConfig, TipsConfig, WakeLockConfig};
pub use database::Database;
pub use session::SessionStore;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

/// String key-value persistence.
///
/// Every write is synchronous: callers rely on a returned `Ok` meaning the
/// value survives an abrupt process exit.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store used by tests and headless embedding.
///
/// Clones share the same map, so a test can hand one clone to the engine
/// and inspect what was written through the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.lock().map_err(|_| StoreError::Locked)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().map_err(|_| StoreError::Locked)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Returns the data directory, creating it if needed.
///
/// `DAYSHIFT_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/dayshift/`, or `~/.config/dayshift-dev/` when
/// `DAYSHIFT_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("DAYSHIFT_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("DAYSHIFT_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("dayshift-dev")
            } else {
                base_dir.join("dayshift")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StoreError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
