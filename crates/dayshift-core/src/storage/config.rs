//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Tick and day-check intervals
//! - Notification and completion-sound preferences
//! - Wake-lock behaviour
//! - Tip service endpoint
//! - Log level
//!
//! Session values (duration, auto-start, focus task) are not here; they live
//! in the key-value store next to the timer state.
//!
//! Configuration is stored at `~/.config/dayshift/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

/// Timer loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_day_check_interval_secs")]
    pub day_check_interval_secs: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Skip the completion chime when a session finishes.
    #[serde(default)]
    pub sound_muted: bool,
}

/// Wake-lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeLockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Tip service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// OpenAI-compatible chat completions URL.
    #[serde(default = "default_tips_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_tips_model")]
    pub model: String,
    #[serde(default = "default_tips_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dayshift/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub wake_lock: WakeLockConfig,
    #[serde(default)]
    pub tips: TipsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// Default functions
fn default_tick_interval_secs() -> u64 {
    1
}
fn default_day_check_interval_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_tips_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_tips_model() -> String {
    "gpt-4o-mini".into()
}
fn default_tips_timeout_secs() -> u64 {
    15
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            day_check_interval_secs: default_day_check_interval_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound_muted: false,
        }
    }
}

impl Default for WakeLockConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TipsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_tips_endpoint(),
            model: default_tips_model(),
            timeout_secs: default_tips_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn day_check_interval(&self) -> Duration {
        Duration::from_secs(self.day_check_interval_secs.max(1))
    }
}

/// Keys whose value must be at least one second.
const NON_ZERO_KEYS: [&str; 3] = [
    "timer.tick_interval_secs",
    "timer.day_check_interval_secs",
    "tips.timeout_secs",
];

impl Config {
    /// Reject values that parse but cannot drive the session.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            self.timer.tick_interval_secs,
            self.timer.day_check_interval_secs,
            self.tips.timeout_secs,
        ];
        for (key, value) in NON_ZERO_KEYS.iter().zip(values) {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: (*key).to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "log.level".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Typed value of a leaf key. Sections are not values.
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::Object(_) => None,
            leaf => Some(leaf.clone()),
        }
    }

    /// Every leaf as `(dot.path, value)`, sorted by key.
    pub fn entries(&self) -> Vec<(String, serde_json::Value)> {
        let mut out = Vec::new();
        if let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) {
            for (section, fields) in sections {
                let serde_json::Value::Object(fields) = fields else {
                    continue;
                };
                for (field, value) in fields {
                    out.push((format!("{section}.{field}"), value));
                }
            }
        }
        out
    }

    /// Set a config value by key, in memory only. Returns error if the key
    /// is unknown or the value does not fit its type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.day_check_interval_secs, 60);
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.tips.timeout_secs, 15);
    }

    #[test]
    fn partial_file_takes_defaults_for_missing_keys() {
        let parsed: Config = toml::from_str("[notifications]\nsound_muted = true\n").unwrap();
        assert!(parsed.notifications.sound_muted);
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.timer.tick_interval_secs, 1);
        assert_eq!(parsed.log.level, "info");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("wake_lock.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("timer.tick_interval_secs").as_deref(), Some("1"));
        assert_eq!(cfg.get("log.level").as_deref(), Some("info"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("notifications.sound_muted", "true").unwrap();
        cfg.set("timer.day_check_interval_secs", "120").unwrap();
        cfg.set("tips.model", "local-model").unwrap();
        assert!(cfg.notifications.sound_muted);
        assert_eq!(cfg.timer.day_check_interval_secs, 120);
        assert_eq!(cfg.tips.model, "local-model");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("timer", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("wake_lock.enabled", "not_a_bool").is_err());
        assert!(cfg.set("timer.tick_interval_secs", "-1").is_err());
        assert!(cfg.wake_lock.enabled);
    }

    #[test]
    fn set_rejects_zero_intervals() {
        let mut cfg = Config::default();
        for key in NON_ZERO_KEYS {
            match cfg.set(key, "0") {
                Err(ConfigError::InvalidValue { key: bad, .. }) => assert_eq!(bad, key),
                other => panic!("{key}=0 accepted: {other:?}"),
            }
        }
        assert_eq!(cfg.timer.tick_interval_secs, 1);
        assert_eq!(cfg.timer.day_check_interval_secs, 60);
        assert_eq!(cfg.tips.timeout_secs, 15);
        assert!(cfg.set("log.level", " ").is_err());
    }

    #[test]
    fn load_from_rejects_zero_interval_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\ntick_interval_secs = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn entries_list_every_leaf() {
        let cfg = Config::default();
        let entries = cfg.entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "timer.tick_interval_secs" && v == &serde_json::json!(1)));
        assert!(entries
            .iter()
            .any(|(k, v)| k == "log.level" && v == &serde_json::json!("info")));
        assert!(entries.iter().all(|(k, _)| k.contains('.')));
        assert_eq!(cfg.value("tips.enabled"), Some(serde_json::json!(true)));
        assert_eq!(cfg.value("tips"), None);
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(cfg.tips.enabled);

        let mut cfg = cfg;
        cfg.set("tips.enabled", "false").unwrap();
        cfg.save_to(&path).unwrap();
        assert!(!Config::load_from(&path).unwrap().tips.enabled);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
