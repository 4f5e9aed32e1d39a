use clap::Subcommand;
use dayshift_core::Config;
use serde_json::{json, Value};

use super::CommandResult;

/// Preferences in `config.toml`. Every reply is one JSON object per line.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value
    Get {
        /// Dot-separated key, e.g. "timer.tick_interval_secs"
        key: String,
    },
    /// Change one value and save
    Set {
        key: String,
        value: String,
    },
    /// Print every key with its value
    List,
    /// Overwrite the file with defaults
    Reset,
}

fn entry(key: &str, value: Value) -> Value {
    json!({ "key": key, "value": value })
}

pub fn run(action: ConfigAction) -> CommandResult {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config
                .value(&key)
                .ok_or_else(|| format!("unknown configuration key: {key}"))?;
            println!("{}", entry(&key, value));
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::info!(%key, "configuration updated");
            println!("{}", entry(&key, config.value(&key).unwrap_or(Value::Null)));
        }
        ConfigAction::List => {
            for (key, value) in Config::load()?.entries() {
                println!("{}", entry(&key, value));
            }
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            for (key, value) in config.entries() {
                println!("{}", entry(&key, value));
            }
        }
    }
    Ok(())
}
