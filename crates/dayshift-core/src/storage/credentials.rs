//! Thin wrapper around the OS keyring for the tip service credential.

const SERVICE: &str = "dayshift";

/// Keyring entry holding the tip service API key.
pub const TIPS_API_KEY: &str = "tips_api_key";

/// Environment variable that takes precedence over the keyring.
pub const TIPS_API_KEY_ENV: &str = "DAYSHIFT_TIPS_API_KEY";

pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.get_password() {
        Ok(pw) => Ok(Some(pw)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    entry.set_password(value)
}

pub fn delete(key: &str) -> Result<(), keyring::Error> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Tip API key from the environment, then the keyring. Empty values count
/// as absent.
pub fn tips_api_key() -> Option<String> {
    let from_env = std::env::var(TIPS_API_KEY_ENV).ok();
    let key = match from_env {
        Some(key) => Some(key),
        None => get(TIPS_API_KEY).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "keyring lookup for tip credential failed");
            None
        }),
    };
    key.filter(|k| !k.trim().is_empty())
}
