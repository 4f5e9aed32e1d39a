use clap::Subcommand;
use dayshift_core::storage::credentials;

use super::CommandResult;

/// Credentials for the tip service.
#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the tip service API key in the OS keyring
    Login {
        /// API key
        #[arg(long)]
        token: String,
    },
    /// Remove the stored API key
    Logout,
    /// Report where the API key comes from, if anywhere
    Status,
}

pub fn run(action: AuthAction) -> CommandResult {
    match action {
        AuthAction::Login { token } => {
            if token.trim().is_empty() {
                return Err("API key must not be empty".into());
            }
            credentials::set(credentials::TIPS_API_KEY, token.trim())?;
            println!("tip service key stored");
        }
        AuthAction::Logout => {
            credentials::delete(credentials::TIPS_API_KEY)?;
            println!("tip service key removed");
        }
        AuthAction::Status => {
            let from_env = std::env::var(credentials::TIPS_API_KEY_ENV)
                .is_ok_and(|key| !key.trim().is_empty());
            let source = if from_env {
                credentials::TIPS_API_KEY_ENV
            } else if credentials::get(credentials::TIPS_API_KEY)?.is_some() {
                "keyring"
            } else {
                "none"
            };
            println!("{source}");
        }
    }
    Ok(())
}
