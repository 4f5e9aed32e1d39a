//! Contextual tip lookup.
//!
//! Asks an OpenAI-compatible chat-completions endpoint for a short
//! `{title, advice}` pair keyed on the remaining session time. Callers never
//! see a failure: any problem resolves to the fixed fallback tip.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::TipError;
use crate::storage::{credentials, TipsConfig};

pub const FALLBACK_TITLE: &str = "Stay Focused";
pub const FALLBACK_ADVICE: &str =
    "Remember to take short breaks and stay hydrated throughout your journey.";

/// Length limits requested from the tip service. Replies are not truncated.
pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_ADVICE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub title: String,
    pub advice: String,
}

impl Tip {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            advice: FALLBACK_ADVICE.to_string(),
        }
    }
}

/// Outcome of one lookup, resolved to a [`Tip`] at a single call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipLookup {
    Found(Tip),
    UseFallback,
}

impl TipLookup {
    pub fn resolve(self) -> Tip {
        match self {
            TipLookup::Found(tip) => tip,
            TipLookup::UseFallback => Tip::fallback(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TipProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl TipProvider {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }

    /// Build from config, reading the credential from the environment or
    /// the OS keyring. A disabled provider has no credential.
    pub fn from_config(config: &TipsConfig) -> Self {
        let api_key = if config.enabled {
            credentials::tips_api_key()
        } else {
            None
        };
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Tip for the given remaining hours. Never fails.
    pub async fn tip(&self, remaining_hours: f64) -> Tip {
        self.lookup(remaining_hours).await.resolve()
    }

    pub async fn lookup(&self, remaining_hours: f64) -> TipLookup {
        match self.fetch(remaining_hours).await {
            Ok(tip) => TipLookup::Found(tip),
            Err(e) => {
                debug!(error = %e, "tip lookup failed, using fallback");
                TipLookup::UseFallback
            }
        }
    }

    async fn fetch(&self, remaining_hours: f64) -> Result<Tip, TipError> {
        let api_key = self.api_key.as_deref().ok_or(TipError::MissingCredential)?;

        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "You are a concise productivity coach. Reply with a JSON object \
                         {{\"title\": string, \"advice\": string}}. The title must be at most \
                         {MAX_TITLE_CHARS} characters and the advice at most \
                         {MAX_ADVICE_CHARS} characters."
                    ),
                },
                {
                    "role": "user",
                    "content": format!(
                        "I have {remaining_hours:.1} hours left in my work session. \
                         Give me one tip for making the most of it."
                    ),
                },
            ],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TipError::Status(resp.status().as_u16()));
        }

        let payload: serde_json::Value = resp.json().await?;
        parse_completion(&payload)
    }
}

fn parse_completion(payload: &serde_json::Value) -> Result<Tip, TipError> {
    let content = payload["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| TipError::Malformed("missing choices[0].message.content".into()))?;
    let tip: Tip =
        serde_json::from_str(content.trim()).map_err(|e| TipError::Malformed(e.to_string()))?;
    if tip.title.trim().is_empty() || tip.advice.trim().is_empty() {
        return Err(TipError::Malformed("empty title or advice".into()));
    }
    Ok(tip)
}

/// Hours as the tip service expects them.
pub fn ms_to_hours(ms: u64) -> f64 {
    ms as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: &str) -> String {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
            .to_string()
    }

    fn provider(url: &str, key: Option<&str>) -> TipProvider {
        TipProvider::new(
            format!("{url}/v1/chat/completions"),
            "test-model",
            key.map(str::to_string),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn returns_service_tip_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(
                r#"{"title":"Final stretch","advice":"Close open loops before you stop."}"#,
            ))
            .create_async()
            .await;

        let tip = provider(&server.url(), Some("secret")).tip(1.5).await;
        assert_eq!(tip.title, "Final stretch");
        assert_eq!(tip.advice, "Close open loops before you stop.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_yields_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let p = provider(&server.url(), Some("secret"));
        assert_eq!(p.lookup(2.0).await, TipLookup::UseFallback);
        assert_eq!(p.tip(2.0).await, Tip::fallback());
    }

    #[tokio::test]
    async fn malformed_payload_yields_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(completion("not json at all"))
            .create_async()
            .await;

        assert_eq!(
            provider(&server.url(), Some("secret")).tip(2.0).await,
            Tip::fallback()
        );
    }

    #[tokio::test]
    async fn network_failure_yields_fallback() {
        // Nothing listens on the discard port.
        let p = provider("http://127.0.0.1:9", Some("secret"));
        let tip = p.tip(3.0).await;
        assert_eq!(tip.title, "Stay Focused");
        assert_eq!(
            tip.advice,
            "Remember to take short breaks and stay hydrated throughout your journey."
        );
    }

    #[tokio::test]
    async fn missing_credential_skips_the_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        assert_eq!(provider(&server.url(), None).tip(1.0).await, Tip::fallback());
        mock.assert_async().await;
    }

    #[test]
    fn rejects_empty_fields() {
        let payload: serde_json::Value =
            serde_json::from_str(&completion(r#"{"title":"","advice":"x"}"#)).unwrap();
        assert!(parse_completion(&payload).is_err());
    }
}
