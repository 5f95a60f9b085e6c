//! Shared HTTP plumbing for the provider backends
//!
//! One request per call. Retrying is the flow engine's job, so this layer only
//! classifies failures into [`LlmError`] variants the engine can reason about.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::debug;

use codetutor_utils::error::LlmError;

/// Provider error bodies are echoed into messages, capped at this many chars
const MAX_BODY_EXCERPT: usize = 300;

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the TLS client cannot be built.
    pub fn new() -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("codetutor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send `request` with a per-call timeout and map non-2xx statuses.
    pub async fn execute(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        provider: &str,
    ) -> Result<Response, LlmError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_send_error(&e, timeout, provider))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(provider, status = status.as_u16(), "Provider returned error status");
        Err(classify_status(status, &body, provider))
    }
}

fn classify_send_error(err: &reqwest::Error, timeout: Duration, provider: &str) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout { duration: timeout }
    } else if err.is_connect() {
        LlmError::Transport(format!("{provider}: connection failed: {err}"))
    } else {
        LlmError::Transport(format!("{provider}: request failed: {err}"))
    }
}

pub(crate) fn classify_status(status: StatusCode, body: &str, provider: &str) -> LlmError {
    let detail = format!("{provider} returned {status}: {}", excerpt(body));
    match status.as_u16() {
        401 | 403 => LlmError::ProviderAuth(detail),
        429 => LlmError::ProviderQuota(detail),
        500..=599 => LlmError::ProviderOutage(detail),
        _ => LlmError::InvalidRequest(detail),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_EXCERPT {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "", "anthropic"),
            LlmError::ProviderAuth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "", "anthropic"),
            LlmError::ProviderAuth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down", "openrouter"),
            LlmError::ProviderQuota(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "", "openrouter"),
            LlmError::ProviderOutage(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad json", "anthropic"),
            LlmError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "", "x").is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "", "x").is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "", "x").is_transient());
        assert!(!classify_status(StatusCode::UNPROCESSABLE_ENTITY, "", "x").is_transient());
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1_000);
        let err = classify_status(StatusCode::BAD_REQUEST, &body, "anthropic");
        let message = err.to_string();
        assert!(message.ends_with("..."));
        assert!(message.len() < 400);
    }
}
