//! LLM provider backends for codetutor
//!
//! Every provider implements [`LlmBackend`]. Stages talk to an [`LlmClient`],
//! which the CLI builds once from [`Config`] via [`LlmClient::from_config`].

mod anthropic_backend;
mod budgeted_backend;
mod client;
mod http_client;
mod openrouter_backend;
mod types;

use std::sync::Arc;

use codetutor_config::Config;
use tracing::debug;

pub use budgeted_backend::BudgetedBackend;
pub use client::LlmClient;
pub use codetutor_utils::error::LlmError;
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

use anthropic_backend::AnthropicBackend;
use openrouter_backend::OpenRouterBackend;

/// Construct the backend for `provider`.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` for unknown providers and
/// `LlmError::Misconfiguration` when provider settings are incomplete.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    match provider {
        "anthropic" => Ok(Box::new(AnthropicBackend::new_from_config(config)?)),
        "openrouter" => Ok(Box::new(OpenRouterBackend::new_from_config(config)?)),
        other => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{other}' (supported: {})",
            codetutor_config::SUPPORTED_PROVIDERS.join(", ")
        ))),
    }
}

/// Build the configured backend, wrapped in a [`BudgetedBackend`] when
/// `llm.budget` is set.
///
/// # Errors
///
/// See [`construct_backend_for_provider`].
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let provider = config.llm_provider();
    debug!(provider, "Constructing LLM backend");
    let backend = construct_backend_for_provider(provider, config)?;

    Ok(match config.llm.budget {
        Some(limit) => Arc::new(BudgetedBackend::new(backend, limit)),
        None => Arc::from(backend),
    })
}

impl LlmClient {
    /// Client for the configured provider, model override, and timeout.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` when the API key is missing.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let backend = from_config(config)?;
        let model = config.llm.model.clone().unwrap_or_default();
        Ok(Self::new(backend, model, config.llm_timeout()))
    }
}
