//! OpenRouter backend (OpenAI-compatible chat completions)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use codetutor_config::{Config, HttpProviderConfig};
use codetutor_utils::error::LlmError;

use crate::http_client::HttpClient;
use crate::types::{HttpParams, LlmBackend, LlmInvocation, LlmResult, Message, Role};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_REFERER: &str = "https://github.com/EffortlessMetrics/codetutor";
const DEFAULT_TITLE: &str = "codetutor";
const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub(crate) const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

#[derive(Clone)]
pub(crate) struct OpenRouterBackend {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl OpenRouterBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        default_params: HttpParams,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            default_params,
        })
    }

    /// Build from `[llm.openrouter]`, reading the key from the configured
    /// environment variable (`OPENROUTER_API_KEY` unless overridden).
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` when the key variable is unset or empty.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.openrouter.clone().unwrap_or_default();
        let api_key_env = section
            .api_key_env
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&api_key_env).ok();
        Self::from_section(&section, config.llm.model.as_deref(), api_key, &api_key_env)
    }

    fn from_section(
        section: &HttpProviderConfig,
        model_override: Option<&str>,
        api_key: Option<String>,
        api_key_env: &str,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.filter(|key| !key.trim().is_empty()).ok_or_else(|| {
            LlmError::Misconfiguration(format!(
                "OpenRouter API key not found in environment variable '{api_key_env}'. \
                 Set it or configure a different api_key_env in [llm.openrouter]."
            ))
        })?;

        let default_model = model_override
            .map(str::to_string)
            .or_else(|| section.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base = HttpParams::default();
        let params = HttpParams {
            max_tokens: section.max_tokens.unwrap_or(base.max_tokens),
            temperature: section.temperature.unwrap_or(base.temperature),
        };

        Self::new(api_key, section.base_url.clone(), default_model, params)
    }

    fn resolve_model(&self, inv: &LlmInvocation) -> String {
        if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: msg.content.clone(),
            })
            .collect()
    }

    fn extract_content(response: OpenRouterResponse) -> Result<(String, Option<Usage>), LlmError> {
        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Transport("OpenRouter response missing choices[0]".to_string()))?
            .message
            .content
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                LlmError::Transport("OpenRouter response missing content in choices[0]".to_string())
            })?;
        Ok((content, response.usage))
    }
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = self.resolve_model(&inv);
        let params = self.default_params.resolve(&inv);

        debug!(
            provider = "openrouter",
            stage = %inv.stage,
            model = %model,
            max_tokens = params.max_tokens,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking OpenRouter backend"
        );

        let body = OpenRouterRequest {
            model: &model,
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let request = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", DEFAULT_REFERER)
            .header("X-Title", DEFAULT_TITLE)
            .json(&body);

        let response = self.client.execute(request, inv.timeout, "openrouter").await?;
        let response_body: OpenRouterResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse OpenRouter response: {e}"))
        })?;

        let (content, usage) = Self::extract_content(response_body)?;
        let mut result = LlmResult::new(content, "openrouter", model);
        if let Some(usage) = usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider = "openrouter",
            stage = %inv.stage,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "OpenRouter invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_names_variable() {
        let section = HttpProviderConfig {
            api_key_env: Some("CUSTOM_OR_KEY".to_string()),
            ..HttpProviderConfig::default()
        };
        match OpenRouterBackend::from_section(&section, None, None, "CUSTOM_OR_KEY") {
            Err(LlmError::Misconfiguration(msg)) => assert!(msg.contains("CUSTOM_OR_KEY")),
            _ => panic!("expected Misconfiguration"),
        }
    }

    #[test]
    fn test_section_params_applied() {
        let section = HttpProviderConfig {
            max_tokens: Some(1024),
            temperature: Some(0.9),
            ..HttpProviderConfig::default()
        };
        let backend =
            OpenRouterBackend::from_section(&section, None, Some("k".into()), "K").unwrap();

        assert_eq!(backend.default_params.max_tokens, 1024);
        assert_eq!(backend.default_model, DEFAULT_MODEL);
        assert_eq!(backend.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_convert_messages_keeps_order() {
        let converted = OpenRouterBackend::convert_messages(&[
            Message::system("sys"),
            Message::user("hi"),
        ]);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].content, "hi");
    }

    #[test]
    fn test_extract_content() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "chapter text"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 2}
        }"#;
        let parsed: OpenRouterResponse = serde_json::from_str(json).unwrap();
        let (content, usage) = OpenRouterBackend::extract_content(parsed).unwrap();

        assert_eq!(content, "chapter text");
        assert_eq!(usage.unwrap().prompt_tokens, 40);
    }

    #[test]
    fn test_extract_content_rejects_empty_choices() {
        let parsed: OpenRouterResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            OpenRouterBackend::extract_content(parsed),
            Err(LlmError::Transport(_))
        ));

        let parsed: OpenRouterResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(OpenRouterBackend::extract_content(parsed).is_err());
    }
}
