//! Anthropic Messages API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use codetutor_config::{Config, HttpProviderConfig};
use codetutor_utils::error::LlmError;

use crate::http_client::HttpClient;
use crate::types::{HttpParams, LlmBackend, LlmInvocation, LlmResult, Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub(crate) const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Clone)]
pub(crate) struct AnthropicBackend {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl AnthropicBackend {
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

    /// Build from `[llm.anthropic]`, reading the key from the configured
    /// environment variable (`ANTHROPIC_API_KEY` unless overridden).
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` when the key variable is unset or empty.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.anthropic.clone().unwrap_or_default();
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
                "Anthropic API key not found in environment variable '{api_key_env}'. \
                 Set it or configure a different api_key_env in [llm.anthropic]."
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

    /// Split system messages into Anthropic's top-level `system` field.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => match system_prompt.as_mut() {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    }
                    None => system_prompt = Some(msg.content.clone()),
                },
                Role::User | Role::Assistant => converted.push(AnthropicMessage {
                    role: if msg.role == Role::User { "user" } else { "assistant" },
                    content: msg.content.clone(),
                }),
            }
        }

        (system_prompt, converted)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = self.resolve_model(&inv);
        let params = self.default_params.resolve(&inv);

        debug!(
            provider = "anthropic",
            stage = %inv.stage,
            model = %model,
            max_tokens = params.max_tokens,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Anthropic backend"
        );

        let (system, messages) = Self::convert_messages(&inv.messages);
        let body = AnthropicRequest {
            model: &model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system,
        };

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response = self.client.execute(request, inv.timeout, "anthropic").await?;
        let response_body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let content: String = response_body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, "anthropic", model);
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.input_tokens, usage.output_tokens);
        }

        debug!(
            provider = "anthropic",
            stage = %inv.stage,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Anthropic invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_key_is_misconfiguration() {
        let result = AnthropicBackend::from_section(
            &HttpProviderConfig::default(),
            None,
            None,
            "ANTHROPIC_API_KEY",
        );
        match result {
            Err(LlmError::Misconfiguration(msg)) => assert!(msg.contains("ANTHROPIC_API_KEY")),
            _ => panic!("expected Misconfiguration"),
        }
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let result = AnthropicBackend::from_section(
            &HttpProviderConfig::default(),
            None,
            Some("   ".to_string()),
            "MY_KEY",
        );
        assert!(matches!(result, Err(LlmError::Misconfiguration(_))));
    }

    #[test]
    fn test_model_precedence() {
        let section = HttpProviderConfig {
            model: Some("section-model".to_string()),
            ..HttpProviderConfig::default()
        };

        let backend =
            AnthropicBackend::from_section(&section, None, Some("k".into()), "K").unwrap();
        assert_eq!(backend.default_model, "section-model");

        let backend =
            AnthropicBackend::from_section(&section, Some("override"), Some("k".into()), "K")
                .unwrap();
        assert_eq!(backend.default_model, "override");

        let backend = AnthropicBackend::from_section(
            &HttpProviderConfig::default(),
            None,
            Some("k".into()),
            "K",
        )
        .unwrap();
        assert_eq!(backend.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_invocation_model_wins() {
        let backend = AnthropicBackend::new(
            "k".to_string(),
            None,
            "default-model".to_string(),
            HttpParams::default(),
        )
        .unwrap();

        let inv = LlmInvocation::new("identify", "", Duration::from_secs(5), vec![]);
        assert_eq!(backend.resolve_model(&inv), "default-model");

        let inv = LlmInvocation::new("identify", "custom", Duration::from_secs(5), vec![]);
        assert_eq!(backend.resolve_model(&inv), "custom");
    }

    #[test]
    fn test_convert_messages_merges_system_prompts() {
        let messages = vec![
            Message::system("Be terse."),
            Message::system("Write in French."),
            Message::user("Explain the flow engine"),
            Message::assistant("D'accord"),
        ];

        let (system, converted) = AnthropicBackend::convert_messages(&messages);

        assert_eq!(system.as_deref(), Some("Be terse.\n\nWrite in French."));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_response_text_blocks_parse() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use"},
                {"type": "text", "text": "world"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.content_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();

        assert_eq!(text, "Hello world");
        assert_eq!(parsed.usage.unwrap().output_tokens, 3);
    }
}
