use codetutor_utils::error::ConfigError;

use crate::Config;

/// Providers the LLM factory knows how to construct
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "openrouter"];

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    ///
    /// Every problem is collected so a single run reports all of them. A lone
    /// problem is returned as-is; several are wrapped in
    /// [`ConfigError::ValidationFailed`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.max_file_size() == 0 {
            errors.push(invalid("max_file_size", "must be greater than 0"));
        }

        let max_abstractions = self.max_abstractions();
        if max_abstractions == 0 {
            errors.push(invalid("max_abstractions", "must be greater than 0"));
        } else if max_abstractions > 50 {
            errors.push(invalid("max_abstractions", "exceeds maximum limit of 50"));
        }

        if self.language().trim().is_empty() {
            errors.push(invalid("language", "must not be empty"));
        }

        if self.max_retries() > 20 {
            errors.push(invalid("retry.max_retries", "exceeds maximum limit of 20"));
        }

        if self.retry_wait().as_secs() > 600 {
            errors.push(invalid(
                "retry.wait_secs",
                "exceeds maximum limit of 600 seconds",
            ));
        }

        let concurrency = self.concurrency();
        if concurrency == 0 {
            errors.push(invalid("batch.concurrency", "must be at least 1"));
        } else if concurrency > 64 {
            errors.push(invalid("batch.concurrency", "exceeds maximum limit of 64"));
        }

        let provider = self.llm_provider();
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            errors.push(invalid(
                "llm.provider",
                format!(
                    "unknown provider '{provider}' (supported: {})",
                    SUPPORTED_PROVIDERS.join(", ")
                ),
            ));
        }

        let timeout = self.llm_timeout().as_secs();
        if !(5..=3600).contains(&timeout) {
            errors.push(invalid(
                "llm.timeout_secs",
                "must be between 5 and 3600 seconds",
            ));
        }

        if self.llm.budget == Some(0) {
            errors.push(invalid("llm.budget", "must be greater than 0"));
        }

        for (name, section) in [
            ("llm.anthropic", &self.llm.anthropic),
            ("llm.openrouter", &self.llm.openrouter),
        ] {
            if let Some(section) = section
                && let Some(temperature) = section.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                errors.push(invalid(
                    &format!("{name}.temperature"),
                    "must be between 0.0 and 2.0",
                ));
            }
        }

        if let Err(err) = self.selectors.validate() {
            errors.push(err);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            error_count => Err(ConfigError::ValidationFailed {
                errors: errors.iter().map(ToString::to_string).collect(),
                error_count,
            }),
        }
    }
}
