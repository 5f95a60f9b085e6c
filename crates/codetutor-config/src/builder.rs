use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use codetutor_utils::error::ConfigError;

use crate::{
    BatchConfig, Config, ConfigSource, Defaults, HttpProviderConfig, LlmConfig, RetryConfig,
    Selectors,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding codetutor without reading config files or the
    /// command line.
    ///
    /// ```rust
    /// use codetutor_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .language("french")
    ///     .max_retries(1)
    ///     .retry_wait(Duration::from_secs(2))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.language(), "french");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to
/// [`ConfigSource::Programmatic`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    output_dir: Option<PathBuf>,
    max_file_size: Option<u64>,
    language: Option<String>,
    max_abstractions: Option<usize>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    max_retries: Option<u32>,
    retry_wait: Option<Duration>,
    concurrency: Option<usize>,
    fail_fast: Option<bool>,
    llm_provider: Option<String>,
    model: Option<String>,
    llm_timeout: Option<Duration>,
    budget: Option<u32>,
    anthropic: Option<HttpProviderConfig>,
    openrouter: Option<HttpProviderConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn max_abstractions(mut self, max: usize) -> Self {
        self.max_abstractions = Some(max);
        self
    }

    #[must_use]
    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Wait between attempts, truncated to whole seconds.
    #[must_use]
    pub fn retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = Some(wait);
        self
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = Some(fail_fast);
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn budget(mut self, calls: u32) -> Self {
        self.budget = Some(calls);
        self
    }

    #[must_use]
    pub fn anthropic(mut self, section: HttpProviderConfig) -> Self {
        self.anthropic = Some(section);
        self
    }

    #[must_use]
    pub fn openrouter(mut self, section: HttpProviderConfig) -> Self {
        self.openrouter = Some(section);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`Config::discover`].
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut attribution = HashMap::new();
        let mut mark = |key: &str, set: bool| {
            if set {
                attribution.insert(key.to_string(), ConfigSource::Programmatic);
            }
        };

        mark("output_dir", self.output_dir.is_some());
        mark("max_file_size", self.max_file_size.is_some());
        mark("language", self.language.is_some());
        mark("max_abstractions", self.max_abstractions.is_some());
        mark("selectors_include", self.include.is_some());
        mark("selectors_exclude", self.exclude.is_some());
        mark("max_retries", self.max_retries.is_some());
        mark("retry_wait_secs", self.retry_wait.is_some());
        mark("concurrency", self.concurrency.is_some());
        mark("fail_fast", self.fail_fast.is_some());
        mark("llm_provider", self.llm_provider.is_some());
        mark("llm_model", self.model.is_some());
        mark("llm_timeout_secs", self.llm_timeout.is_some());
        mark("llm_budget", self.budget.is_some());

        let base_defaults = Defaults::default();
        let defaults = Defaults {
            output_dir: self.output_dir.or(base_defaults.output_dir),
            max_file_size: self.max_file_size.or(base_defaults.max_file_size),
            language: self.language.or(base_defaults.language),
            max_abstractions: self.max_abstractions.or(base_defaults.max_abstractions),
        };

        let base_selectors = Selectors::default();
        let selectors = Selectors {
            include: self.include.unwrap_or(base_selectors.include),
            exclude: self.exclude.unwrap_or(base_selectors.exclude),
        };

        let base_retry = RetryConfig::default();
        let retry = RetryConfig {
            max_retries: self.max_retries.or(base_retry.max_retries),
            wait_secs: self
                .retry_wait
                .map(|wait| wait.as_secs())
                .or(base_retry.wait_secs),
        };

        let base_batch = BatchConfig::default();
        let batch = BatchConfig {
            concurrency: self.concurrency.or(base_batch.concurrency),
            fail_fast: self.fail_fast.or(base_batch.fail_fast),
        };

        let llm = LlmConfig {
            provider: self.llm_provider,
            model: self.model,
            timeout_secs: self.llm_timeout.map(|timeout| timeout.as_secs()),
            budget: self.budget,
            anthropic: self.anthropic,
            openrouter: self.openrouter,
        };

        let config = Config {
            defaults,
            selectors,
            retry,
            batch,
            llm,
            source_attribution: attribution,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();

        assert_eq!(config.max_abstractions(), 10);
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.retry_wait(), Duration::from_secs(10));
        assert_eq!(config.concurrency(), 4);
        assert!(!config.fail_fast());
        assert_eq!(config.llm_timeout(), Duration::from_secs(120));
        assert!(config.source_attribution.is_empty());
    }

    #[test]
    fn test_builder_values_are_programmatic() {
        let config = Config::builder()
            .output_dir("/tmp/tutorials")
            .include(["**/*.rs"])
            .concurrency(8)
            .llm_provider("openrouter")
            .build()
            .unwrap();

        assert_eq!(config.output_dir(), PathBuf::from("/tmp/tutorials"));
        assert_eq!(config.selectors.include, vec!["**/*.rs"]);
        assert_eq!(config.concurrency(), 8);
        assert_eq!(config.llm_provider(), "openrouter");
        assert_eq!(config.source_of("concurrency"), ConfigSource::Programmatic);
        assert_eq!(config.source_of("language"), ConfigSource::Defaults);
    }

    #[test]
    fn test_builder_validates() {
        assert!(Config::builder().max_abstractions(0).build().is_err());
        assert!(Config::builder().llm_provider("ollama").build().is_err());
    }
}
