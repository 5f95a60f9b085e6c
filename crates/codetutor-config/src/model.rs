use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default base directory for rendered tutorials
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Files larger than this many bytes are skipped by the crawler
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100_000;

pub const DEFAULT_LANGUAGE: &str = "english";

/// Upper bound on abstractions requested from the provider
pub const DEFAULT_MAX_ABSTRACTIONS: usize = 10;

/// Retries after the first attempt for every provider-backed stage
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const DEFAULT_RETRY_WAIT_SECS: u64 = 10;

/// Chapters written at once by the batch stage
pub const DEFAULT_CONCURRENCY: usize = 4;

pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Per-request timeout for provider calls
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence)
    Cli,
    /// Value loaded from the given configuration file
    ConfigFile(PathBuf),
    /// Value provided through [`ConfigBuilder`](crate::ConfigBuilder)
    Programmatic,
    /// Built-in default value (lowest precedence)
    Defaults,
}

/// `[defaults]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub output_dir: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub language: Option<String>,
    pub max_abstractions: Option<usize>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output_dir: Some(PathBuf::from(DEFAULT_OUTPUT_DIR)),
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
            language: Some(DEFAULT_LANGUAGE.to_string()),
            max_abstractions: Some(DEFAULT_MAX_ABSTRACTIONS),
        }
    }
}

/// `[selectors]` section: glob patterns applied by the crawler
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Selectors {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[retry]` section shared by every provider-backed stage
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub wait_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(DEFAULT_MAX_RETRIES),
            wait_secs: Some(DEFAULT_RETRY_WAIT_SECS),
        }
    }
}

/// `[batch]` section for the chapter-writing fan-out
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: Some(DEFAULT_CONCURRENCY),
            fail_fast: Some(false),
        }
    }
}

/// `[llm.anthropic]` / `[llm.openrouter]` sections
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpProviderConfig {
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[llm]` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// `anthropic` or `openrouter`
    pub provider: Option<String>,
    /// Model override applied to whichever provider is selected
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Maximum provider calls per run; unlimited when unset
    pub budget: Option<u32>,
    pub anthropic: Option<HttpProviderConfig>,
    pub openrouter: Option<HttpProviderConfig>,
}

/// Effective configuration for a codetutor run.
///
/// Built once at start-up with precedence CLI > config file > built-in
/// defaults (see [`Config::discover`]) or programmatically through
/// [`Config::builder`]. Every resolved key records its [`ConfigSource`].
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub selectors: Selectors,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub llm: LlmConfig,
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Config {
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.defaults
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.defaults.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE)
    }

    #[must_use]
    pub fn language(&self) -> &str {
        self.defaults.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    #[must_use]
    pub fn max_abstractions(&self) -> usize {
        self.defaults
            .max_abstractions
            .unwrap_or(DEFAULT_MAX_ABSTRACTIONS)
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    #[must_use]
    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry.wait_secs.unwrap_or(DEFAULT_RETRY_WAIT_SECS))
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.batch.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    #[must_use]
    pub fn fail_fast(&self) -> bool {
        self.batch.fail_fast.unwrap_or(false)
    }

    #[must_use]
    pub fn llm_provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS))
    }

    /// Source of a resolved key, `Defaults` when nothing overrode it.
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .cloned()
            .unwrap_or(ConfigSource::Defaults)
    }
}

/// Values taken from the command line.
///
/// Every field is optional; `None` (or an empty list) leaves the config file
/// or built-in default in place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; skips upward discovery
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub language: Option<String>,
    pub max_abstractions: Option<usize>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_retries: Option<u32>,
    pub retry_wait_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub llm_provider: Option<String>,
    pub model: Option<String>,
}
