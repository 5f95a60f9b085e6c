use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use codetutor_utils::error::ConfigError;

use crate::{
    BatchConfig, CliArgs, Config, ConfigSource, Defaults, LlmConfig, RetryConfig, Selectors,
};

/// Directory searched for `config.toml`
pub const CONFIG_DIR: &str = ".codetutor";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    selectors: Option<Selectors>,
    retry: Option<RetryConfig>,
    batch: Option<BatchConfig>,
    llm: Option<LlmConfig>,
}

/// Overwrite `target` with `value` when present and record where it came from.
fn apply<T>(
    target: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: &ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if value.is_some() {
        *target = value;
        attribution.insert(key.to_string(), source.clone());
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| {
            ConfigError::InvalidFile(format!("Failed to get current directory: {e}"))
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut attribution = HashMap::new();
        let mut defaults = Defaults::default();
        let mut selectors = Selectors::default();
        let mut retry = RetryConfig::default();
        let mut batch = BatchConfig::default();
        let mut llm = LlmConfig::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading config file");
            let file = Self::load_config_file(path)?;
            let source = ConfigSource::ConfigFile(path.clone());
            let attr = &mut attribution;

            if let Some(file_defaults) = file.defaults {
                apply(&mut defaults.output_dir, file_defaults.output_dir, "output_dir", &source, attr);
                apply(&mut defaults.max_file_size, file_defaults.max_file_size, "max_file_size", &source, attr);
                apply(&mut defaults.language, file_defaults.language, "language", &source, attr);
                apply(&mut defaults.max_abstractions, file_defaults.max_abstractions, "max_abstractions", &source, attr);
            }

            if let Some(file_selectors) = file.selectors {
                if !file_selectors.include.is_empty() {
                    selectors.include = file_selectors.include;
                    attr.insert("selectors_include".to_string(), source.clone());
                }
                if !file_selectors.exclude.is_empty() {
                    selectors.exclude = file_selectors.exclude;
                    attr.insert("selectors_exclude".to_string(), source.clone());
                }
            }

            if let Some(file_retry) = file.retry {
                apply(&mut retry.max_retries, file_retry.max_retries, "max_retries", &source, attr);
                apply(&mut retry.wait_secs, file_retry.wait_secs, "retry_wait_secs", &source, attr);
            }

            if let Some(file_batch) = file.batch {
                apply(&mut batch.concurrency, file_batch.concurrency, "concurrency", &source, attr);
                apply(&mut batch.fail_fast, file_batch.fail_fast, "fail_fast", &source, attr);
            }

            if let Some(file_llm) = file.llm {
                apply(&mut llm.provider, file_llm.provider, "llm_provider", &source, attr);
                apply(&mut llm.model, file_llm.model, "llm_model", &source, attr);
                apply(&mut llm.timeout_secs, file_llm.timeout_secs, "llm_timeout_secs", &source, attr);
                apply(&mut llm.budget, file_llm.budget, "llm_budget", &source, attr);
                apply(&mut llm.anthropic, file_llm.anthropic, "llm_anthropic_config", &source, attr);
                apply(&mut llm.openrouter, file_llm.openrouter, "llm_openrouter_config", &source, attr);
            }
        }

        // CLI overrides (highest priority)
        let cli = ConfigSource::Cli;
        let attr = &mut attribution;
        apply(&mut defaults.output_dir, cli_args.output_dir.clone(), "output_dir", &cli, attr);
        apply(&mut defaults.max_file_size, cli_args.max_file_size, "max_file_size", &cli, attr);
        apply(&mut defaults.language, cli_args.language.clone(), "language", &cli, attr);
        apply(&mut defaults.max_abstractions, cli_args.max_abstractions, "max_abstractions", &cli, attr);
        apply(&mut retry.max_retries, cli_args.max_retries, "max_retries", &cli, attr);
        apply(&mut retry.wait_secs, cli_args.retry_wait_secs, "retry_wait_secs", &cli, attr);
        apply(&mut batch.concurrency, cli_args.concurrency, "concurrency", &cli, attr);
        apply(&mut llm.provider, cli_args.llm_provider.clone(), "llm_provider", &cli, attr);
        apply(&mut llm.model, cli_args.model.clone(), "llm_model", &cli, attr);

        if !cli_args.include.is_empty() {
            selectors.include = cli_args.include.clone();
            attr.insert("selectors_include".to_string(), ConfigSource::Cli);
        }
        if !cli_args.exclude.is_empty() {
            selectors.exclude = cli_args.exclude.clone();
            attr.insert("selectors_exclude".to_string(), ConfigSource::Cli);
        }

        let config = Self {
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

    /// Search upward from `start_dir` for `.codetutor/config.toml`.
    ///
    /// Stops at the first directory carrying a repository marker (`.git`,
    /// `.hg`, `.svn`) or at the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR).join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current = dir.parent();
        }

        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidFile(format!("Failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }
}
