use std::collections::BTreeMap;

use crate::{Config, ConfigSource};

fn source_label(source: &ConfigSource) -> String {
    match source {
        ConfigSource::Cli => "cli".to_string(),
        ConfigSource::ConfigFile(path) => format!("config ({})", path.display()),
        ConfigSource::Programmatic => "programmatic".to_string(),
        ConfigSource::Defaults => "default".to_string(),
    }
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    ///
    /// API keys are never part of the configuration, so the map is safe to log.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut entries = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            entries.insert(key.to_string(), (value, source_label(&self.source_of(key))));
        };

        add("output_dir", self.output_dir().display().to_string());
        add("max_file_size", self.max_file_size().to_string());
        add("language", self.language().to_string());
        add("max_abstractions", self.max_abstractions().to_string());
        add("selectors_include", self.selectors.include.join(", "));
        add("selectors_exclude", self.selectors.exclude.join(", "));
        add("max_retries", self.max_retries().to_string());
        add("retry_wait_secs", self.retry_wait().as_secs().to_string());
        add("concurrency", self.concurrency().to_string());
        add("fail_fast", self.fail_fast().to_string());
        add("llm_provider", self.llm_provider().to_string());
        add("llm_timeout_secs", self.llm_timeout().as_secs().to_string());
        if let Some(model) = &self.llm.model {
            add("llm_model", model.clone());
        }
        if let Some(budget) = self.llm.budget {
            add("llm_budget", budget.to_string());
        }

        entries
    }
}
