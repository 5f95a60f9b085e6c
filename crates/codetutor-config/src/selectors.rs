use globset::Glob;

use codetutor_utils::error::ConfigError;

use crate::Selectors;

/// Files crawled when no include pattern is configured.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    "**/*.py",
    "**/*.js",
    "**/*.jsx",
    "**/*.ts",
    "**/*.tsx",
    "**/*.go",
    "**/*.java",
    "**/*.pyi",
    "**/*.pyx",
    "**/*.c",
    "**/*.cc",
    "**/*.cpp",
    "**/*.h",
    "**/*.rs",
    "**/Cargo.toml",
    "*.md",
    "*.rst",
    "Dockerfile",
    "Makefile",
    "**/*.yaml",
    "**/*.yml",
];

/// Paths skipped when no exclude pattern is configured.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "*test*",
    "tests/*",
    "docs/*",
    "examples/*",
    "v1/*",
    "dist/*",
    "build/*",
    "experimental/*",
    "deprecated/*",
    "legacy/*",
    ".git/*",
    ".github/*",
    ".next/*",
    ".vscode/*",
    "obj/*",
    "bin/*",
    "node_modules/*",
    "target/*",
    "*.log",
];

impl Default for Selectors {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Selectors {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (key, patterns) in [
            ("selectors.include", &self.include),
            ("selectors.exclude", &self.exclude),
        ] {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: format!("Invalid glob pattern '{pattern}': {e}"),
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_are_valid_globs() {
        let selectors = Selectors::default();
        assert!(selectors.validate().is_ok());
        assert!(selectors.include.contains(&"**/*.rs".to_string()));
        assert!(selectors.exclude.contains(&"target/*".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_reported_with_key() {
        let selectors = Selectors {
            include: vec!["src/[".to_string()],
            exclude: Vec::new(),
        };

        match selectors.validate() {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "selectors.include");
                assert!(value.contains("src/["));
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }
}
