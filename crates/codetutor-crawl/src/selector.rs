use camino::Utf8Path;
use globset::{Glob, GlobSet, GlobSetBuilder};

use codetutor_utils::error::CrawlError;

/// Include/exclude filter over repository-relative paths.
///
/// Patterns use shell-glob semantics where `*` also crosses `/`. Include
/// patterns match the relative path or the bare file name; exclude patterns
/// match the relative path. An empty include list accepts every file.
#[derive(Debug, Clone)]
pub struct FileSelector {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl FileSelector {
    /// # Errors
    ///
    /// Returns `CrawlError::InvalidPattern` naming the first bad pattern.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, CrawlError> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_set(include)?)
        };
        Ok(Self {
            include,
            exclude: build_set(exclude)?,
        })
    }

    #[must_use]
    pub fn should_include(&self, relative: &Utf8Path) -> bool {
        if self.exclude.is_match(relative.as_str()) {
            return false;
        }

        match &self.include {
            None => true,
            Some(include) => {
                include.is_match(relative.as_str())
                    || relative
                        .file_name()
                        .is_some_and(|name| include.is_match(name))
            }
        }
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, CrawlError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| CrawlError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.kind().to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| CrawlError::InvalidPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(include: &[&str], exclude: &[&str]) -> FileSelector {
        let owned = |p: &[&str]| p.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        FileSelector::new(&owned(include), &owned(exclude)).unwrap()
    }

    #[test]
    fn test_include_matches_path_or_file_name() {
        let sel = selector(&["*.md", "Dockerfile", "**/*.rs"], &[]);

        assert!(sel.should_include(Utf8Path::new("README.md")));
        assert!(sel.should_include(Utf8Path::new("docs/guide/intro.md")));
        assert!(sel.should_include(Utf8Path::new("deploy/Dockerfile")));
        assert!(sel.should_include(Utf8Path::new("src/main.rs")));
        assert!(sel.should_include(Utf8Path::new("lib.rs")));
        assert!(!sel.should_include(Utf8Path::new("src/main.py")));
    }

    #[test]
    fn test_exclude_wins_and_star_crosses_directories() {
        let sel = selector(&["**/*.rs"], &["*test*", "target/*"]);

        assert!(!sel.should_include(Utf8Path::new("tests/flow.rs")));
        assert!(!sel.should_include(Utf8Path::new("src/test_support.rs")));
        assert!(!sel.should_include(Utf8Path::new("target/debug/build/out.rs")));
        assert!(sel.should_include(Utf8Path::new("src/flow.rs")));
    }

    #[test]
    fn test_empty_include_accepts_everything() {
        let sel = selector(&[], &["*.log"]);

        assert!(sel.should_include(Utf8Path::new("anything/at/all.bin")));
        assert!(!sel.should_include(Utf8Path::new("server.log")));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = FileSelector::new(&["src/[oops".to_string()], &[]).unwrap_err();
        match err {
            CrawlError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "src/[oops"),
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }
}
