//! Shared context threaded through every stage
//!
//! Stages read what earlier stages produced and write their own fields in
//! `finalize`. Index-bearing fields are kept in bounds by the stages that set
//! them, so later stages can index without re-checking.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use codetutor_config::Config;
use codetutor_crawl::{CrawlRequest, Source, SourceFile};

/// A core concept of the codebase, backed by a set of file indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Abstraction {
    pub name: String,
    pub description: String,
    pub file_indices: BTreeSet<usize>,
}

/// Directed, labelled relationship between two abstractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relationships {
    pub summary: String,
    pub edges: Vec<Edge>,
}

/// Selection rules handed to the crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_file_size: u64,
}

impl CrawlConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            include: config.selectors.include.clone(),
            exclude: config.selectors.exclude.clone(),
            max_file_size: config.max_file_size(),
        }
    }

    #[must_use]
    pub fn to_request(&self) -> CrawlRequest {
        CrawlRequest::new(self.include.clone(), self.exclude.clone(), self.max_file_size)
    }
}

/// Data problem repaired in place; never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub stage: String,
    pub message: String,
}

impl IntegrityWarning {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct SharedContext {
    pub source: Source,
    pub project_name: Option<String>,
    pub crawl_config: CrawlConfig,
    pub language: String,
    pub output_dir: PathBuf,
    pub max_abstractions: usize,

    pub files: Vec<SourceFile>,
    pub abstractions: Vec<Abstraction>,
    pub relationships: Relationships,
    /// Permutation of abstraction indices
    pub chapter_order: Vec<usize>,
    /// `chapters[i]` documents `abstractions[chapter_order[i]]`
    pub chapters: Vec<String>,
    /// Set by the combine stage only once everything was written
    pub output_root: Option<PathBuf>,

    pub warnings: Vec<IntegrityWarning>,
}

impl SharedContext {
    /// Empty context for `source`, seeded with the run settings from `config`.
    #[must_use]
    pub fn new(source: Source, project_name: Option<String>, config: &Config) -> Self {
        Self {
            source,
            project_name,
            crawl_config: CrawlConfig::from_config(config),
            language: config.language().to_string(),
            output_dir: config.output_dir(),
            max_abstractions: config.max_abstractions(),
            files: Vec::new(),
            abstractions: Vec::new(),
            relationships: Relationships::default(),
            chapter_order: Vec::new(),
            chapters: Vec::new(),
            output_root: None,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, stage: &str, message: impl Into<String>) {
        let warning = IntegrityWarning::new(stage, message);
        tracing::warn!(stage = %warning.stage, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Project name, or `"project"` before the fetch stage has derived one.
    #[must_use]
    pub fn project_name_or_default(&self) -> &str {
        self.project_name.as_deref().unwrap_or("project")
    }
}

/// Upper bound on the generated part of any output file or directory name.
const MAX_NAME_BYTES: usize = 96;

const DEFAULT_PROJECT_DIR: &str = "project";

/// Replace every char `keep` rejects with `_`, cut at [`MAX_NAME_BYTES`].
fn path_component(chars: impl Iterator<Item = char>, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::new();
    for c in chars {
        let c = if keep(c) { c } else { '_' };
        if out.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        out.push(c);
    }
    out
}

/// `NN_<safe_name>.md` for the chapter at 0-based `position`.
#[must_use]
pub fn chapter_file_name(position: usize, name: &str) -> String {
    let safe = path_component(name.chars().flat_map(char::to_lowercase), char::is_alphanumeric);
    format!("{:02}_{safe}.md", position + 1)
}

/// Directory name for `project` under the output directory.
///
/// Always a single path component; names without any alphanumeric character
/// (`..`, `/`, empty) become `project`.
#[must_use]
pub fn project_dir_name(project: &str) -> String {
    let safe = path_component(project.trim().chars(), |c| {
        c.is_alphanumeric() || c == '-' || c == '_'
    });
    if safe.chars().any(char::is_alphanumeric) {
        safe
    } else {
        DEFAULT_PROJECT_DIR.to_string()
    }
}
