//! Source selection and file crawling for codetutor
//!
//! A [`Crawler`] turns a [`Source`] plus a [`CrawlRequest`] into an ordered list
//! of [`SourceFile`]s. [`FsCrawler`] walks local directories and shallow-clones
//! remote repositories first.

mod fs_crawler;
mod git;
mod selector;
mod source;

use async_trait::async_trait;
use codetutor_utils::error::CrawlError;

pub use fs_crawler::{FsCrawler, crawl_directory};
pub use selector::FileSelector;
pub use source::Source;

/// A crawled file. `path` is relative to the crawl root unless absolute paths
/// were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Selection rules for a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Files strictly larger than this many bytes are skipped
    pub max_file_size: u64,
    pub relative_paths: bool,
}

impl CrawlRequest {
    pub fn new(include: Vec<String>, exclude: Vec<String>, max_file_size: u64) -> Self {
        Self {
            include,
            exclude,
            max_file_size,
            relative_paths: true,
        }
    }
}

#[async_trait]
pub trait Crawler: Send + Sync {
    /// # Errors
    ///
    /// Any [`CrawlError`] is fatal to the run.
    async fn crawl(
        &self,
        source: &Source,
        request: &CrawlRequest,
    ) -> Result<Vec<SourceFile>, CrawlError>;
}
