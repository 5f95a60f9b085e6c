use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use codetutor_crawl::{CrawlRequest, Crawler, Source, SourceFile};
use codetutor_stage_api::{Outcome, RetryPolicy, Stage, StageError};

use crate::context::SharedContext;

pub const FETCH_STAGE: &str = "fetch";

/// Crawl the source into `files` and derive `project_name` when missing.
pub struct FetchFiles {
    crawler: Arc<dyn Crawler>,
    retry: RetryPolicy,
}

impl FetchFiles {
    pub fn new(crawler: Arc<dyn Crawler>, retry: RetryPolicy) -> Self {
        Self { crawler, retry }
    }
}

pub struct FetchInput {
    source: Source,
    request: CrawlRequest,
}

#[async_trait]
impl Stage<SharedContext> for FetchFiles {
    type Prepared = FetchInput;
    type Output = Vec<SourceFile>;

    fn name(&self) -> &str {
        FETCH_STAGE
    }

    /// Only network failures during a clone are transient, so local crawls
    /// never consume retries.
    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn prepare(&self, ctx: &SharedContext) -> Result<FetchInput, StageError> {
        if ctx.crawl_config.max_file_size == 0 {
            return Err(StageError::Validation(
                "max file size must be greater than 0".to_string(),
            ));
        }
        Ok(FetchInput {
            source: ctx.source.clone(),
            request: ctx.crawl_config.to_request(),
        })
    }

    async fn execute(&self, input: &FetchInput) -> Result<Vec<SourceFile>, StageError> {
        info!(source = %input.source.describe(), "Crawling source");
        Ok(self.crawler.crawl(&input.source, &input.request).await?)
    }

    fn finalize(
        &self,
        ctx: &mut SharedContext,
        input: FetchInput,
        files: Vec<SourceFile>,
    ) -> Outcome {
        if ctx.project_name.is_none() {
            ctx.project_name = input.source.default_project_name();
        }
        if files.is_empty() {
            ctx.warn(FETCH_STAGE, "no files matched the include/exclude patterns");
        }
        info!(files = files.len(), project = %ctx.project_name_or_default(), "Fetched files");
        ctx.files = files;
        Outcome::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetutor_config::Config;
    use codetutor_utils::error::CrawlError;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FakeCrawler {
        files: Vec<SourceFile>,
        seen: Mutex<Vec<CrawlRequest>>,
    }

    #[async_trait]
    impl Crawler for FakeCrawler {
        async fn crawl(
            &self,
            _source: &Source,
            request: &CrawlRequest,
        ) -> Result<Vec<SourceFile>, CrawlError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.files.clone())
        }
    }

    struct BrokenCrawler;

    #[async_trait]
    impl Crawler for BrokenCrawler {
        async fn crawl(&self, source: &Source, _: &CrawlRequest) -> Result<Vec<SourceFile>, CrawlError> {
            Err(CrawlError::RootNotFound {
                path: source.describe(),
            })
        }
    }

    fn context(project_name: Option<&str>) -> SharedContext {
        let config = Config::builder().include(["**/*.rs"]).build().unwrap();
        SharedContext::new(
            Source::Local {
                path: PathBuf::from("/work/widget-factory"),
            },
            project_name.map(str::to_string),
            &config,
        )
    }

    #[tokio::test]
    async fn test_fetch_sets_files_and_derives_name() {
        let crawler = Arc::new(FakeCrawler {
            files: vec![SourceFile::new("src/lib.rs", "pub fn f() {}")],
            seen: Mutex::new(Vec::new()),
        });
        let stage = FetchFiles::new(crawler.clone(), RetryPolicy::none());
        let mut ctx = context(None);

        let input = stage.prepare(&ctx).unwrap();
        let files = stage.execute(&input).await.unwrap();
        stage.finalize(&mut ctx, input, files);

        assert_eq!(ctx.files.len(), 1);
        assert_eq!(ctx.project_name.as_deref(), Some("widget-factory"));
        assert!(ctx.warnings.is_empty());
        assert_eq!(crawler.seen.lock().unwrap()[0].include, vec!["**/*.rs"]);
    }

    #[tokio::test]
    async fn test_explicit_name_kept_and_empty_crawl_warns() {
        let crawler = Arc::new(FakeCrawler {
            files: Vec::new(),
            seen: Mutex::new(Vec::new()),
        });
        let stage = FetchFiles::new(crawler, RetryPolicy::none());
        let mut ctx = context(Some("Custom"));

        let input = stage.prepare(&ctx).unwrap();
        let files = stage.execute(&input).await.unwrap();
        stage.finalize(&mut ctx, input, files);

        assert_eq!(ctx.project_name.as_deref(), Some("Custom"));
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].stage, FETCH_STAGE);
    }

    #[tokio::test]
    async fn test_crawler_error_propagates() {
        let stage = FetchFiles::new(Arc::new(BrokenCrawler), RetryPolicy::none());
        let ctx = context(None);

        let input = stage.prepare(&ctx).unwrap();
        let err = stage.execute(&input).await.unwrap_err();
        assert!(matches!(err, StageError::Crawl(CrawlError::RootNotFound { .. })));
        assert!(!err.is_transient());
    }
}
