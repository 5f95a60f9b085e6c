use std::sync::Arc;

use codetutor_config::Config;
use codetutor_crawl::Crawler;
use codetutor_engine::Flow;
use codetutor_llm::LlmClient;
use codetutor_stage_api::{BatchPolicy, RetryPolicy};
use codetutor_utils::error::FlowError;

use crate::chapters::WriteChapters;
use crate::combine::CombineTutorial;
use crate::context::SharedContext;
use crate::fetch::FetchFiles;
use crate::identify::IdentifyAbstractions;
use crate::order::OrderChapters;
use crate::relationships::AnalyzeRelationships;

/// Retry and batch settings shared by the provider-backed stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSettings {
    pub retry: RetryPolicy,
    pub batch: BatchPolicy,
}

impl StageSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::new(config.max_retries(), config.retry_wait()),
            batch: BatchPolicy {
                concurrency: config.concurrency(),
                fail_fast: config.fail_fast(),
            },
        }
    }
}

/// fetch -> identify -> relationships -> order -> chapters -> combine
///
/// # Errors
///
/// Only fails if the stage graph itself is inconsistent.
pub fn tutorial_flow(
    client: LlmClient,
    crawler: Arc<dyn Crawler>,
    settings: StageSettings,
) -> Result<Flow<SharedContext>, FlowError> {
    Flow::<SharedContext>::builder()
        .stage(FetchFiles::new(crawler, settings.retry))
        .stage(IdentifyAbstractions::new(client.clone(), settings.retry))
        .stage(AnalyzeRelationships::new(client.clone(), settings.retry))
        .stage(OrderChapters::new(client.clone(), settings.retry))
        .batch(WriteChapters::new(client, settings.retry, settings.batch))
        .stage(CombineTutorial)
        .build()
}
