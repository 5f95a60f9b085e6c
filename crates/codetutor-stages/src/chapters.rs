use async_trait::async_trait;
use tracing::{info, warn};

use codetutor_crawl::SourceFile;
use codetutor_llm::LlmClient;
use codetutor_stage_api::{BatchPolicy, BatchStage, ItemResult, Outcome, RetryPolicy, StageError};

use crate::context::{SharedContext, chapter_file_name};
use crate::prompts::{self, ChapterPrompt};

pub const CHAPTERS_STAGE: &str = "chapters";

/// Marks chapter bodies that stand in for a failed generation
pub const PLACEHOLDER_MARKER: &str = "<!-- codetutor:placeholder -->";

/// Generate one Markdown chapter per entry of `chapter_order`.
///
/// Items run concurrently up to the batch policy's limit. A chapter whose
/// retries are exhausted gets a placeholder body and the stage reports
/// [`Outcome::DEGRADED`].
pub struct WriteChapters {
    client: LlmClient,
    retry: RetryPolicy,
    batch: BatchPolicy,
}

impl WriteChapters {
    pub fn new(client: LlmClient, retry: RetryPolicy, batch: BatchPolicy) -> Self {
        Self {
            client,
            retry,
            batch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChapterItem {
    /// 1-based position in the tutorial
    pub number: usize,
    pub abstraction_index: usize,
    pub name: String,
    prompt: String,
}

/// Body used when a chapter could not be generated.
#[must_use]
pub fn placeholder_chapter(number: usize, name: &str, reason: &str) -> String {
    format!(
        "# Chapter {number}: {name}\n\n{PLACEHOLDER_MARKER}\n\
         > This chapter could not be generated ({reason}).\n\
         > Re-run codetutor to try again.\n"
    )
}

#[must_use]
pub fn is_placeholder(body: &str) -> bool {
    body.contains(PLACEHOLDER_MARKER)
}

/// Prepend `# Chapter N: Name` unless the body already opens with a heading.
fn ensure_heading(number: usize, name: &str, body: &str) -> String {
    let body = body.trim();
    let opens_with_heading = body
        .lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.trim_start().starts_with("# "));

    if opens_with_heading {
        format!("{body}\n")
    } else {
        format!("# Chapter {number}: {name}\n\n{body}\n")
    }
}

#[async_trait]
impl BatchStage<SharedContext> for WriteChapters {
    type Item = ChapterItem;
    type ItemOutput = String;

    fn name(&self) -> &str {
        CHAPTERS_STAGE
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn batch_policy(&self) -> BatchPolicy {
        self.batch
    }

    fn outcomes(&self) -> &'static [Outcome] {
        &[Outcome::DEFAULT, Outcome::DEGRADED]
    }

    fn prepare(&self, ctx: &SharedContext) -> Result<Vec<ChapterItem>, StageError> {
        if let Some(bad) = ctx
            .chapter_order
            .iter()
            .find(|index| **index >= ctx.abstractions.len())
        {
            return Err(StageError::Validation(format!(
                "chapter order references abstraction {bad} but only {} exist",
                ctx.abstractions.len()
            )));
        }

        let toc: Vec<(String, String)> = ctx
            .chapter_order
            .iter()
            .enumerate()
            .map(|(position, index)| {
                let name = &ctx.abstractions[*index].name;
                (name.clone(), chapter_file_name(position, name))
            })
            .collect();

        let items = ctx
            .chapter_order
            .iter()
            .enumerate()
            .map(|(position, index)| {
                let abstraction = &ctx.abstractions[*index];
                let files: Vec<SourceFile> = abstraction
                    .file_indices
                    .iter()
                    .filter_map(|i| ctx.files.get(*i).cloned())
                    .collect();
                let prompt = prompts::chapter(&ChapterPrompt {
                    project: ctx.project_name_or_default(),
                    chapter_number: position + 1,
                    name: &abstraction.name,
                    description: &abstraction.description,
                    language: &ctx.language,
                    toc: &toc,
                    files: &files,
                });
                ChapterItem {
                    number: position + 1,
                    abstraction_index: *index,
                    name: abstraction.name.clone(),
                    prompt,
                }
            })
            .collect();

        Ok(items)
    }

    async fn execute_item(&self, item: &ChapterItem) -> Result<String, StageError> {
        let response = self.client.complete(CHAPTERS_STAGE, &item.prompt).await?;
        if response.trim().is_empty() {
            return Err(StageError::malformed("empty chapter body"));
        }
        Ok(ensure_heading(item.number, &item.name, &response))
    }

    fn fallback_item(&self, item: &ChapterItem, error: &StageError) -> Option<String> {
        Some(placeholder_chapter(item.number, &item.name, &error.to_string()))
    }

    fn finalize(
        &self,
        ctx: &mut SharedContext,
        items: Vec<ChapterItem>,
        results: Vec<ItemResult<String>>,
    ) -> Outcome {
        let mut degraded = 0;
        let mut chapters = Vec::with_capacity(items.len());

        for (item, result) in items.iter().zip(results) {
            let body = match result {
                ItemResult::Completed(body) => body,
                ItemResult::Fallback(body) => {
                    degraded += 1;
                    body
                }
                ItemResult::Failed(err) => {
                    degraded += 1;
                    warn!(chapter = item.number, error = %err, "Chapter failed, using placeholder");
                    placeholder_chapter(item.number, &item.name, &err.to_string())
                }
            };
            chapters.push(body);
        }

        info!(chapters = chapters.len(), placeholders = degraded, "Chapters written");
        ctx.chapters = chapters;

        if degraded > 0 {
            Outcome::DEGRADED
        } else {
            Outcome::DEFAULT
        }
    }
}
