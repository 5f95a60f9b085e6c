//! Type-erased stage nodes.
//!
//! A flow holds stages with different `Prepared`/`Output`/`Item` types in one
//! list. [`StageNode`] is the closed set of shapes the engine drives; the two
//! object-safe traits below run one full lifecycle (prepare, retried execute,
//! fallback, finalize) and hand back a [`NodeRun`].

use async_trait::async_trait;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use codetutor_stage_api::{BatchStage, ItemResult, Outcome, Stage};
use codetutor_utils::error::FlowError;

use crate::report::BatchSummary;
use crate::retry::run_with_retry;

/// Result of one node invocation before timing is attached.
#[derive(Debug)]
pub struct NodeRun {
    pub outcome: Outcome,
    pub attempts: u32,
    pub used_fallback: bool,
    pub batch: Option<BatchSummary>,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait DynStage<C>: Send + Sync {
    fn name(&self) -> &str;
    fn outcomes(&self) -> &'static [Outcome];
    async fn run(&self, ctx: &mut C) -> Result<NodeRun, FlowError>;
}

#[async_trait]
pub trait DynBatchStage<C>: Send + Sync {
    fn name(&self) -> &str;
    fn outcomes(&self) -> &'static [Outcome];
    async fn run(&self, ctx: &mut C) -> Result<NodeRun, FlowError>;
}

/// One registered stage in a flow.
pub enum StageNode<C> {
    Single(Box<dyn DynStage<C>>),
    Batch(Box<dyn DynBatchStage<C>>),
}

impl<C> StageNode<C> {
    pub fn name(&self) -> &str {
        match self {
            Self::Single(stage) => stage.name(),
            Self::Batch(stage) => stage.name(),
        }
    }

    pub fn outcomes(&self) -> &'static [Outcome] {
        match self {
            Self::Single(stage) => stage.outcomes(),
            Self::Batch(stage) => stage.outcomes(),
        }
    }

    pub(crate) async fn run(&self, ctx: &mut C) -> Result<NodeRun, FlowError> {
        match self {
            Self::Single(stage) => stage.run(ctx).await,
            Self::Batch(stage) => stage.run(ctx).await,
        }
    }
}

#[async_trait]
impl<C, S> DynStage<C> for S
where
    C: Send,
    S: Stage<C>,
{
    fn name(&self) -> &str {
        Stage::name(self)
    }

    fn outcomes(&self) -> &'static [Outcome] {
        Stage::outcomes(self)
    }

    async fn run(&self, ctx: &mut C) -> Result<NodeRun, FlowError> {
        let name = Stage::name(self);
        let prepared = self.prepare(ctx).map_err(|source| FlowError::StageFailed {
            stage: name.to_string(),
            attempts: 0,
            source,
        })?;

        let policy = self.retry_policy();
        let (output, attempts, used_fallback, warnings) =
            match run_with_retry(policy, name, |_| self.execute(&prepared)).await {
                Ok((output, attempts)) => (output, attempts, false, Vec::new()),
                Err(failure) => match self.fallback(&prepared, &failure.error) {
                    Some(output) => {
                        warn!(
                            stage = %name,
                            attempts = failure.attempts,
                            error = %failure.error,
                            "Using fallback output"
                        );
                        let warning = format!(
                            "fallback used after {} attempt(s): {}",
                            failure.attempts, failure.error
                        );
                        (output, failure.attempts, true, vec![warning])
                    }
                    None => {
                        return Err(FlowError::StageFailed {
                            stage: name.to_string(),
                            attempts: failure.attempts,
                            source: failure.error,
                        });
                    }
                },
            };

        let outcome = self.finalize(ctx, prepared, output);
        Ok(NodeRun {
            outcome,
            attempts,
            used_fallback,
            batch: None,
            warnings,
        })
    }
}

#[async_trait]
impl<C, B> DynBatchStage<C> for B
where
    C: Send,
    B: BatchStage<C>,
{
    fn name(&self) -> &str {
        BatchStage::name(self)
    }

    fn outcomes(&self) -> &'static [Outcome] {
        BatchStage::outcomes(self)
    }

    async fn run(&self, ctx: &mut C) -> Result<NodeRun, FlowError> {
        let name = BatchStage::name(self);
        let items = self.prepare(ctx).map_err(|source| FlowError::StageFailed {
            stage: name.to_string(),
            attempts: 0,
            source,
        })?;

        let policy = self.retry_policy();
        let batch_policy = self.batch_policy();
        let limit = batch_policy.concurrency.max(1);
        debug!(stage = %name, items = items.len(), concurrency = limit, "Fanning out batch");

        let mut slots: Vec<Option<ItemResult<B::ItemOutput>>> =
            std::iter::repeat_with(|| None).take(items.len()).collect();
        let mut max_attempts_used = 0;

        {
            // Boxed up front so the batch future stays Send.
            let futures: Vec<_> = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    async move {
                        let label = format!("{name}[{index}]");
                        let result =
                            run_with_retry(policy, &label, |_| self.execute_item(item)).await;
                        (index, result)
                    }
                    .boxed()
                })
                .collect();
            let mut pending = stream::iter(futures).buffer_unordered(limit);

            while let Some((index, result)) = pending.next().await {
                let item_result = match result {
                    Ok((output, attempts)) => {
                        max_attempts_used = max_attempts_used.max(attempts);
                        ItemResult::Completed(output)
                    }
                    Err(failure) => {
                        max_attempts_used = max_attempts_used.max(failure.attempts);
                        match self.fallback_item(&items[index], &failure.error) {
                            Some(output) => {
                                warn!(
                                    stage = %name,
                                    item = index,
                                    attempts = failure.attempts,
                                    error = %failure.error,
                                    "Item exhausted its retries; using fallback"
                                );
                                ItemResult::Fallback(output)
                            }
                            None if batch_policy.fail_fast => {
                                return Err(FlowError::StageFailed {
                                    stage: format!("{name}[{index}]"),
                                    attempts: failure.attempts,
                                    source: failure.error,
                                });
                            }
                            None => {
                                warn!(
                                    stage = %name,
                                    item = index,
                                    error = %failure.error,
                                    "Item failed without fallback"
                                );
                                ItemResult::Failed(failure.error)
                            }
                        }
                    }
                };
                slots[index] = Some(item_result);
            }
        }

        // Every index is yielded exactly once by the stream above.
        let results: Vec<ItemResult<B::ItemOutput>> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), items.len());

        let summary = BatchSummary {
            total: results.len(),
            completed: results.iter().filter(|r| r.is_completed()).count(),
            fallback: results
                .iter()
                .filter(|r| matches!(r, ItemResult::Fallback(_)))
                .count(),
            failed: results
                .iter()
                .filter(|r| matches!(r, ItemResult::Failed(_)))
                .count(),
        };

        let mut warnings = Vec::new();
        if summary.fallback > 0 {
            warnings.push(format!(
                "{} of {} item(s) used fallback output",
                summary.fallback, summary.total
            ));
        }
        if summary.failed > 0 {
            warnings.push(format!(
                "{} of {} item(s) failed",
                summary.failed, summary.total
            ));
        }

        let outcome = self.finalize(ctx, items, results);
        Ok(NodeRun {
            outcome,
            attempts: max_attempts_used,
            used_fallback: summary.fallback > 0,
            batch: Some(summary),
            warnings,
        })
    }
}
