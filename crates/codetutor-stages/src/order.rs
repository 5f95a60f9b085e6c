use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, info};

use codetutor_llm::LlmClient;
use codetutor_stage_api::{Outcome, RetryPolicy, Stage, StageError};

use crate::context::SharedContext;
use crate::parse::{IndexRef, parse_yaml};
use crate::prompts;

pub const ORDER_STAGE: &str = "order";

/// Ask the provider for a teaching order over the abstractions.
///
/// Whatever comes back is repaired into a permutation; when the provider
/// cannot be reached the fallback is "no preference", which yields the
/// identity order.
pub struct OrderChapters {
    client: LlmClient,
    retry: RetryPolicy,
}

impl OrderChapters {
    pub fn new(client: LlmClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

pub struct OrderInput {
    prompt: Option<String>,
    abstraction_count: usize,
}

/// Raw order preference as returned by the provider
#[derive(Debug, Clone, Default)]
pub struct OrderPreference(Vec<IndexRef>);

/// Turn `preference` into a permutation of `0..count`.
///
/// Valid first occurrences keep their position; out-of-range or repeated
/// entries are dropped; missing indices are appended in ascending order.
pub(crate) fn repair_order(preference: &[IndexRef], count: usize) -> (Vec<usize>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut seen = BTreeSet::new();
    let mut order = Vec::with_capacity(count);

    for entry in preference {
        match entry.resolve(count) {
            Some(index) if seen.insert(index) => order.push(index),
            Some(index) => warnings.push(format!("dropped repeated chapter index {index}")),
            None => warnings.push(format!("dropped invalid chapter index {entry}")),
        }
    }

    let missing: Vec<usize> = (0..count).filter(|i| !seen.contains(i)).collect();
    if !missing.is_empty() && !preference.is_empty() {
        warnings.push(format!("appended missing chapter indices {missing:?}"));
    }
    order.extend(missing);

    (order, warnings)
}

#[async_trait]
impl Stage<SharedContext> for OrderChapters {
    type Prepared = OrderInput;
    type Output = OrderPreference;

    fn name(&self) -> &str {
        ORDER_STAGE
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn prepare(&self, ctx: &SharedContext) -> Result<OrderInput, StageError> {
        let prompt = (!ctx.abstractions.is_empty()).then(|| {
            prompts::order(
                ctx.project_name_or_default(),
                &ctx.abstractions,
                &ctx.relationships,
                &ctx.language,
            )
        });
        Ok(OrderInput {
            prompt,
            abstraction_count: ctx.abstractions.len(),
        })
    }

    async fn execute(&self, input: &OrderInput) -> Result<OrderPreference, StageError> {
        let Some(prompt) = &input.prompt else {
            debug!("No abstractions, skipping provider call");
            return Ok(OrderPreference::default());
        };
        let response = self.client.complete(ORDER_STAGE, prompt).await?;
        parse_yaml(&response).map(OrderPreference)
    }

    fn fallback(&self, _input: &OrderInput, _error: &StageError) -> Option<OrderPreference> {
        Some(OrderPreference::default())
    }

    fn finalize(
        &self,
        ctx: &mut SharedContext,
        input: OrderInput,
        preference: OrderPreference,
    ) -> Outcome {
        let (order, warnings) = repair_order(&preference.0, input.abstraction_count);
        for warning in warnings {
            ctx.warn(ORDER_STAGE, warning);
        }
        info!(order = ?order, "Chapter order decided");
        ctx.chapter_order = order;
        Outcome::DEFAULT
    }
}
