//! Stage contracts for the codetutor pipeline
//!
//! This crate defines the two shapes of work the engine knows how to drive:
//!
//! - [`Stage`]: one prepare → execute → finalize lifecycle per invocation
//! - [`BatchStage`]: prepare a list of items, execute each item independently,
//!   then finalize once with every result in prepared order
//!
//! Only `execute` (or `execute_item`) is retried. `prepare` reads the shared
//! context and may fail only with a fatal validation error; `finalize` writes
//! back into the context and cannot fail. Both are synchronous so the context
//! is never borrowed across an await point.
//!
//! # Purpose
//!
//! This crate is the shared contract between the engine and the stage
//! implementations. It contains only the types needed to describe a stage,
//! without pulling in the engine itself.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

pub use codetutor_utils::error::StageError;

/// Label a stage returns from `finalize`; the flow uses it to pick the next stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Outcome(&'static str);

impl Outcome {
    /// Continue to the next stage in sequence
    pub const DEFAULT: Outcome = Outcome("default");

    /// The stage finished but substituted fallback values for some of its work
    pub const DEGRADED: Outcome = Outcome("degraded");

    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Outcome(label)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Bounded retry discipline around `execute`.
///
/// `max_retries` counts attempts after the first one, so a policy of
/// `max_retries = 2` runs `execute` at most three times. `wait` is slept
/// between attempts, never before the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub wait: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, wait: Duration) -> Self {
        Self { max_retries, wait }
    }

    /// Single attempt, no waiting
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            wait: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// How a batch stage fans out over its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Maximum number of items in flight at once (values below 1 behave as 1)
    pub concurrency: usize,
    /// Abort the whole stage on the first item that fails without a fallback
    pub fail_fast: bool,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fail_fast: false,
        }
    }
}

/// Final state of one batch item after its retry budget is spent.
#[derive(Debug)]
pub enum ItemResult<T> {
    /// `execute_item` succeeded on some attempt
    Completed(T),
    /// Attempts were exhausted and the item's fallback value was used
    Fallback(T),
    /// Attempts were exhausted with no fallback (only seen when not fail-fast)
    Failed(StageError),
}

impl<T> ItemResult<T> {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// True for fallback and failed items.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.is_completed()
    }

    /// The produced value, whether real or fallback.
    pub fn into_output(self) -> Option<T> {
        match self {
            Self::Completed(value) | Self::Fallback(value) => Some(value),
            Self::Failed(_) => None,
        }
    }
}

/// A unit of pipeline work over a shared context `C`.
///
/// # Lifecycle
///
/// 1. [`prepare`](Stage::prepare) reads what it needs from the context
/// 2. [`execute`](Stage::execute) does the retryable work on the prepared value
/// 3. on exhaustion, [`fallback`](Stage::fallback) may substitute an output
/// 4. [`finalize`](Stage::finalize) merges the output into the context and
///    returns one of the labels from [`outcomes`](Stage::outcomes)
#[async_trait]
pub trait Stage<C>: Send + Sync {
    type Prepared: Send + Sync;
    type Output: Send;

    /// Unique name within a flow; used in logs, reports and transitions
    fn name(&self) -> &str;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Every label `finalize` may return.
    fn outcomes(&self) -> &'static [Outcome] {
        &[Outcome::DEFAULT]
    }

    fn prepare(&self, ctx: &C) -> Result<Self::Prepared, StageError>;

    async fn execute(&self, prepared: &Self::Prepared) -> Result<Self::Output, StageError>;

    /// Degraded output used once attempts are exhausted. `None` makes the
    /// failure fatal.
    fn fallback(&self, _prepared: &Self::Prepared, _error: &StageError) -> Option<Self::Output> {
        None
    }

    fn finalize(&self, ctx: &mut C, prepared: Self::Prepared, output: Self::Output) -> Outcome;
}

/// A stage that fans out over independently retried items.
///
/// Items never see the context; `finalize` receives every item together with
/// its [`ItemResult`], in the order `prepare` produced them.
#[async_trait]
pub trait BatchStage<C>: Send + Sync {
    type Item: Send + Sync;
    type ItemOutput: Send;

    fn name(&self) -> &str;

    /// Retry budget granted to each item separately
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy::default()
    }

    fn outcomes(&self) -> &'static [Outcome] {
        &[Outcome::DEFAULT]
    }

    fn prepare(&self, ctx: &C) -> Result<Vec<Self::Item>, StageError>;

    async fn execute_item(&self, item: &Self::Item) -> Result<Self::ItemOutput, StageError>;

    fn fallback_item(&self, _item: &Self::Item, _error: &StageError) -> Option<Self::ItemOutput> {
        None
    }

    fn finalize(
        &self,
        ctx: &mut C,
        items: Vec<Self::Item>,
        results: Vec<ItemResult<Self::ItemOutput>>,
    ) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    #[async_trait]
    impl Stage<Vec<u32>> for Counter {
        type Prepared = usize;
        type Output = u32;

        fn name(&self) -> &str {
            "counter"
        }

        fn prepare(&self, ctx: &Vec<u32>) -> Result<usize, StageError> {
            Ok(ctx.len())
        }

        async fn execute(&self, prepared: &usize) -> Result<u32, StageError> {
            Ok(*prepared as u32 * 10)
        }

        fn finalize(&self, ctx: &mut Vec<u32>, _prepared: usize, output: u32) -> Outcome {
            ctx.push(output);
            Outcome::DEFAULT
        }
    }

    #[test]
    fn test_retry_policy_attempts() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
        assert_eq!(
            RetryPolicy::new(3, Duration::from_millis(5)).max_attempts(),
            4
        );
        assert_eq!(RetryPolicy::default(), RetryPolicy::none());
    }

    #[test]
    fn test_batch_policy_default() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.concurrency, 4);
        assert!(!policy.fail_fast);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::DEFAULT.as_str(), "default");
        assert_eq!(Outcome::DEGRADED.to_string(), "degraded");
        assert_eq!(Outcome::new("retry-order"), Outcome::new("retry-order"));
    }

    #[test]
    fn test_item_result_helpers() {
        let done: ItemResult<&str> = ItemResult::Completed("text");
        let degraded: ItemResult<&str> = ItemResult::Fallback("placeholder");
        let failed: ItemResult<&str> = ItemResult::Failed(StageError::malformed("empty"));

        assert!(done.is_completed());
        assert!(degraded.is_degraded());
        assert!(failed.is_degraded());
        assert_eq!(degraded.into_output(), Some("placeholder"));
        assert_eq!(failed.into_output(), None);
    }

    #[tokio::test]
    async fn test_stage_lifecycle_defaults() {
        let stage = Counter;
        let mut ctx = vec![1, 2];

        assert_eq!(stage.outcomes(), &[Outcome::DEFAULT]);
        assert_eq!(stage.retry_policy(), RetryPolicy::none());

        let prepared = stage.prepare(&ctx).unwrap();
        let output = stage.execute(&prepared).await.unwrap();
        assert!(stage.fallback(&prepared, &StageError::malformed("x")).is_none());
        let outcome = stage.finalize(&mut ctx, prepared, output);

        assert_eq!(outcome, Outcome::DEFAULT);
        assert_eq!(ctx, vec![1, 2, 20]);
    }
}
