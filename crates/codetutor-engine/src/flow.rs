//! Flow orchestration over a shared context.
//!
//! A [`Flow`] is an ordered list of stage nodes plus a transition table keyed
//! by `(stage, outcome)`. The cursor starts at the first stage. After each
//! invocation the returned label is looked up in the table; a declared label
//! without a registered transition falls through to the next stage in
//! sequence. The run ends when the cursor moves past the last stage.
//!
//! Labels are strict: the builder rejects transitions on labels the stage
//! never declares, and returning an undeclared label at run time is fatal.
//! The flow itself never retries; retry is the business of each node.

use std::collections::HashMap;
use std::time::Instant;

use tracing::Instrument;

use codetutor_stage_api::{BatchStage, Outcome, Stage};
use codetutor_utils::error::FlowError;
use codetutor_utils::logging::{log_stage_complete, log_stage_error, log_stage_start, stage_span};

use crate::node::StageNode;
use crate::observer::{CancellationFlag, FlowObserver};
use crate::report::{FlowReport, StageReport};

/// Default bound on stage invocations per run.
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Builder for [`Flow`].
///
/// Validation happens in [`build`](Self::build) so stages and transitions can
/// be declared in any order.
#[must_use]
pub struct FlowBuilder<C> {
    nodes: Vec<StageNode<C>>,
    transitions: Vec<(String, Outcome, String)>,
    max_steps: usize,
}

impl<C: Send + 'static> Default for FlowBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + 'static> FlowBuilder<C> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            transitions: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Append a single stage to the sequence.
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<C> + 'static,
    {
        self.nodes.push(StageNode::Single(Box::new(stage)));
        self
    }

    /// Append a batch stage to the sequence.
    pub fn batch<B>(mut self, stage: B) -> Self
    where
        B: BatchStage<C> + 'static,
    {
        self.nodes.push(StageNode::Batch(Box::new(stage)));
        self
    }

    /// Route `outcome` returned by stage `from` to stage `to`.
    pub fn transition(mut self, from: &str, outcome: Outcome, to: &str) -> Self {
        self.transitions
            .push((from.to_string(), outcome, to.to_string()));
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Validate stage names and transitions.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Empty`] when no stage was registered
    /// - [`FlowError::DuplicateStage`] when two stages share a name
    /// - [`FlowError::UnknownStage`] when a transition names a missing stage
    /// - [`FlowError::UnknownTransitionLabel`] when the source stage never
    ///   returns the transition's label
    pub fn build(self) -> Result<Flow<C>, FlowError> {
        if self.nodes.is_empty() {
            return Err(FlowError::Empty);
        }

        let mut index = HashMap::new();
        for (position, node) in self.nodes.iter().enumerate() {
            if index.insert(node.name().to_string(), position).is_some() {
                return Err(FlowError::DuplicateStage {
                    name: node.name().to_string(),
                });
            }
        }

        let lookup = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| FlowError::UnknownStage {
                    name: name.to_string(),
                })
        };

        let mut transitions = HashMap::new();
        for (from, outcome, to) in &self.transitions {
            let from_index = lookup(from)?;
            let to_index = lookup(to)?;
            if !self.nodes[from_index].outcomes().contains(outcome) {
                return Err(FlowError::UnknownTransitionLabel {
                    stage: from.clone(),
                    outcome: outcome.to_string(),
                });
            }
            transitions.insert((from_index, *outcome), to_index);
        }

        Ok(Flow {
            nodes: self.nodes,
            transitions,
            max_steps: self.max_steps,
        })
    }
}

/// A validated pipeline ready to run against a context.
pub struct Flow<C> {
    nodes: Vec<StageNode<C>>,
    transitions: HashMap<(usize, Outcome), usize>,
    max_steps: usize,
}

impl<C: Send + 'static> Flow<C> {
    pub fn builder() -> FlowBuilder<C> {
        FlowBuilder::new()
    }

    /// Stage names in registration order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.nodes.iter().map(StageNode::name).collect()
    }

    /// Drive the context through the flow.
    ///
    /// Cancellation is checked before every stage invocation. The first fatal
    /// failure stops the run and is returned with the originating stage.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StageFailed`] for exhausted stages without a
    /// fallback, [`FlowError::UndeclaredOutcome`] for labels outside a stage's
    /// declared set, [`FlowError::StepLimitExceeded`] when a transition loop
    /// runs past `max_steps`, and [`FlowError::Cancelled`] when `cancel` is set.
    pub async fn run(
        &self,
        ctx: &mut C,
        cancel: &CancellationFlag,
        observer: &dyn FlowObserver,
    ) -> Result<FlowReport, FlowError> {
        let started = Instant::now();
        let mut stages = Vec::new();
        let mut cursor = 0;
        let mut step = 0;

        while let Some(node) = self.nodes.get(cursor) {
            let name = node.name();

            if cancel.is_cancelled() {
                tracing::warn!(stage = %name, "Run cancelled before stage");
                return Err(FlowError::Cancelled {
                    next_stage: name.to_string(),
                });
            }
            if step >= self.max_steps {
                return Err(FlowError::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }

            observer.stage_started(name, step);
            log_stage_start(name, step);
            let stage_started = Instant::now();

            let run = node.run(ctx).instrument(stage_span(name, step)).await;
            let duration = stage_started.elapsed();

            let run = match run {
                Ok(run) => run,
                Err(err) => {
                    let message = err.to_string();
                    log_stage_error(name, &message, duration.as_millis());
                    observer.stage_failed(name, &message);
                    return Err(err);
                }
            };

            if !node.outcomes().contains(&run.outcome) {
                let err = FlowError::UndeclaredOutcome {
                    stage: name.to_string(),
                    outcome: run.outcome.to_string(),
                };
                observer.stage_failed(name, &err.to_string());
                return Err(err);
            }

            log_stage_complete(name, run.outcome.as_str(), duration.as_millis());
            let report = StageReport {
                name: name.to_string(),
                step,
                outcome: run.outcome,
                attempts: run.attempts,
                duration,
                used_fallback: run.used_fallback,
                batch: run.batch,
                warnings: run.warnings,
            };
            observer.stage_finished(&report);

            cursor = self
                .transitions
                .get(&(cursor, report.outcome))
                .copied()
                .unwrap_or(cursor + 1);
            stages.push(report);
            step += 1;
        }

        Ok(FlowReport {
            stages,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use crate::report::RunStatus;
    use async_trait::async_trait;
    use codetutor_stage_api::{BatchPolicy, ItemResult, RetryPolicy, StageError};
    use codetutor_utils::error::LlmError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Trace {
        visited: Vec<String>,
        values: Vec<String>,
    }

    fn outage() -> StageError {
        StageError::Provider(LlmError::ProviderOutage("503".to_string()))
    }

    /// Records its name, optionally failing the first `failures` attempts.
    struct Step {
        name: &'static str,
        outcome: Outcome,
        declared: &'static [Outcome],
        failures: u32,
        retries: u32,
        fallback: Option<&'static str>,
        calls: AtomicU32,
    }

    impl Step {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                outcome: Outcome::DEFAULT,
                declared: &[Outcome::DEFAULT],
                failures: 0,
                retries: 0,
                fallback: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Stage<Trace> for Step {
        type Prepared = ();
        type Output = String;

        fn name(&self) -> &str {
            self.name
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::new(self.retries, Duration::ZERO)
        }

        fn outcomes(&self) -> &'static [Outcome] {
            self.declared
        }

        fn prepare(&self, _ctx: &Trace) -> Result<(), StageError> {
            Ok(())
        }

        async fn execute(&self, _prepared: &()) -> Result<String, StageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(outage())
            } else {
                Ok(format!("{}-ok", self.name))
            }
        }

        fn fallback(&self, _prepared: &(), _error: &StageError) -> Option<String> {
            self.fallback.map(str::to_string)
        }

        fn finalize(&self, ctx: &mut Trace, _prepared: (), output: String) -> Outcome {
            ctx.visited.push(self.name.to_string());
            ctx.values.push(output);
            self.outcome
        }
    }

    /// Loops back to itself until it has run `until` times.
    struct Looper {
        until: usize,
    }

    const AGAIN: Outcome = Outcome::new("again");

    #[async_trait]
    impl Stage<Trace> for Looper {
        type Prepared = usize;
        type Output = ();

        fn name(&self) -> &str {
            "looper"
        }

        fn outcomes(&self) -> &'static [Outcome] {
            &[Outcome::DEFAULT, AGAIN]
        }

        fn prepare(&self, ctx: &Trace) -> Result<usize, StageError> {
            Ok(ctx.visited.iter().filter(|v| *v == "looper").count())
        }

        async fn execute(&self, _prepared: &usize) -> Result<(), StageError> {
            Ok(())
        }

        fn finalize(&self, ctx: &mut Trace, prepared: usize, _output: ()) -> Outcome {
            ctx.visited.push("looper".to_string());
            if prepared + 1 < self.until {
                AGAIN
            } else {
                Outcome::DEFAULT
            }
        }
    }

    /// Uppercases each item; items listed in `flaky` always fail.
    struct Shout {
        items: Vec<&'static str>,
        flaky: Vec<&'static str>,
        with_fallback: bool,
        fail_fast: bool,
        concurrency: usize,
        in_flight: AtomicU32,
        peak: AtomicU32,
    }

    impl Shout {
        fn new(items: Vec<&'static str>, flaky: Vec<&'static str>) -> Self {
            Self {
                items,
                flaky,
                with_fallback: true,
                fail_fast: false,
                concurrency: 4,
                in_flight: AtomicU32::new(0),
                peak: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BatchStage<Trace> for Shout {
        type Item = &'static str;
        type ItemOutput = String;

        fn name(&self) -> &str {
            "shout"
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::new(2, Duration::ZERO)
        }

        fn batch_policy(&self) -> BatchPolicy {
            BatchPolicy {
                concurrency: self.concurrency,
                fail_fast: self.fail_fast,
            }
        }

        fn outcomes(&self) -> &'static [Outcome] {
            &[Outcome::DEFAULT, Outcome::DEGRADED]
        }

        fn prepare(&self, _ctx: &Trace) -> Result<Vec<&'static str>, StageError> {
            Ok(self.items.clone())
        }

        async fn execute_item(&self, item: &&'static str) -> Result<String, StageError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // Later items finish first so merge order is exercised.
            let delay = 5 * (self.items.len() - self.items.iter().position(|i| i == item).unwrap_or(0));
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.flaky.contains(item) {
                Err(outage())
            } else {
                Ok(item.to_uppercase())
            }
        }

        fn fallback_item(&self, item: &&'static str, _error: &StageError) -> Option<String> {
            self.with_fallback.then(|| format!("placeholder:{item}"))
        }

        fn finalize(
            &self,
            ctx: &mut Trace,
            _items: Vec<&'static str>,
            results: Vec<ItemResult<String>>,
        ) -> Outcome {
            let degraded = results.iter().any(ItemResult::is_degraded);
            ctx.visited.push("shout".to_string());
            for result in results {
                ctx.values
                    .push(result.into_output().unwrap_or_else(|| "<failed>".to_string()));
            }
            if degraded {
                Outcome::DEGRADED
            } else {
                Outcome::DEFAULT
            }
        }
    }

    async fn run(flow: &Flow<Trace>) -> (Trace, Result<FlowReport, FlowError>) {
        let mut ctx = Trace::default();
        let result = flow
            .run(&mut ctx, &CancellationFlag::new(), &NoopObserver)
            .await;
        (ctx, result)
    }

    #[tokio::test]
    async fn test_sequential_order_without_transitions() {
        let flow = Flow::<Trace>::builder()
            .stage(Step::new("a"))
            .stage(Step::new("b"))
            .stage(Step::new("c"))
            .build()
            .unwrap();

        let (ctx, report) = run(&flow).await;
        let report = report.unwrap();

        assert_eq!(ctx.visited, vec!["a", "b", "c"]);
        assert_eq!(report.stages.len(), 3);
        assert_eq!(report.status(), RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_transition_skips_stage() {
        const SKIP: Outcome = Outcome::new("skip");
        let mut first = Step::new("a");
        first.outcome = SKIP;
        first.declared = &[Outcome::DEFAULT, SKIP];

        let flow = Flow::<Trace>::builder()
            .stage(first)
            .stage(Step::new("b"))
            .stage(Step::new("c"))
            .transition("a", SKIP, "c")
            .build()
            .unwrap();

        let (ctx, _) = run(&flow).await;
        assert_eq!(ctx.visited, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_loop_transition_until_default() {
        let flow = Flow::<Trace>::builder()
            .stage(Looper { until: 3 })
            .stage(Step::new("after"))
            .transition("looper", AGAIN, "looper")
            .build()
            .unwrap();

        let (ctx, report) = run(&flow).await;
        assert_eq!(ctx.visited, vec!["looper", "looper", "looper", "after"]);
        assert_eq!(report.unwrap().stages.len(), 4);
    }

    #[tokio::test]
    async fn test_step_limit_stops_runaway_loop() {
        let flow = Flow::<Trace>::builder()
            .stage(Looper { until: usize::MAX })
            .transition("looper", AGAIN, "looper")
            .max_steps(5)
            .build()
            .unwrap();

        let (ctx, result) = run(&flow).await;
        assert!(matches!(
            result,
            Err(FlowError::StepLimitExceeded { limit: 5 })
        ));
        assert_eq!(ctx.visited.len(), 5);
    }

    #[tokio::test]
    async fn test_undeclared_outcome_is_fatal() {
        let mut rogue = Step::new("rogue");
        rogue.outcome = Outcome::new("surprise");

        let flow = Flow::<Trace>::builder()
            .stage(rogue)
            .stage(Step::new("never"))
            .build()
            .unwrap();

        let (ctx, result) = run(&flow).await;
        match result {
            Err(FlowError::UndeclaredOutcome { stage, outcome }) => {
                assert_eq!(stage, "rogue");
                assert_eq!(outcome, "surprise");
            }
            other => panic!("expected UndeclaredOutcome, got {other:?}"),
        }
        assert_eq!(ctx.visited, vec!["rogue"]);
    }

    #[test]
    fn test_builder_rejects_bad_definitions() {
        assert!(matches!(
            FlowBuilder::<Trace>::new().build(),
            Err(FlowError::Empty)
        ));

        let duplicate = Flow::<Trace>::builder()
            .stage(Step::new("a"))
            .stage(Step::new("a"))
            .build();
        assert!(matches!(duplicate, Err(FlowError::DuplicateStage { .. })));

        let unknown_target = Flow::<Trace>::builder()
            .stage(Step::new("a"))
            .transition("a", Outcome::DEFAULT, "missing")
            .build();
        assert!(matches!(unknown_target, Err(FlowError::UnknownStage { .. })));

        let undeclared_label = Flow::<Trace>::builder()
            .stage(Step::new("a"))
            .stage(Step::new("b"))
            .transition("a", Outcome::new("typo"), "b")
            .build();
        assert!(matches!(
            undeclared_label,
            Err(FlowError::UnknownTransitionLabel { .. })
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let mut flaky = Step::new("flaky");
        flaky.failures = 2;
        flaky.retries = 2;

        let flow = Flow::<Trace>::builder().stage(flaky).build().unwrap();
        let (ctx, report) = run(&flow).await;
        let report = report.unwrap();

        assert_eq!(ctx.values, vec!["flaky-ok"]);
        assert_eq!(report.stages[0].attempts, 3);
        assert!(!report.stages[0].used_fallback);
    }

    #[tokio::test]
    async fn test_exhaustion_without_fallback_stops_flow() {
        let mut broken = Step::new("broken");
        broken.failures = 10;
        broken.retries = 1;

        let flow = Flow::<Trace>::builder()
            .stage(Step::new("before"))
            .stage(broken)
            .stage(Step::new("after"))
            .build()
            .unwrap();

        let (ctx, result) = run(&flow).await;
        match result {
            Err(FlowError::StageFailed {
                stage, attempts, ..
            }) => {
                assert_eq!(stage, "broken");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
        assert_eq!(ctx.visited, vec!["before"]);
    }

    #[tokio::test]
    async fn test_exhaustion_with_fallback_continues() {
        let mut broken = Step::new("broken");
        broken.failures = 10;
        broken.retries = 1;
        broken.fallback = Some("fallback-value");

        let flow = Flow::<Trace>::builder()
            .stage(broken)
            .stage(Step::new("after"))
            .build()
            .unwrap();

        let (ctx, report) = run(&flow).await;
        let report = report.unwrap();

        assert_eq!(ctx.values, vec!["fallback-value", "after-ok"]);
        assert!(report.stages[0].used_fallback);
        assert_eq!(report.status(), RunStatus::SucceededWithWarnings);
    }

    #[tokio::test]
    async fn test_cancellation_checked_between_stages() {
        struct CancelAfterFirst(CancellationFlag);
        impl FlowObserver for CancelAfterFirst {
            fn stage_finished(&self, _report: &StageReport) {
                self.0.cancel();
            }
        }

        let flow = Flow::<Trace>::builder()
            .stage(Step::new("a"))
            .stage(Step::new("b"))
            .build()
            .unwrap();

        let cancel = CancellationFlag::new();
        let observer = CancelAfterFirst(cancel.clone());
        let mut ctx = Trace::default();
        let result = flow.run(&mut ctx, &cancel, &observer).await;

        match result {
            Err(FlowError::Cancelled { next_stage }) => assert_eq!(next_stage, "b"),
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(ctx.visited, vec!["a"]);
    }

    #[tokio::test]
    async fn test_batch_merges_in_prepared_order_with_fallback() {
        let flow = Flow::<Trace>::builder()
            .batch(Shout::new(vec!["one", "two", "three"], vec!["two"]))
            .stage(Step::new("after"))
            .build()
            .unwrap();

        let (ctx, report) = run(&flow).await;
        let report = report.unwrap();

        assert_eq!(
            ctx.values,
            vec!["ONE", "placeholder:two", "THREE", "after-ok"]
        );
        let shout = report.stage("shout").unwrap();
        assert_eq!(shout.outcome, Outcome::DEGRADED);
        let summary = shout.batch.unwrap();
        assert_eq!((summary.completed, summary.fallback, summary.failed), (2, 1, 0));
        assert_eq!(shout.attempts, 3);
        assert_eq!(report.status(), RunStatus::SucceededWithWarnings);
    }

    #[tokio::test]
    async fn test_batch_failed_item_isolated_without_fallback() {
        let mut stage = Shout::new(vec!["one", "two"], vec!["one"]);
        stage.with_fallback = false;

        let flow = Flow::<Trace>::builder().batch(stage).build().unwrap();
        let (ctx, report) = run(&flow).await;

        assert_eq!(ctx.values, vec!["<failed>", "TWO"]);
        assert_eq!(report.unwrap().stages[0].batch.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_batch_fail_fast_aborts_stage() {
        let mut stage = Shout::new(vec!["one", "two"], vec!["two"]);
        stage.with_fallback = false;
        stage.fail_fast = true;

        let flow = Flow::<Trace>::builder()
            .batch(stage)
            .stage(Step::new("after"))
            .build()
            .unwrap();
        let (ctx, result) = run(&flow).await;

        assert!(matches!(result, Err(FlowError::StageFailed { .. })));
        assert!(ctx.visited.is_empty());
    }

    #[tokio::test]
    async fn test_batch_respects_concurrency_limit() {
        use crate::node::DynBatchStage;

        let mut stage = Shout::new(vec!["a", "b", "c", "d", "e"], vec![]);
        stage.concurrency = 2;
        let mut ctx = Trace::default();

        DynBatchStage::run(&stage, &mut ctx).await.unwrap();

        let peak = stage.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency {peak} exceeded limit");
        assert_eq!(ctx.values, vec!["A", "B", "C", "D", "E"]);
    }

    #[tokio::test]
    async fn test_batch_flow_runs_on_spawned_task() {
        let flow = Flow::<Trace>::builder()
            .batch(Shout::new(vec!["one", "two", "three"], vec![]))
            .build()
            .unwrap();

        let handle = tokio::spawn(async move {
            let mut ctx = Trace::default();
            let report = flow
                .run(&mut ctx, &CancellationFlag::new(), &NoopObserver)
                .await;
            (ctx.values, report.map(|report| report.status()))
        });

        let (values, status) = handle.await.unwrap();
        assert_eq!(values, vec!["ONE", "TWO", "THREE"]);
        assert_eq!(status.unwrap(), RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_observer_sees_every_stage() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<String>>);
        impl FlowObserver for Recorder {
            fn stage_started(&self, name: &str, step: usize) {
                self.0.lock().unwrap().push(format!("start:{name}:{step}"));
            }
            fn stage_finished(&self, report: &StageReport) {
                self.0
                    .lock()
                    .unwrap()
                    .push(format!("finish:{}:{}", report.name, report.outcome));
            }
        }

        let flow = Flow::<Trace>::builder()
            .stage(Step::new("a"))
            .stage(Step::new("b"))
            .build()
            .unwrap();
        let recorder = Recorder::default();
        let mut ctx = Trace::default();
        flow.run(&mut ctx, &CancellationFlag::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "start:a:0",
                "finish:a:default",
                "start:b:1",
                "finish:b:default"
            ]
        );
    }
}
