//! Cancellation and progress hooks for a running flow.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::report::StageReport;

/// Cooperative cancellation checked by the flow between stage invocations.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives stage lifecycle callbacks from [`Flow::run`](crate::Flow::run).
pub trait FlowObserver: Send + Sync {
    fn stage_started(&self, _name: &str, _step: usize) {}

    fn stage_finished(&self, _report: &StageReport) {}

    fn stage_failed(&self, _name: &str, _error: &str) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FlowObserver for NoopObserver {}
