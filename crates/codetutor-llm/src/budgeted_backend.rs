//! Call-count budget for any backend

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use codetutor_utils::error::LlmError;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

/// Wraps a backend and refuses calls once `limit` invocations were attempted.
///
/// Failed calls still consume a slot, so engine retries cannot bypass the limit.
pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit, "Creating BudgetedBackend");
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    /// Calls attempted so far, including refused ones
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let current = self.calls.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            let attempted = current + 1;
            warn!(limit = self.limit, attempted, stage = %inv.stage, "Budget limit exceeded");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        debug!(call_count = current + 1, limit = self.limit, "Budget check passed");
        self.inner.invoke(inv).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::time::Duration;

    struct AlwaysOk;

    #[async_trait]
    impl LlmBackend for AlwaysOk {
        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Ok(LlmResult::new("ok", "mock", "mock-model"))
        }
    }

    struct AlwaysDown;

    #[async_trait]
    impl LlmBackend for AlwaysDown {
        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Err(LlmError::ProviderOutage("503".to_string()))
        }
    }

    fn invocation() -> LlmInvocation {
        LlmInvocation::new(
            "chapters",
            "mock-model",
            Duration::from_secs(30),
            vec![Message::user("write")],
        )
    }

    #[tokio::test]
    async fn test_calls_under_limit_pass_through() {
        let backend = BudgetedBackend::new(Box::new(AlwaysOk), 2);

        assert!(backend.invoke(invocation()).await.is_ok());
        assert!(backend.invoke(invocation()).await.is_ok());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_limit_refuses_further_calls() {
        let backend = BudgetedBackend::new(Box::new(AlwaysOk), 1);
        backend.invoke(invocation()).await.unwrap();

        match backend.invoke(invocation()).await {
            Err(LlmError::BudgetExceeded { limit, attempted }) => {
                assert_eq!(limit, 1);
                assert_eq!(attempted, 2);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_calls_consume_budget() {
        let backend = BudgetedBackend::new(Box::new(AlwaysDown), 2);

        assert!(matches!(
            backend.invoke(invocation()).await,
            Err(LlmError::ProviderOutage(_))
        ));
        assert!(backend.invoke(invocation()).await.is_err());
        let refused = backend.invoke(invocation()).await;

        assert!(matches!(refused, Err(LlmError::BudgetExceeded { .. })));
        assert!(!refused.unwrap_err().is_transient());
    }
}
