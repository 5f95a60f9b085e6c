use std::sync::Arc;
use std::time::Duration;

use codetutor_utils::error::LlmError;

use crate::types::{LlmBackend, LlmInvocation, Message};

/// Prompt-in, text-out handle shared by every stage.
///
/// Cloning is cheap; all clones share the backend (and therefore its budget).
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// An empty `model` defers to the backend's configured default.
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a single user prompt and return the raw completion text.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`LlmError`] unchanged so callers can decide
    /// whether it is worth retrying.
    pub async fn complete(&self, stage: &str, prompt: &str) -> Result<String, LlmError> {
        let inv = LlmInvocation::new(
            stage,
            self.model.clone(),
            self.timeout,
            vec![Message::user(prompt)],
        );
        let result = self.backend.invoke(inv).await?;
        Ok(result.raw_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<LlmInvocation>>,
    }

    #[async_trait]
    impl LlmBackend for Recording {
        async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            let reply = format!("echo: {}", inv.messages[0].content);
            self.seen.lock().unwrap().push(inv);
            Ok(LlmResult::new(reply, "mock", "m"))
        }
    }

    #[tokio::test]
    async fn test_complete_sends_single_user_message() {
        let backend = Arc::new(Recording::default());
        let client = LlmClient::new(backend.clone(), "", Duration::from_secs(9));

        let text = client.complete("identify", "list abstractions").await.unwrap();

        assert_eq!(text, "echo: list abstractions");
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stage, "identify");
        assert_eq!(seen[0].timeout, Duration::from_secs(9));
        assert!(seen[0].model.is_empty());
    }
}
