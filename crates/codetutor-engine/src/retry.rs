//! Bounded retry combinator shared by single stages and batch items.

use std::future::Future;

use codetutor_stage_api::{RetryPolicy, StageError};
use tracing::{debug, warn};

/// Last error of an attempt loop that did not succeed.
#[derive(Debug)]
pub struct RetryFailure {
    pub error: StageError,
    pub attempts: u32,
}

/// Run `op` until it succeeds, the policy is exhausted, or it fails with a
/// non-transient error.
///
/// `op` receives the 1-based attempt number. The policy's wait is slept
/// between attempts only. On success the number of attempts used is returned
/// alongside the value.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<(T, u32), RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        debug!(stage = %label, attempt, max_attempts, "Executing attempt");

        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(stage = %label, attempt, "Succeeded after retry");
                }
                return Ok((value, attempt));
            }
            Err(error) if !error.is_transient() => {
                warn!(
                    stage = %label,
                    attempt,
                    error = %error,
                    "Attempt failed with non-transient error; not retrying"
                );
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                });
            }
            Err(error) if attempt >= max_attempts => {
                warn!(
                    stage = %label,
                    attempt,
                    max_attempts,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                });
            }
            Err(error) => {
                warn!(
                    stage = %label,
                    attempt,
                    max_attempts,
                    wait_ms = policy.wait.as_millis() as u64,
                    error = %error,
                    "Attempt failed; retrying"
                );
                if !policy.wait.is_zero() {
                    tokio::time::sleep(policy.wait).await;
                }
                attempt += 1;
            }
        }
    }
}
