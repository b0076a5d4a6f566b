//! Exponential backoff for rate-limited model calls.
//!
//! Only [`LlmError::RateLimited`] is retried. Quota exhaustion, auth
//! failures and upstream errors are terminal and surface immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::llm::LlmError;

const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 30_000;

/// Delay before the retry that follows `attempt` (1-based).
fn delay_for_attempt(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(exp.min(MAX_DELAY_MS))
}

/// Runs `operation` up to `max_retries` times, sleeping between attempts
/// that fail with [`LlmError::RateLimited`]. If every attempt is rate
/// limited the error is converted to [`LlmError::RetriesExhausted`].
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = max_retries.max(1);
    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(LlmError::RateLimited) if attempt < max_attempts => {
                let delay = delay_for_attempt(attempt);
                warn!(
                    event_name = "agent.backoff.rate_limited",
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "model call rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(LlmError::RateLimited) => {
                return Err(LlmError::RetriesExhausted {
                    attempts: max_attempts,
                })
            }
            Err(other) => return Err(other),
        }
    }
    unreachable!("retry loop always returns")
}
