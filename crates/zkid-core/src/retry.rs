//! Bounded retry with exponential backoff for backend calls.
//!
//! Retries only errors that report themselves as transient through
//! [`Retryable`]. Permanent errors are returned immediately. Every attempt
//! runs under its own timeout; a timed-out attempt counts as transient.
//!
//! Dropping the returned future cancels the in-flight attempt and any
//! pending backoff sleep.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Classifies an error for retry purposes.
pub trait Retryable {
    /// Whether a later attempt might succeed.
    fn is_transient(&self) -> bool;
}

/// Retry schedule. Delays double per attempt: with the defaults,
/// 200ms, 400ms, 800ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries `max_retries` times with no backoff.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Override the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Why a retried operation failed.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The backend reported a non-retryable error.
    #[error("{0}")]
    Permanent(E),
    /// Every attempt failed transiently or timed out.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Description of the final failure.
        last: String,
    },
}

/// Run `f` under `policy`. `operation` names the call in log events.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_retries + 1;
    let mut last = String::new();
    for attempt in 0..attempts {
        match tokio::time::timeout(policy.attempt_timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Ok(Err(e)) => last = e.to_string(),
            Err(_) => last = format!("timed out after {:?}", policy.attempt_timeout),
        }
        if attempt + 1 < attempts {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                operation,
                attempt = attempt + 1,
                max_retries = policy.max_retries,
                "backend call failed, retrying in {delay:?}: {last}"
            );
            tokio::time::sleep(delay).await;
        }
    }
    Err(RetryError::Exhausted { attempts, last })
}
