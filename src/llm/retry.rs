//! Retry policy for provider calls
//!
//! One policy object decides how many attempts a send gets, how long to
//! wait between them, and which failures are worth another attempt.

use super::LlmError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How the delay between attempts evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt
    Exponential,
}

/// Which failures trigger another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryOn {
    /// Every failure, whatever its cause
    Any,
    /// Only failures where [`LlmError::is_transient`] holds
    #[default]
    Transient,
}

impl RetryOn {
    fn allows(self, error: &LlmError) -> bool {
        match self {
            RetryOn::Any => true,
            RetryOn::Transient => error.is_transient(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 behave as 1
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    /// One retry after a fixed one-second pause
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_millis(1000),
            backoff: Backoff::Fixed,
            retry_on: RetryOn::Transient,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Zero-delay policy retrying any failure, for tests and scripted runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            retry_on: RetryOn::Any,
        }
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        }
    }

    /// Run `operation` until it succeeds, a failure is not retryable, or
    /// attempts run out. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let attempts_left = max_attempts - attempt;
                    if attempts_left == 0 {
                        return Err(e);
                    }
                    if !self.retry_on.allows(&e) {
                        tracing::debug!("Not retrying permanent failure: {}", e);
                        return Err(e);
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        error = %e,
                        attempts_left,
                        delay_ms = delay.as_millis() as u64,
                        "Gemini API call failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
