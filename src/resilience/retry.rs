use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential-backoff retry for one fallible async operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay in milliseconds before the second attempt.
    pub base_delay_ms: u64,
    /// Growth factor applied to the delay after each attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after a failed `attempt` (1-based).
    /// delay = base_delay_ms * multiplier^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.base_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        Duration::from_millis(ms.min(u64::MAX as f64) as u64)
    }

    /// Total sleep if every attempt but the last fails transiently.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|a| self.delay_for_attempt(a))
            .sum()
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Only errors for which
    /// `is_retryable` returns true trigger a backoff sleep; anything else is
    /// returned immediately.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        is_retryable: impl Fn(&E) -> bool,
        op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_with_hint(label, is_retryable, |_| None, op).await
    }

    /// Like [`run`](Self::run), but an error may ask for a longer wait
    /// (a server `Retry-After`). The sleep is the larger of the hint and the
    /// backoff delay.
    pub async fn run_with_hint<T, E, F, Fut>(
        &self,
        label: &str,
        is_retryable: impl Fn(&E) -> bool,
        wait_hint: impl Fn(&E) -> Option<Duration>,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max && is_retryable(&err) => {
                    let backoff = self.delay_for_attempt(attempt);
                    let delay = wait_hint(&err).map_or(backoff, |hint| hint.max(backoff));
                    tracing::warn!(
                        op = label,
                        attempt,
                        max_attempts = max,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::debug!(op = label, attempt, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }
}
