//! Fixed-delay retry policy with optional jitter and an optional attempt cap.
//!
//! Transport failures against the ledger are retried where they happen (the
//! lister or the fetcher). Production runs use an unbounded policy; tests
//! inject a bounded one so a dead endpoint surfaces as an error.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::IndexerError;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay between attempts.
    pub delay: Duration,
    /// Add up to `jitter_fraction * delay` extra wait (0.0 = no jitter).
    pub jitter_fraction: f64,
    /// Total attempts allowed; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(250),
            jitter_fraction: 0.0,
            max_attempts: None,
        }
    }
}

/// Stateless retry policy — computes the wait after a given failed attempt.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Retry forever with a fixed delay.
    pub fn unbounded(delay: Duration) -> Self {
        Self::new(RetryConfig {
            delay,
            jitter_fraction: 0.0,
            max_attempts: None,
        })
    }

    /// Give up after `max_attempts` total attempts.
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self::new(RetryConfig {
            delay,
            jitter_fraction: 0.0,
            max_attempts: Some(max_attempts),
        })
    }

    /// Returns the delay to wait after the `attempt`-th failure (1-based),
    /// or `None` if no attempts remain.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.config.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        if self.config.jitter_fraction <= 0.0 {
            return Some(self.config.delay);
        }
        let base_ms = self.config.delay.as_millis() as f64;
        let jitter_ms = base_ms * self.config.jitter_fraction * rand::thread_rng().gen::<f64>();
        Some(Duration::from_millis((base_ms + jitter_ms) as u64))
    }

    /// Run `op` until it succeeds, a non-transient error occurs, or the
    /// policy runs out of attempts.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => match self.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            operation,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(operation, attempt, error = %e, "max attempts exceeded");
                        return Err(IndexerError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}
