//! Retry with exponential backoff.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::sanitize::sanitize_message;

/// Backoff policy: the delay before retry `n` is `min(base * 2^n, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Policy without any retry.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(2.0)
            .with_max_times(self.max_retries)
    }

    /// The sequence of delays this policy waits between attempts.
    pub fn delays(&self) -> Vec<Duration> {
        self.backoff().build().collect()
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// On exhaustion the error names the operation, the number of attempts made
/// and the (sanitized) last error.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = AtomicUsize::new(0);

    let result = (|| {
        attempts.fetch_add(1, Ordering::Relaxed);
        op()
    })
    .retry(policy.backoff())
    .sleep(tokio::time::sleep)
    .notify(|err: &anyhow::Error, delay: Duration| {
        tracing::warn!(
            operation,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying..."
        );
    })
    .await;

    result.map_err(|err| {
        anyhow::anyhow!(
            "{} failed after {} attempts: {}",
            operation,
            attempts.load(Ordering::Relaxed),
            sanitize_message(&format!("{:#}", err))
        )
    })
}
