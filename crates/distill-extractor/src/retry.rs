//! Exponential-backoff retries for oracle calls

use crate::config::ExtractionConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of a retried operation plus how many attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result
    pub result: Result<T, E>,
    /// Attempts made, including the first
    pub attempts: usize,
}

/// Retry policy with doubling backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
    cancel: Option<CancellationToken>,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
            cancel: None,
        }
    }

    /// Policy matching the run configuration
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_ms, config.max_retry_backoff_ms)
    }

    /// Stop waiting between attempts once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Retry `f` while it fails with an error `should_retry` accepts
    ///
    /// A cancelled backoff returns the last error immediately.
    pub async fn retry<F, Fut, T, E, P>(&self, operation_name: &str, should_retry: P, mut f: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    attempt += 1;
                    if !should_retry(&e) || attempt > self.max_retries {
                        if attempt > 1 {
                            warn!(
                                operation = operation_name,
                                attempts = attempt,
                                error = %e,
                                "Operation failed after retries"
                            );
                        }
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );

                    if !self.wait(backoff).await {
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }

                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }

    /// Sleep for `backoff`; false if cancelled first
    async fn wait(&self, backoff: Duration) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = sleep(backoff) => true,
                }
            }
            None => {
                sleep(backoff).await;
                true
            }
        }
    }
}
