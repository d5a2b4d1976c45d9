//! Retry with bounded exponential backoff
//!
//! Used by the asset-manager connector for transient HTTP failures
//! (connection errors, 429, 5xx). Permanent errors fail immediately.

use crate::config::RetryPolicy;
use crate::error::ConnectorError;
use std::time::{Duration, Instant};

/// Run `operation` until it succeeds, fails permanently, or retries run out
///
/// **Backoff:** starts at `policy.initial_backoff`, doubles after every
/// failed attempt, never exceeds `policy.max_backoff`.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ConnectorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ConnectorError>>,
{
    let start_time = Instant::now();
    let mut attempt: u32 = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying request");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Request succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }

                if attempt > policy.max_retries {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Request failed: retries exhausted"
                    );
                    return Err(err);
                }

                let delay = backoff.min(policy.max_backoff);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );

                tokio::time::sleep(delay).await;

                backoff = next_backoff(backoff, policy.max_backoff);
            }
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
