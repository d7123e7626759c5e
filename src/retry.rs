use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run an async operation with jittered exponential backoff.
///
/// Used for provider subprocess invocations only. Generation phases stay
/// fatal on failure; the retries happen inside a single phase attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff_ms = config.backoff_base_ms;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= config.max_attempts => {
                warn!("All {} attempts failed: {}", attempt, e);
                return Err(e);
            }
            Err(e) => {
                let jitter = rand::random::<u64>() % config.backoff_base_ms.max(1);
                let delay = Duration::from_millis(backoff_ms + jitter);
                warn!("Attempt {} failed: {}. Retrying in {:?}...", attempt, e, delay);
                sleep(delay).await;
                backoff_ms = backoff_ms.saturating_mul(2);
            }
        }
    }
}
