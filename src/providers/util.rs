use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs a request closure up to `1 + retries` times, sleeping `delay_ms`
/// between attempts. Only transport-level errors are retried; a response
/// carrying an HTTP error status counts as a completed request here.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    for attempt in 1..=retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!("Request attempt {attempt}/{retries} failed: {err}. Retrying...");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
    operation().await.map_err(Error::from)
}
