//! Transparent retry for transient transport failures.
//!
//! Connection and timeout errors are retried with linear backoff. HTTP
//! status errors are never retried here — the CRM saw the request, and
//! write operations must not be replayed.

use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;

/// Send a request, retrying transient transport failures.
///
/// `attempt` is called up to [`MAX_ATTEMPTS`] times. Only `reqwest` errors
/// classified as connect or timeout failures trigger a retry.
pub(crate) async fn retry_send<F, Fut>(mut attempt: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Ok(response) => return Ok(response),
            Err(err) if tries < MAX_ATTEMPTS && (err.is_connect() || err.is_timeout()) => {
                tracing::warn!(
                    attempt = tries,
                    error = %err,
                    "transient CRM transport failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(100 * u64::from(tries))).await;
            }
            Err(err) => return Err(err),
        }
    }
}
