//! Bounded retry for fallible async operations.
//!
//! Every network call site in the client goes through [`retry`]. The helper
//! only counts attempts: it never sleeps between them, and it never inspects
//! the error. Callers that want a backoff put it around the call.

use std::fmt::Display;
use std::future::Future;

use tracing::debug;

/// Run `op` until it succeeds, at most `retry_count + 1` times.
///
/// Returns the first success, or the error of the final attempt when every
/// attempt fails.
///
/// # Example
///
/// ```ignore
/// let resp = retry(config.server.retry_count, || client.get_cert(&domains)).await?;
/// ```
pub async fn retry<T, E, F, Fut>(retry_count: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt > retry_count => return Err(e),
            Err(e) => {
                debug!(
                    attempt = attempt,
                    retry_count = retry_count,
                    error = %e,
                    "Attempt failed, retrying"
                );
            }
        }
    }
}
