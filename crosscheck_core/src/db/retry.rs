//! Retry wrapper for transient database failures, with exponential
//! backoff capped at two seconds.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const BASE_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 2_000;

/// Run an operation, retrying on transient errors only.
pub async fn with_retry<F, Fut, T>(label: &str, max_attempts: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let backoff = (BASE_BACKOFF_MS * 2_u64.pow(attempt - 1)).min(MAX_BACKOFF_MS);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                    label, attempt, max_attempts, e, backoff
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &anyhow::Error) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("connection")
        || msg.contains("timeout")
        || msg.contains("broken pipe")
        || msg.contains("deadlock detected")
        || msg.contains("could not serialize")
        || msg.contains("too many clients")
        || msg.contains("server closed the connection")
}
