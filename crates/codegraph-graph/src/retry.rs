//! Exponential backoff for transient query faults, mirroring the original
//! FalkorDB client's retry loop (3 attempts, 1s base delay, 2x factor) now
//! applied to SurrealDB connection/timeout errors instead of Redis ones.

use std::time::Duration;

use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(1000);
const BACKOFF_FACTOR: u32 = 2;

/// A fault the backend reports that is worth retrying: connection refused,
/// socket/server timeout. Anything else (syntax error, constraint violation)
/// is permanent and propagates on the first failure (spec §4.1, §7). Shares
/// its classification with `GraphStoreError::is_transient` so the pre-wrap
/// retry decision and the post-wrap caller-facing check never disagree.
fn is_transient(err: &surrealdb::Error) -> bool {
    crate::error::is_transient_message(&err.to_string())
}

pub async fn with_retry<T, F, Fut>(op_name: &str, mut f: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, surrealdb::Error>>,
{
    let mut attempt = 0u32;
    let mut delay = BASE_DELAY;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_RETRIES && is_transient(&err) => {
                attempt += 1;
                warn!(
                    operation = op_name,
                    attempt,
                    max_attempts = MAX_RETRIES,
                    error = %err,
                    "retrying transient graph backend fault"
                );
                tokio::time::sleep(delay).await;
                delay *= BACKOFF_FACTOR;
            }
            Err(err) => {
                return Err(crate::error::GraphStoreError::QueryFailed {
                    attempts: attempt + 1,
                    source: err.into(),
                }
                .into());
            }
        }
    }
}
