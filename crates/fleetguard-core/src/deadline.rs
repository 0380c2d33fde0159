//! Deadline wrapper for durable-store calls.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::result::AppResult;

/// Runs a store operation under `limit`.
///
/// An elapsed deadline surfaces as [`ErrorKind::Timeout`](crate::error::ErrorKind::Timeout)
/// naming the operation. Callers decide whether that fails open or closed.
pub async fn with_deadline<T, F>(limit: Duration, operation: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(format!(
            "{operation} did not complete within {}ms",
            limit.as_millis()
        ))),
    }
}
