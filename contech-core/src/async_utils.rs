//! Async utilities
//!
//! The session core itself never times out a remote call; callers that need a
//! bound wrap the operation with [`with_timeout`].

use crate::error::{ContechError, ContechResult, ErrorContext};
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> ContechResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = timeout_ms,
                "Operation timed out"
            );
            Err(ContechError::Timeout {
                operation: operation_name.to_string(),
                duration_ms: timeout_ms,
                context: ErrorContext::new("async_utils")
                    .with_operation("timeout")
                    .with_hint("Check that the identity service is reachable")
                    .with_hint("Increase identity.timeout_seconds"),
            })
        }
    }
}
