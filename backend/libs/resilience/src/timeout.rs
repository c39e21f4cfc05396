/// Timeout wrapper for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("{operation} timed out after {after:?}")]
    Elapsed {
        operation: &'static str,
        after: Duration,
    },
    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },
}

impl TimeoutError {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed { .. })
    }
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(
    operation: &'static str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future).await.map_err(|_| {
        tracing::debug!(operation, timeout_ms = duration.as_millis() as u64, "operation timed out");
        TimeoutError::Elapsed {
            operation,
            after: duration,
        }
    })
}

/// Execute a fallible future with timeout
pub async fn with_timeout_result<F, T, E>(
    operation: &'static str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match with_timeout(operation, duration, future).await? {
        Ok(result) => Ok(result),
        Err(e) => Err(TimeoutError::OperationFailed {
            operation,
            message: e.to_string(),
        }),
    }
}
