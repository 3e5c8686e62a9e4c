//! Error types for the ingestion crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while polling cycles or feeding reports.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to access local state: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Remote archive error: {0}")]
    Archive(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

/// Run `future` under `timeout`, mapping expiry to [`IngestionError::Timeout`].
pub(crate) async fn with_timeout<F, T>(
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| IngestionError::Timeout { operation, timeout })?
}
