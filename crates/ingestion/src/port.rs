//! Seams between the ingestion core and its collaborators.

use async_trait::async_trait;
use thiserror::Error;

/// Outcome of an accepted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Positions within the batch the downstream already knew about.
    pub duplicates: Vec<usize>,
}

/// Why a batch was not accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The element at `index` is malformed; the rest of the batch was not
    /// looked at.
    #[error("report at index {index} has an invalid format: {message}")]
    InvalidFormat { index: usize, message: String },

    #[error("batch rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Downstream endpoint accepting batches of normalized reports.
#[async_trait]
pub trait SubmissionPort: Send + Sync {
    async fn submit(&self, batch: &[String]) -> Result<SubmitReceipt, SubmitError>;
}

/// Receives reports a cycle worker has not seen before.
pub trait ReportSink: Send + Sync {
    fn enqueue(&self, reports: Vec<String>);
}
