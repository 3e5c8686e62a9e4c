//! METAR ingestion for the harvester.
//!
//! This crate handles:
//! - Polling the 24 hourly cycle files of the remote archive
//! - Extracting reports and forwarding only ones not seen before
//! - Normalizing reports and feeding them downstream in batches
//! - Persisting dedup state and the feeder queue across restarts

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod feeder;
pub mod normalize;
pub mod pool;
pub mod port;
pub mod worker;

#[cfg(test)]
mod testing;

pub use archive::{ArchiveConnector, ArchiveSession, FtpConnector};
pub use config::{state_dir, FeederConfig, FtpConfig, RetryPolicy, WorkerConfig};
pub use error::{IngestionError, Result};
pub use extract::extract_reports;
pub use feeder::{FeedOutcome, Feeder};
pub use normalize::normalize;
pub use pool::{CycleWorkerPool, StatusBoard};
pub use port::{ReportSink, SubmissionPort, SubmitError, SubmitReceipt};
pub use worker::{CycleStatus, CycleWorker, WorkerState};
