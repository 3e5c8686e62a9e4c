//! Error types for the storage crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while encoding, decoding or persisting snapshots.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot path is not a file: {0}")]
    NotAFile(PathBuf),

    #[error("Failed to encode snapshot: {0}")]
    Encode(String),

    #[error("Failed to decode snapshot: {0}")]
    Decode(String),

    #[error("Snapshot too large ({actual} > {max} bytes)")]
    TooLarge { actual: usize, max: usize },
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
