//! Error types shared by the METAR harvester crates.

use thiserror::Error;

/// Result type alias using MetarError.
pub type MetarResult<T> = Result<T, MetarError>;

/// Errors raised while constructing common domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetarError {
    #[error("Invalid cycle hour: {0} (expected 0-23)")]
    InvalidCycle(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
