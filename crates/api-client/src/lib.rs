//! Client for the data API the harvested METARs are fed into.
//!
//! Provides:
//! - `ApiClient`: authenticated access to the METAR and key endpoints,
//!   usable as the feeder's [`ingestion::SubmissionPort`]
//! - `KeyInfo`: the permissions of the configured API key
//! - The API's error document and its mapping onto submission errors

pub mod client;
pub mod error;
pub mod key;

pub use client::ApiClient;
pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, Result};
pub use key::{KeyInfo, CAPABILITY_FEED_METARS};
