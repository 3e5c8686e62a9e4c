//! Common types and utilities shared across the METAR harvester crates.

pub mod cycle;
pub mod error;

pub use cycle::{Cycle, CYCLE_COUNT};
pub use error::{MetarError, MetarResult};

