//! Storage primitives for the METAR harvester.
//!
//! Provides:
//! - `DedupSet`: a synchronized set with symmetric difference
//! - `PersistentQueue`: a synchronized FIFO queue
//! - A bounded CBOR codec used to snapshot both
//! - Atomic snapshot files where a missing file means empty state

pub mod codec;
pub mod error;
pub mod queue;
pub mod set;
pub mod snapshot;

pub use codec::DecodeLimits;
pub use error::{Result, StorageError};
pub use queue::PersistentQueue;
pub use set::DedupSet;
pub use snapshot::{load_queue, load_set, read_snapshot, save_queue, save_set, write_snapshot};
