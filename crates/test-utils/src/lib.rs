//! Shared test utilities for the METAR harvester workspace.
//!
//! This crate provides:
//! - A hand-written cycle file with known contents
//! - Generators for synthetic reports and cycle files
//! - A scratch data directory helper
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Scratch directory standing in for the application data directory.
/// Removed when the returned guard is dropped.
pub fn temp_data_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("metar-harvester-")
        .tempdir()
        .unwrap_or_else(|err| panic!("could not create temp data dir: {}", err))
}

/// Assert two collections hold the same elements, ignoring order.
///
/// # Usage
///
/// ```
/// use test_utils::assert_same_elements;
///
/// assert_same_elements!(vec!["b", "a"], vec!["a", "b"]);
/// ```
#[macro_export]
macro_rules! assert_same_elements {
    ($left:expr, $right:expr) => {{
        let mut left: Vec<_> = $left.into_iter().collect();
        let mut right: Vec<_> = $right.into_iter().collect();
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }};
}
