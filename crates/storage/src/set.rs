//! Thread safe hash set used to hold the dedup state of a cycle.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, DecodeLimits};
use crate::error::Result;

/// A simple thread safe hash set.
#[derive(Debug, Default)]
pub struct DedupSet<T> {
    inner: Mutex<HashSet<T>>,
}

impl<T: Eq + Hash + Clone> DedupSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashSet::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a value. Returns `true` if it was not present before.
    pub fn add(&self, value: T) -> bool {
        self.guard().insert(value)
    }

    /// Check whether a value is present.
    pub fn contains(&self, value: &T) -> bool {
        self.guard().contains(value)
    }

    /// Number of values in the set.
    pub fn size(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Copy every value out of the set, in no particular order.
    pub fn to_vec(&self) -> Vec<T> {
        self.guard().iter().cloned().collect()
    }

    /// Copy of the underlying set.
    pub fn snapshot(&self) -> HashSet<T> {
        self.guard().clone()
    }

    /// Every value present in exactly one of the two sets.
    ///
    /// This is a symmetric difference: a value that disappeared from `second`
    /// is reported just like one that newly appeared in `first`.
    pub fn diff(first: &Self, second: &Self) -> Self {
        // Each side is copied under its own lock so two diffs running with
        // swapped arguments can never deadlock.
        let first = first.snapshot();
        let second = second.snapshot();
        let diff = first.symmetric_difference(&second).cloned().collect();
        Self {
            inner: Mutex::new(diff),
        }
    }
}

impl<T: Eq + Hash + Clone + Ord + Serialize> DedupSet<T> {
    /// Encode the set as a CBOR array. Values are sorted so equal sets always
    /// produce identical snapshots.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut values = self.to_vec();
        values.sort();
        codec::encode_seq(&values)
    }
}

impl<T: Eq + Hash + Clone + DeserializeOwned> DedupSet<T> {
    /// Decode a set previously produced by [`DedupSet::serialize`].
    pub fn deserialize(bytes: &[u8], limits: &DecodeLimits) -> Result<Self> {
        let values: Vec<T> = codec::decode_seq(bytes, limits)?;
        Ok(values.into_iter().collect())
    }
}

impl<T: Eq + Hash> FromIterator<T> for DedupSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            inner: Mutex::new(iter.into_iter().collect()),
        }
    }
}
