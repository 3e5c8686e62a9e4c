//! Thread safe FIFO queue holding reports awaiting delivery.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, DecodeLimits};
use crate::error::Result;

/// A simple thread safe FIFO queue.
#[derive(Debug)]
pub struct PersistentQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for PersistentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PersistentQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of queued entries.
    pub fn size(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Push entries to the back of the queue, keeping their order.
    pub fn push<I: IntoIterator<Item = T>>(&self, values: I) {
        self.guard().extend(values);
    }

    /// Put entries back at the front of the queue so that `values[0]` becomes
    /// the new head.
    pub fn push_front(&self, values: Vec<T>) {
        let mut queue = self.guard();
        for value in values.into_iter().rev() {
            queue.push_front(value);
        }
    }

    /// Pop the first entry of the queue.
    pub fn pop(&self) -> Option<T> {
        self.guard().pop_front()
    }

    /// Pop up to `n` entries from the front. Returns fewer when the queue is
    /// shorter.
    pub fn pop_n(&self, n: usize) -> Vec<T> {
        let mut queue = self.guard();
        let take = n.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Consume the queue, returning its entries head first.
    pub fn into_vec(self) -> Vec<T> {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .into()
    }
}

impl<T: Clone> PersistentQueue<T> {
    /// Copy of every queued entry, head first.
    pub fn snapshot(&self) -> Vec<T> {
        self.guard().iter().cloned().collect()
    }
}

impl<T: Serialize> PersistentQueue<T> {
    /// Encode the queue as an ordered CBOR array.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let queue = self.guard();
        let values: Vec<&T> = queue.iter().collect();
        codec::encode_seq(&values)
    }
}

impl<T: DeserializeOwned> PersistentQueue<T> {
    /// Rebuild a queue from a snapshot, preserving the original order.
    pub fn deserialize(bytes: &[u8], limits: &DecodeLimits) -> Result<Self> {
        let values: Vec<T> = codec::decode_seq(bytes, limits)?;
        Ok(Self {
            inner: Mutex::new(values.into()),
        })
    }
}
