//! Bounded CBOR encoding for snapshot payloads.
//!
//! Snapshots are plain CBOR arrays. Decoding is bounded by explicit
//! [`DecodeLimits`] so a corrupt or hostile file is rejected before it can
//! make us allocate unbounded memory.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, DeserializeOwned, DeserializeSeed, SeqAccess, Visitor};
use serde::Serialize;

use crate::error::{Result, StorageError};

/// Upper bounds applied while decoding a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum number of elements a decoded array may hold.
    pub max_elements: usize,
    /// Maximum size of the encoded payload in bytes.
    pub max_bytes: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_elements: 300_000,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Encode a sequence of values as a CBOR array.
pub fn encode_seq<T: Serialize>(values: &[T]) -> Result<Vec<u8>> {
    serde_cbor::to_vec(&values).map_err(|err| StorageError::Encode(err.to_string()))
}

/// Decode a CBOR array, enforcing `limits`.
pub fn decode_seq<T: DeserializeOwned>(bytes: &[u8], limits: &DecodeLimits) -> Result<Vec<T>> {
    if bytes.len() > limits.max_bytes {
        return Err(StorageError::TooLarge {
            actual: bytes.len(),
            max: limits.max_bytes,
        });
    }

    let mut deserializer = serde_cbor::Deserializer::from_slice(bytes);
    let values = BoundedSeq::<T>::new(limits.max_elements)
        .deserialize(&mut deserializer)
        .map_err(|err| StorageError::Decode(err.to_string()))?;
    deserializer
        .end()
        .map_err(|err| StorageError::Decode(err.to_string()))?;

    Ok(values)
}

/// Sequence seed that refuses to grow past `max` elements.
struct BoundedSeq<T> {
    max: usize,
    marker: PhantomData<T>,
}

impl<T> BoundedSeq<T> {
    fn new(max: usize) -> Self {
        Self {
            max,
            marker: PhantomData,
        }
    }
}

impl<'de, T: DeserializeOwned> DeserializeSeed<'de> for BoundedSeq<T> {
    type Value = Vec<T>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, T: DeserializeOwned> Visitor<'de> for BoundedSeq<T> {
    type Value = Vec<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an array of at most {} elements", self.max)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let hint = seq.size_hint().unwrap_or(0);
        if hint > self.max {
            return Err(de::Error::invalid_length(hint, &self));
        }

        // Indefinite-length arrays give no hint, so cap the up-front allocation.
        let mut values = Vec::with_capacity(hint.min(4096));
        while let Some(value) = seq.next_element::<T>()? {
            if values.len() == self.max {
                return Err(de::Error::invalid_length(self.max + 1, &self));
            }
            values.push(value);
        }
        Ok(values)
    }
}
