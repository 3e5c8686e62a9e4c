//! Snapshot files on local disk.
//!
//! A missing snapshot is never an error: it simply means there is no state
//! yet. Writes go to a temporary sibling first and are renamed into place so
//! a crash mid-write never leaves a truncated snapshot behind.

use std::hash::Hash;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::codec::DecodeLimits;
use crate::error::{Result, StorageError};
use crate::queue::PersistentQueue;
use crate::set::DedupSet;

/// Read a snapshot file. Returns `None` if it does not exist. Files larger
/// than `limits.max_bytes` are rejected without being read.
pub async fn read_snapshot(path: &Path, limits: &DecodeLimits) -> Result<Option<Vec<u8>>> {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if metadata.is_dir() {
        return Err(StorageError::NotAFile(path.to_path_buf()));
    }
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if size > limits.max_bytes {
        return Err(StorageError::TooLarge {
            actual: size,
            max: limits.max_bytes,
        });
    }

    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Write a snapshot file, creating parent directories and replacing any
/// previous snapshot.
pub async fn write_snapshot(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;

    debug!(path = %path.display(), bytes = contents.len(), "Wrote snapshot");
    Ok(())
}

/// Load a set snapshot, falling back to an empty set if none exists.
pub async fn load_set<T>(path: &Path, limits: &DecodeLimits) -> Result<DedupSet<T>>
where
    T: Eq + Hash + Clone + DeserializeOwned,
{
    match read_snapshot(path, limits).await? {
        Some(bytes) => DedupSet::deserialize(&bytes, limits),
        None => Ok(DedupSet::new()),
    }
}

/// Persist a set snapshot.
pub async fn save_set<T>(path: &Path, set: &DedupSet<T>) -> Result<()>
where
    T: Eq + Hash + Clone + Ord + Serialize,
{
    let bytes = set.serialize()?;
    write_snapshot(path, &bytes).await
}

/// Load a queue snapshot. Returns `None` if none exists.
pub async fn load_queue<T>(path: &Path, limits: &DecodeLimits) -> Result<Option<PersistentQueue<T>>>
where
    T: DeserializeOwned,
{
    match read_snapshot(path, limits).await? {
        Some(bytes) => PersistentQueue::deserialize(&bytes, limits).map(Some),
        None => Ok(None),
    }
}

/// Persist a queue snapshot.
pub async fn save_queue<T: Serialize>(path: &Path, queue: &PersistentQueue<T>) -> Result<()> {
    let bytes = queue.serialize()?;
    write_snapshot(path, &bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist");

        assert!(read_snapshot(&path, &DecodeLimits::default())
            .await
            .unwrap()
            .is_none());
        assert!(load_set::<String>(&path, &DecodeLimits::default())
            .await
            .unwrap()
            .is_empty());
        assert!(load_queue::<String>(&path, &DecodeLimits::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_snapshot(dir.path(), &DecodeLimits::default()).await;
        assert!(matches!(result, Err(StorageError::NotAFile(_))));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metar").join("cycle-state-00");

        write_snapshot(&path, b"first").await.unwrap();
        write_snapshot(&path, b"second").await.unwrap();

        assert_eq!(
            read_snapshot(&path, &DecodeLimits::default())
                .await
                .unwrap()
                .unwrap(),
            b"second"
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_set_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycle-state-12");
        let set: DedupSet<String> = ["R1", "R2"].iter().map(|s| s.to_string()).collect();

        save_set(&path, &set).await.unwrap();
        let restored = load_set::<String>(&path, &DecodeLimits::default())
            .await
            .unwrap();
        assert_eq!(restored.snapshot(), set.snapshot());
    }

    #[tokio::test]
    async fn test_queue_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeder-queue");
        let queue = PersistentQueue::new();
        queue.push(vec!["b".to_string(), "a".to_string()]);

        save_queue(&path, &queue).await.unwrap();
        let restored = load_queue::<String>(&path, &DecodeLimits::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.snapshot(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycle-state-03");
        write_snapshot(&path, &[0u8; 64]).await.unwrap();
        let limits = DecodeLimits {
            max_bytes: 16,
            ..DecodeLimits::default()
        };

        let result = read_snapshot(&path, &limits).await;
        assert!(matches!(
            result,
            Err(StorageError::TooLarge { actual: 64, max: 16 })
        ));
        assert!(matches!(
            load_set::<String>(&path, &limits).await,
            Err(StorageError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeder-queue");
        write_snapshot(&path, &[0xde, 0xad, 0xbe, 0xef]).await.unwrap();

        let result = load_queue::<String>(&path, &DecodeLimits::default()).await;
        assert!(matches!(result, Err(StorageError::Decode(_))));
    }
}
