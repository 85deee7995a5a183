use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use primitives::{BitPath, Digest};

use super::{
    MetadataStore, NodeBlob, NodeReader, NodeWriter, SnapshotInfo, SnapshotManager, StorageError,
    StorageErrorKind,
};
use crate::metadata::TreeMetadata;

/// The in-memory reference implementation of the storage contract
///
/// Everything lives behind one mutex, so batches apply inside a single
/// critical section and snapshot consistency is trivial. Useful for tests
/// and as a model for real adapters; not meant to outlive a process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<Digest, NodeBlob>,
    positions: HashMap<BitPath, Digest>,
    metadata: Option<TreeMetadata>,
    current_root: Option<Digest>,
    snapshots: BTreeMap<String, StoredSnapshot>,
}

#[derive(Debug)]
struct StoredSnapshot {
    info: SnapshotInfo,
    metadata: Option<TreeMetadata>,
}

impl MemoryStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many distinct nodes are stored
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    /// Whether no nodes are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().nodes.is_empty()
    }
}

impl Inner {
    fn put(&mut self, node: NodeBlob) {
        if let Some(path) = &node.path {
            self.positions.insert(*path, node.hash);
        }

        match self.nodes.get(&node.hash) {
            // write-once: the first bytes stored under a hash win, and a
            // conflicting rewrite means the writer's hasher disagrees with
            // the store's history
            Some(existing) if existing.bytes != node.bytes => {
                tracing::warn!(hash = %node.hash, "ignoring conflicting rewrite of a stored node");
            }
            Some(_) => {}
            None => {
                self.nodes.insert(node.hash, node);
            }
        }
    }
}

#[async_trait]
impl NodeReader for MemoryStore {
    async fn read(&self, hash: &Digest) -> Result<Option<NodeBlob>, StorageError> {
        Ok(self.inner.lock().nodes.get(hash).cloned())
    }

    async fn read_by_path(&self, path: &BitPath) -> Result<Option<NodeBlob>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .positions
            .get(path)
            .and_then(|hash| inner.nodes.get(hash))
            .cloned())
    }

    async fn contains(&self, hash: &Digest) -> Result<bool, StorageError> {
        Ok(self.inner.lock().nodes.contains_key(hash))
    }
}

#[async_trait]
impl NodeWriter for MemoryStore {
    async fn write_batch(&self, nodes: Vec<NodeBlob>) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        tracing::trace!(nodes = nodes.len(), "applying node batch");
        for node in nodes {
            inner.put(node);
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn store_metadata(&self, metadata: &TreeMetadata) -> Result<(), StorageError> {
        self.inner.lock().metadata = Some(metadata.clone());
        Ok(())
    }

    async fn load_metadata(&self) -> Result<Option<TreeMetadata>, StorageError> {
        Ok(self.inner.lock().metadata.clone())
    }

    async fn set_current_root(&self, root: &Digest) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        match inner.metadata.is_some() {
            true => {
                inner.current_root = Some(*root);
                Ok(())
            }
            false => Err(StorageError::new(
                "set_current_root",
                StorageErrorKind::MetadataMissing,
            )),
        }
    }

    async fn current_root(&self) -> Result<Option<Digest>, StorageError> {
        Ok(self.inner.lock().current_root)
    }
}

#[async_trait]
impl SnapshotManager for MemoryStore {
    async fn create_snapshot(
        &self,
        name: &str,
        root: &Digest,
        metadata: Option<&TreeMetadata>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.snapshots.contains_key(name) {
            return Err(
                StorageError::new("create_snapshot", StorageErrorKind::SnapshotExists)
                    .with_context(name),
            );
        }

        let info = SnapshotInfo {
            name: name.to_owned(),
            root: *root,
            created_at: Utc::now(),
        };
        inner.snapshots.insert(
            name.to_owned(),
            StoredSnapshot {
                info,
                metadata: metadata.cloned(),
            },
        );
        Ok(())
    }

    async fn snapshot(&self, name: &str) -> Result<Option<SnapshotInfo>, StorageError> {
        Ok(self
            .inner
            .lock()
            .snapshots
            .get(name)
            .map(|snapshot| snapshot.info.clone()))
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, StorageError> {
        Ok(self
            .inner
            .lock()
            .snapshots
            .values()
            .map(|snapshot| snapshot.info.clone())
            .collect())
    }

    async fn delete_snapshot(&self, name: &str) -> Result<(), StorageError> {
        self.inner.lock().snapshots.remove(name);
        Ok(())
    }

    async fn restore_snapshot(&self, name: &str) -> Result<Digest, StorageError> {
        let mut inner = self.inner.lock();

        let Some(snapshot) = inner.snapshots.get(name) else {
            return Err(
                StorageError::new("restore_snapshot", StorageErrorKind::SnapshotMissing)
                    .with_context(name),
            );
        };
        if let (Some(recorded), Some(stored)) = (&snapshot.metadata, &inner.metadata) {
            if recorded != stored {
                return Err(StorageError::new(
                    "restore_snapshot",
                    StorageErrorKind::SnapshotIncompatible,
                )
                .with_context(name));
            }
        }
        let root = snapshot.info.root;

        match inner.metadata.is_some() {
            true => {
                inner.current_root = Some(root);
                Ok(root)
            }
            false => Err(StorageError::new(
                "restore_snapshot",
                StorageErrorKind::MetadataMissing,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(hash: u64, bytes: &[u8]) -> NodeBlob {
        NodeBlob {
            hash: Digest::from_u64(hash),
            bytes: bytes.to_vec(),
            path: None,
        }
    }

    #[tokio::test]
    async fn nodes_are_write_once() {
        let store = MemoryStore::new();
        store.write_one(blob(1, &[1, 2, 3])).await.unwrap();

        // identical rewrite is a no-op, conflicting rewrite is dropped
        store.write_one(blob(1, &[1, 2, 3])).await.unwrap();
        store.write_one(blob(1, &[9])).await.unwrap();

        let stored = store.read(&Digest::from_u64(1)).await.unwrap().unwrap();
        assert_eq!(stored.bytes, vec![1, 2, 3]);
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn contains_tracks_reads() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(!store.contains(&Digest::from_u64(1)).await.unwrap());

        store.write_one(blob(1, &[1])).await.unwrap();
        assert!(store.contains(&Digest::from_u64(1)).await.unwrap());
        assert_eq!(store.read(&Digest::from_u64(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn the_position_index_tracks_the_latest_write() {
        let store = MemoryStore::new();
        let path = Digest::from_u64(u64::MAX).bit_path(4).unwrap();

        let mut first = blob(1, &[1]);
        first.path = Some(path);
        let mut second = blob(2, &[2]);
        second.path = Some(path);

        store.write_batch(vec![first, second]).await.unwrap();
        let found = store.read_by_path(&path).await.unwrap().unwrap();
        assert_eq!(found.hash, Digest::from_u64(2));
    }

    #[tokio::test]
    async fn the_current_root_needs_metadata_first() {
        let store = MemoryStore::new();
        assert_eq!(store.current_root().await.unwrap(), None);

        let err = store
            .set_current_root(&Digest::from_u64(7))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::MetadataMissing));

        let metadata = TreeMetadata::new::<primitives::Sha256Hasher>(8).unwrap();
        store.store_metadata(&metadata).await.unwrap();
        assert!(store.metadata_exists().await.unwrap());
        assert_eq!(store.load_metadata().await.unwrap(), Some(metadata));

        store.set_current_root(&Digest::from_u64(7)).await.unwrap();
        assert_eq!(
            store.current_root().await.unwrap(),
            Some(Digest::from_u64(7)),
        );
    }
}
