//! The persistence contract between the tree core and its backends
//!
//! The core never talks to a database; it talks to these traits. A backend
//! stores opaque [`NodeBlob`]s keyed by content hash (plus metadata, a
//! current-root pointer, and snapshot names) and the core does the rest.
//! Content addressing keeps the contract small: nodes are write-once,
//! identical content always has identical keys, and old versions survive
//! for free because new versions never touch their nodes.
//!
//! A complete single-process implementation ships as [`MemoryStore`]; it
//! doubles as the model for what a real adapter must do.

mod error;
mod memory;

pub use error::{StorageError, StorageErrorKind};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitives::{BitPath, Digest, TreeHasher};

use crate::metadata::TreeMetadata;
use crate::node::Node;

/// A node as a storage backend sees it
///
/// The hash is the storage key and is derived from the content, never from
/// the bytes: two encodings of the same logical node (there is exactly
/// one, but a backend cannot know that) would share a key. `path` is a
/// hint for adapters that keep a secondary position index; backends that
/// only look up by hash may ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBlob {
    /// The content hash, which is the storage key
    pub hash: Digest,
    /// The node's stable byte encoding
    pub bytes: Vec<u8>,
    /// The tree position this node was staged at, if the writer tracked it
    pub path: Option<BitPath>,
}

impl NodeBlob {
    /// Encode `node` into its storable form
    #[must_use]
    pub fn from_node<H: TreeHasher>(node: &Node, path: Option<BitPath>) -> Self {
        Self {
            hash: node.hash::<H>(),
            bytes: node.to_bytes(),
            path,
        }
    }

    /// Decode the stored bytes back into a node
    ///
    /// A plain decode: it does not check that the bytes hash back to
    /// [`hash`](Self::hash). The tree core performs that check on every
    /// node it reads.
    pub fn decode(&self) -> Result<Node, std::io::Error> {
        Node::from_bytes(&self.bytes)
    }
}

/// A named root: the public face of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapshotInfo {
    /// The caller-chosen name
    pub name: String,
    /// The root hash the snapshot pins
    pub root: Digest,
    /// When the snapshot was created
    pub created_at: DateTime<Utc>,
}

/// Read access to the node store
///
/// Reads must be snapshot-consistent: a traversal in flight must never
/// observe a partially applied batch. Append-only backends get this for
/// free, since content addressing means existing nodes are never
/// rewritten.
#[async_trait]
pub trait NodeReader: Send + Sync {
    /// Fetch a node by content hash, or `None` if it is not stored
    async fn read(&self, hash: &Digest) -> Result<Option<NodeBlob>, StorageError>;

    /// Fetch the node most recently written at a tree position
    ///
    /// Backed by the optional position index; adapters that do not keep
    /// one return [`StorageError::unsupported`]. The tree core never
    /// calls this, it exists for debugging and introspection tools.
    async fn read_by_path(&self, path: &BitPath) -> Result<Option<NodeBlob>, StorageError> {
        let _ = path;
        Err(StorageError::unsupported("read_by_path"))
    }

    /// Whether a node with this content hash is stored
    async fn contains(&self, hash: &Digest) -> Result<bool, StorageError> {
        Ok(self.read(hash).await?.is_some())
    }
}

/// Write access to the node store
///
/// Nodes are write-once: a hash is only ever paired with one byte string.
/// Rewriting a stored hash with identical bytes must be a no-op; differing
/// bytes under one hash mean the writer's hasher disagrees with the
/// store's history and should be treated as corruption.
#[async_trait]
pub trait NodeWriter: Send + Sync {
    /// Persist a batch of nodes atomically
    ///
    /// Readers must see all of the batch or none of it. Once this returns,
    /// the batch is durable to the backend's standard and the version it
    /// belongs to may be published.
    async fn write_batch(&self, nodes: Vec<NodeBlob>) -> Result<(), StorageError>;

    /// Persist a single node
    async fn write_one(&self, node: NodeBlob) -> Result<(), StorageError> {
        self.write_batch(vec![node]).await
    }

    /// Block until previously accepted writes are durable
    async fn flush(&self) -> Result<(), StorageError>;
}

/// Storage for the tree's configuration record and current-root pointer
///
/// The metadata record is written once at initialization and read back on
/// every reopen; see [`TreeMetadata`]. The current root is the one mutable
/// cell in the whole system. Serializing concurrent writers around it is
/// the deployment's job, not the adapter's.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist the tree's metadata record
    async fn store_metadata(&self, metadata: &TreeMetadata) -> Result<(), StorageError>;

    /// Load the stored metadata record, if any
    async fn load_metadata(&self) -> Result<Option<TreeMetadata>, StorageError>;

    /// Whether a metadata record is stored
    async fn metadata_exists(&self) -> Result<bool, StorageError> {
        Ok(self.load_metadata().await?.is_some())
    }

    /// Publish `root` as the current version
    ///
    /// Fails with [`StorageErrorKind::MetadataMissing`] if the tree has
    /// never been initialized. Callers must persist the version's nodes
    /// *before* publishing its root; the pointer is the commit point.
    async fn set_current_root(&self, root: &Digest) -> Result<(), StorageError>;

    /// The published current root, if one has been set
    async fn current_root(&self) -> Result<Option<Digest>, StorageError>;
}

/// Named-root bookkeeping
///
/// Old roots stay readable for as long as their nodes are stored, so a
/// snapshot is nothing but a name pinned to a root. Creating one copies no
/// nodes and restoring one moves no data; restore just re-publishes the
/// pinned root as current.
#[async_trait]
pub trait SnapshotManager: Send + Sync {
    /// Pin `root` under `name`
    ///
    /// `metadata` optionally records the configuration the snapshot was
    /// taken under, which lets [`restore_snapshot`](Self::restore_snapshot)
    /// refuse a snapshot from an incompatible tree. Fails with
    /// [`StorageErrorKind::SnapshotExists`] if the name is taken.
    async fn create_snapshot(
        &self,
        name: &str,
        root: &Digest,
        metadata: Option<&TreeMetadata>,
    ) -> Result<(), StorageError>;

    /// Look up a snapshot by name
    async fn snapshot(&self, name: &str) -> Result<Option<SnapshotInfo>, StorageError>;

    /// Every snapshot, ordered by name
    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, StorageError>;

    /// Remove a name; removing an absent name is a no-op
    ///
    /// Only the name is removed. Whether the nodes reachable from the
    /// pinned root stay stored is the adapter's retention policy.
    async fn delete_snapshot(&self, name: &str) -> Result<(), StorageError>;

    /// Publish a snapshot's root as current and return it
    ///
    /// Fails with [`StorageErrorKind::SnapshotMissing`] for an unknown
    /// name and [`StorageErrorKind::SnapshotIncompatible`] when the
    /// snapshot's recorded metadata differs from the store's.
    async fn restore_snapshot(&self, name: &str) -> Result<Digest, StorageError>;
}
