#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_bool)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::explicit_deref_methods)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::single_match_else)]
#![deny(missing_docs)]

//! # MerKV (**Mer**kle **K**ey-**V**alue store)
//!
//! An authenticated key-value dictionary built as a fixed-depth sparse
//! Merkle tree: given a key, it proves inclusion or non-inclusion of a value
//! under a single 32-byte root hash, without materializing the whole
//! dataset.
//!
//! The core is purely functional over storage. Every operation takes a root
//! hash and a storage handle; nothing is retained between calls. Reads
//! traverse; writes are computed as a value and persisted by the caller:
//!
//! ```rust
//! # use merkv::{MemoryStore, NodeWriter, Sha256Hasher, SparseTree};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = SparseTree::<Sha256Hasher>::new(64)?;
//! let store = MemoryStore::new();
//!
//! // compute the update, then persist its nodes, then use the new root
//! let outcome = tree.update(b"alice", b"100", &tree.empty_root(), &store).await?;
//! store.write_batch(outcome.nodes).await?;
//!
//! let value = tree.get(b"alice", &outcome.new_root, &store).await?;
//! assert_eq!(value.as_deref(), Some(&b"100"[..]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Copy-on-write roots
//!
//! Nodes are content-addressed: a node's storage key is its own hash, so
//! nodes are write-once and structural sharing between versions is
//! automatic. An update rebuilds only the path from the touched leaf to the
//! root (at most `depth + 1` nodes) and returns the new root; every old root
//! stays readable for as long as its nodes remain stored. Snapshots are
//! nothing more than named roots.
//!
//! Advancing whatever "current root" pointer a deployment maintains is the
//! caller's job, via [`MetadataStore::set_current_root`]; serializing
//! concurrent writers around that pointer is out of the core's hands.
//!
//! ## Proofs
//!
//! [`SparseTree::prove_inclusion`] and [`SparseTree::prove_non_inclusion`]
//! produce self-contained proofs verifiable without storage access.
//! Compression elides sibling hashes that equal the zero-hash for their
//! level, which in a sparse tree is most of them. See the [`proof`] module.
//!
//! ## Storage
//!
//! The core consumes the persistence contract in [`storage`] and never
//! implements it, with one exception: [`MemoryStore`], an in-memory
//! reference implementation for tests and examples.

pub mod hash;
mod metadata;
mod node;
pub mod proof;
pub mod storage;
mod tree;
mod zero;


pub use metadata::{MetadataError, TreeMetadata, CORE_VERSION, FORMAT_VERSION, MAX_DEPTH};
pub use node::{Node, NodeKind};
pub use proof::{
    InclusionProof, MalformedProof, NonInclusionKind, NonInclusionProof, Proof, Siblings,
    VerifyError,
};
pub use storage::{
    MemoryStore, MetadataStore, NodeBlob, NodeReader, NodeWriter, SnapshotInfo, SnapshotManager,
    StorageError, StorageErrorKind,
};
pub use tree::{Corruption, PathCollision, SparseTree, TreeError, UpdateOutcome};
pub use zero::ZeroHashes;

pub use primitives::*;
