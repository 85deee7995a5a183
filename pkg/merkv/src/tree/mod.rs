//! The sparse Merkle tree core: traversal, lookup, and copy-on-write
//! updates

mod error;
mod get;
mod update;
mod walk;

pub use error::{Corruption, PathCollision, TreeError};
pub use update::UpdateOutcome;

pub(crate) use walk::{LeafSlot, Walk};

use std::fmt::{self, Debug};
use std::marker::PhantomData;

use primitives::{BitPath, Digest, TreeHasher};

use crate::hash::key_hash;
use crate::metadata::{MetadataError, TreeMetadata};
use crate::zero::ZeroHashes;

/// A fixed-depth sparse Merkle tree driven by the hash algorithm `H`
///
/// The driver is stateless: it owns the tree's configuration (depth and
/// the zero-hash table) and nothing else. All data lives behind the
/// [`storage`](crate::storage) traits, every version is named by its root
/// hash, and one driver serves any number of versions concurrently.
///
/// ```rust
/// # use merkv::{Sha256Hasher, SparseTree};
/// let tree = SparseTree::<Sha256Hasher>::new(16)?;
///
/// assert_eq!(tree.depth(), 16);
/// assert_eq!(tree.empty_root(), *tree.zero_hashes().level(16));
/// # Ok::<(), merkv::MetadataError>(())
/// ```
pub struct SparseTree<H> {
    depth: usize,
    zero: ZeroHashes,
    _hasher: PhantomData<fn() -> H>,
}

impl<H: TreeHasher> SparseTree<H> {
    /// A tree of the given depth
    ///
    /// Depth trades proof size against collision room: keys are routed by
    /// the first `depth` bits of their hash, so at depth `d` two distinct
    /// keys collide when those bits agree. Production trees use
    /// [`MAX_DEPTH`](crate::MAX_DEPTH), where a collision would contradict
    /// the hash's collision resistance; shallow trees are for tests and
    /// for readers of this crate.
    pub fn new(depth: usize) -> Result<Self, MetadataError> {
        let metadata = TreeMetadata::new::<H>(depth)?;
        Ok(Self::from_validated(&metadata))
    }

    /// Reopen a tree from a stored metadata record
    ///
    /// The record is validated against `H` first, so metadata written by a
    /// different algorithm, an out-of-range depth, or a tampered zero
    /// table is refused rather than silently producing garbage roots.
    pub fn from_metadata(metadata: &TreeMetadata) -> Result<Self, MetadataError> {
        metadata.validate::<H>()?;
        Ok(Self::from_validated(metadata))
    }

    fn from_validated(metadata: &TreeMetadata) -> Self {
        Self {
            depth: metadata.depth(),
            zero: metadata.zero_hashes().clone(),
            _hasher: PhantomData,
        }
    }

    /// The metadata record describing this tree
    #[must_use]
    pub fn metadata(&self) -> TreeMetadata {
        TreeMetadata::from_parts(H::ALGORITHM_ID.to_owned(), self.depth as u32, self.zero.clone())
    }

    /// The number of levels between the root and the leaves
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The zero-hash table for this depth and algorithm
    #[inline]
    #[must_use]
    pub fn zero_hashes(&self) -> &ZeroHashes {
        &self.zero
    }

    /// The root of the version containing nothing
    ///
    /// Needs no storage: it is the top of the zero-hash table.
    #[inline]
    #[must_use]
    pub fn empty_root(&self) -> Digest {
        *self.zero.root()
    }

    /// The descent path for a key hash
    pub(crate) fn path_of(&self, key_hash: &Digest) -> BitPath {
        key_hash
            .bit_path(self.depth)
            .expect("depth is range-checked at construction")
    }

    /// Hash a key, refusing the empty key
    pub(crate) fn hashed_key(&self, key: &[u8]) -> Result<Digest, TreeError> {
        match key.is_empty() {
            true => Err(TreeError::EmptyKey),
            false => Ok(key_hash::<H>(key)),
        }
    }
}

impl<H> Clone for SparseTree<H> {
    fn clone(&self) -> Self {
        Self {
            depth: self.depth,
            zero: self.zero.clone(),
            _hasher: PhantomData,
        }
    }
}

impl<H: TreeHasher> Debug for SparseTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseTree")
            .field("algorithm", &H::ALGORITHM_ID)
            .field("depth", &self.depth)
            .finish()
    }
}
