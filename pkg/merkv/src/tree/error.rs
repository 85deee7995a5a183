use std::fmt::{self, Display};

use primitives::Digest;
use thiserror::Error;

use crate::node::NodeKind;
use crate::storage::StorageError;

/// The error type for tree operations
#[derive(Debug, Error)]
pub enum TreeError {
    /// Keys are arbitrary byte strings, except the empty one
    #[error("keys must not be empty")]
    EmptyKey,

    /// Two keys need the same leaf slot; a deeper tree would separate them
    #[error(transparent)]
    Collision(#[from] PathCollision),

    /// The store returned something that cannot be part of this tree
    #[error("storage corruption: {0}")]
    Corruption(#[from] Corruption),

    /// The storage adapter failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An inconsistency between the store's contents and the tree's hashes
///
/// Every node is verified on the way in: the bytes must decode, the
/// decoded node must hash back to the key it was fetched under, and its
/// kind must fit its position. A failure means the store (or whatever
/// filled it) is broken, not the caller; the first failed check wins.
#[derive(Debug, Error)]
pub enum Corruption {
    /// A parent references a hash the store does not have
    #[error("node {hash} is referenced but not stored")]
    MissingNode {
        /// The dangling content hash
        hash: Digest,
    },

    /// Stored bytes that do not decode as a node
    #[error("node {hash} failed to decode")]
    UndecodableNode {
        /// The content hash the bytes were fetched under
        hash: Digest,
        /// The decode failure
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes whose content hash is not their storage key
    #[error("node stored under {stored} hashes to {computed}")]
    HashMismatch {
        /// The hash the node was fetched under
        stored: Digest,
        /// The hash its bytes actually produce
        computed: Digest,
    },

    /// A node of the wrong shape for its position
    #[error("node {hash} at level {level} is a {found} node, expected {expected}")]
    WrongKind {
        /// The node's content hash
        hash: Digest,
        /// The level the traversal reached it at
        level: usize,
        /// The shape the position requires
        expected: NodeKind,
        /// The shape it decoded as
        found: NodeKind,
    },
}

/// Two distinct key hashes were routed to the same leaf slot
///
/// A key's slot is the first `depth` bits of its hash, so at shallow
/// depths distinct keys can share one. The update that would overwrite the
/// resident leaf is refused; the remedy is a deeper tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCollision {
    pub(crate) in_tree: Digest,
    pub(crate) inserted: Digest,
    pub(crate) depth: usize,
}

impl PathCollision {
    /// The key hash already resident in the contested slot
    #[must_use]
    pub fn in_tree(&self) -> Digest {
        self.in_tree
    }

    /// The key hash that was being inserted
    #[must_use]
    pub fn inserted(&self) -> Digest {
        self.inserted
    }

    /// The depth at which the two hashes share their full path
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Display for PathCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key hashes {} and {} collide in their first {} bits",
            self.in_tree, self.inserted, self.depth,
        )
    }
}

impl std::error::Error for PathCollision {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_names_both_parties() {
        let collision = PathCollision {
            in_tree: Digest::ZERO,
            inserted: Digest::ZERO,
            depth: 16,
        };

        let rendered = collision.to_string();
        assert!(rendered.contains("collide in their first 16 bits"), "{rendered}");

        // the enum wrapper is transparent
        assert_eq!(TreeError::from(collision).to_string(), rendered);
    }

    #[test]
    fn corruption_is_prefixed() {
        let err = TreeError::from(Corruption::MissingNode {
            hash: Digest::from_u64(3),
        });
        assert!(err.to_string().starts_with("storage corruption: node "));
    }
}
