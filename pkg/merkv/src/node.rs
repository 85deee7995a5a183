use borsh::{BorshDeserialize, BorshSerialize};
use primitives::{Digest, TreeHasher};

use crate::hash::{internal_hash, leaf_hash};

/// A materialized tree node
///
/// Empty subtrees are never materialized; they are represented by the
/// zero-hash for their level. A node's identity *is* its hash: the borsh
/// encoding below is the stable storage representation, so the same logical
/// node always produces the same bytes and therefore the same hash.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Node {
    /// A leaf holding the value stored for one key hash
    Leaf {
        /// The hash of the key stored here
        key_hash: Digest,
        /// The stored value
        value: Vec<u8>,
    },
    /// An internal node referencing its children by hash
    Internal {
        /// The left child (path bit `false`)
        left: Digest,
        /// The right child (path bit `true`)
        right: Digest,
    },
}

impl Node {
    /// The content hash of this node, which is also its storage key
    #[must_use]
    pub fn hash<H: TreeHasher>(&self) -> Digest {
        match self {
            Node::Leaf { key_hash, value } => leaf_hash::<H>(key_hash, value),
            Node::Internal { left, right } => internal_hash::<H>(left, right),
        }
    }

    /// Which shape this node is
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Leaf { .. } => NodeKind::Leaf,
            Node::Internal { .. } => NodeKind::Internal,
        }
    }

    /// The stable byte encoding of this node
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("nodes always serialize")
    }

    /// Decode a node from its stable byte encoding
    ///
    /// Strict: trailing bytes are rejected, keeping bytes ⇄ node a
    /// bijection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, std::io::Error> {
        borsh::from_slice(bytes)
    }
}

/// The shape of a node, as reported in corruption errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf node
    Leaf,
    /// An internal node
    Internal,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Leaf => f.write_str("leaf"),
            NodeKind::Internal => f.write_str("internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::key_hash;
    use primitives::Sha256Hasher;
    use test_strategy::proptest;

    #[test]
    fn leaf_hash_matches_known_vector() {
        let node = Node::Leaf {
            key_hash: key_hash::<Sha256Hasher>(b"alice"),
            value: b"100".to_vec(),
        };

        assert_eq!(
            node.hash::<Sha256Hasher>().to_hex(),
            "948bc4c3c31fc25877f369588910006c67dc3f2f013d508c0dda5b69808b424e"
        );
    }

    #[test]
    fn encoding_is_tagged() {
        let leaf = Node::Leaf {
            key_hash: Digest::from_u64(1),
            value: vec![9],
        };
        let internal = Node::Internal {
            left: Digest::from_u64(1),
            right: Digest::from_u64(2),
        };

        assert_eq!(leaf.to_bytes()[0], 0);
        assert_eq!(internal.to_bytes()[0], 1);

        // tag + key hash + u32 length prefix + value
        assert_eq!(leaf.to_bytes().len(), 1 + 32 + 4 + 1);
        // tag + two child hashes
        assert_eq!(internal.to_bytes().len(), 1 + 32 + 32);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let node = Node::Internal {
            left: Digest::from_u64(1),
            right: Digest::from_u64(2),
        };

        let mut bytes = node.to_bytes();
        assert_eq!(Node::from_bytes(&bytes).unwrap(), node);

        bytes.push(0);
        assert!(Node::from_bytes(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Node::from_bytes(&[]).is_err());
        assert!(Node::from_bytes(&[7]).is_err());
        assert!(Node::from_bytes(&[0, 1, 2, 3]).is_err());
    }

    #[proptest]
    fn round_trip(key_hash: Digest, value: Vec<u8>) {
        let node = Node::Leaf { key_hash, value };
        assert_eq!(Node::from_bytes(&node.to_bytes()).unwrap(), node);
    }

    #[proptest]
    fn same_node_same_bytes(left: Digest, right: Digest) {
        let a = Node::Internal { left, right };
        let b = Node::Internal { left, right };

        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.hash::<Sha256Hasher>(), b.hash::<Sha256Hasher>());
    }
}
