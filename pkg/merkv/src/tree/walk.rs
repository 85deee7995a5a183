use primitives::{Digest, TreeHasher};

use crate::node::{Node, NodeKind};
use crate::storage::NodeReader;
use crate::tree::error::{Corruption, TreeError};
use crate::tree::SparseTree;

/// Everything learned from one root-to-leaf traversal
pub(crate) struct Walk {
    /// The sibling hash at every path position, root side first
    pub(crate) siblings: Vec<Digest>,
    /// What occupies the slot the path ends at
    pub(crate) slot: LeafSlot,
    /// The hash of the slot's contents (the zero sentinel when empty)
    pub(crate) leaf_digest: Digest,
}

/// The contents of a leaf slot
pub(crate) enum LeafSlot {
    /// Nothing is stored on this path
    Empty,
    /// A leaf is resident, possibly for a different key hash
    Leaf { key_hash: Digest, value: Vec<u8> },
}

impl<H: TreeHasher> SparseTree<H> {
    /// Traverse from `root` to the leaf slot for `key_hash`, capturing the
    /// sibling at every branch
    ///
    /// Cheap wherever the tree is sparse: the moment the cursor lands on a
    /// zero-hash, the rest of the path is known without touching storage.
    pub(crate) async fn walk<R>(
        &self,
        key_hash: &Digest,
        root: &Digest,
        reader: &R,
    ) -> Result<Walk, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        let path = self.path_of(key_hash);
        let mut siblings = Vec::with_capacity(self.depth);
        let mut current = *root;

        for level in (1..=self.depth).rev() {
            if current == *self.zero.level(level) {
                // an empty subtree: every remaining sibling is the zero
                // hash one level further down
                for sibling_level in (0..level).rev() {
                    siblings.push(*self.zero.level(sibling_level));
                }
                current = *self.zero.level(0);
                break;
            }

            let node = self.read_node(reader, &current).await?;
            let (left, right) = match node {
                Node::Internal { left, right } => (left, right),
                Node::Leaf { .. } => {
                    return Err(Corruption::WrongKind {
                        hash: current,
                        level,
                        expected: NodeKind::Internal,
                        found: NodeKind::Leaf,
                    }
                    .into())
                }
            };

            match path.bit(self.depth - level) {
                false => {
                    siblings.push(right);
                    current = left;
                }
                true => {
                    siblings.push(left);
                    current = right;
                }
            }
        }

        let slot = match current == *self.zero.level(0) {
            true => LeafSlot::Empty,
            false => match self.read_node(reader, &current).await? {
                Node::Leaf { key_hash, value } => LeafSlot::Leaf { key_hash, value },
                Node::Internal { .. } => {
                    return Err(Corruption::WrongKind {
                        hash: current,
                        level: 0,
                        expected: NodeKind::Leaf,
                        found: NodeKind::Internal,
                    }
                    .into())
                }
            },
        };

        Ok(Walk {
            siblings,
            slot,
            leaf_digest: current,
        })
    }

    /// Fetch one node and verify it on the way in
    ///
    /// Checks run decode-first: bytes that do not decode are reported as
    /// undecodable even if they also would not hash correctly, and only a
    /// node that decodes *and* hashes back to its key is returned. Kind
    /// checks are the caller's, since only it knows the position.
    pub(crate) async fn read_node<R>(&self, reader: &R, hash: &Digest) -> Result<Node, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        let blob = reader
            .read(hash)
            .await?
            .ok_or(Corruption::MissingNode { hash: *hash })?;

        let node = blob
            .decode()
            .map_err(|source| Corruption::UndecodableNode { hash: *hash, source })?;

        let computed = node.hash::<H>();
        if computed != *hash {
            return Err(Corruption::HashMismatch {
                stored: *hash,
                computed,
            }
            .into());
        }

        Ok(node)
    }
}
