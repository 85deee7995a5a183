use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use primitives::{BitPath, Digest, TreeHasher};

use crate::node::Node;
use crate::storage::{NodeBlob, NodeReader, StorageError};
use crate::tree::error::{PathCollision, TreeError};
use crate::tree::walk::{LeafSlot, Walk};
use crate::tree::SparseTree;

/// A computed update: the new root and the nodes it needs persisted
///
/// Updates are pure. Dropping an outcome unpersisted affects no stored
/// version, which is also the cancellation story: an update future dropped
/// mid-flight has written nothing. The intended sequence is compute,
/// persist [`nodes`](Self::nodes) atomically, then publish
/// [`new_root`](Self::new_root).
#[must_use = "an update has no effect until its nodes are persisted"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The root of the updated version
    pub new_root: Digest,
    /// The nodes the updated version adds, in no particular order
    ///
    /// At most `depth + 1` per updated key; empty when the update was a
    /// no-op. Persist the whole set atomically.
    pub nodes: Vec<NodeBlob>,
}

impl<H: TreeHasher> SparseTree<H> {
    /// Compute the version of `root` in which `key` maps to `value`
    ///
    /// Copy-on-write: no stored version changes. The outcome carries the
    /// handful of nodes the new version adds (the rebuilt path from the
    /// key's leaf to the root); everything else is shared with the old
    /// version. An empty `value` deletes the key, collapsing any
    /// single-occupant subtrees back to zero-hashes, so an insert followed
    /// by its delete restores the exact previous root.
    ///
    /// ```rust
    /// # use merkv::{MemoryStore, NodeWriter, Sha256Hasher, SparseTree};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tree = SparseTree::<Sha256Hasher>::new(64)?;
    /// let store = MemoryStore::new();
    ///
    /// let v1 = tree.update(b"pi", b"3.14", &tree.empty_root(), &store).await?;
    /// store.write_batch(v1.nodes).await?;
    ///
    /// // deleting the only key lands back on the empty root
    /// let v2 = tree.delete(b"pi", &v1.new_root, &store).await?;
    /// assert_eq!(v2.new_root, tree.empty_root());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update<R>(
        &self,
        key: &[u8],
        value: &[u8],
        root: &Digest,
        reader: &R,
    ) -> Result<UpdateOutcome, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        let key_hash = self.hashed_key(key)?;
        self.update_hashed(&key_hash, value, root, reader).await
    }

    /// [`update`](Self::update) for a pre-hashed key
    #[tracing::instrument(level = "debug", err, skip_all, fields(root = %root, key_hash = %key_hash))]
    pub async fn update_hashed<R>(
        &self,
        key_hash: &Digest,
        value: &[u8],
        root: &Digest,
        reader: &R,
    ) -> Result<UpdateOutcome, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        let walk = self.walk(key_hash, root, reader).await?;
        self.recombine(key_hash, value, root, &walk)
    }

    /// Compute the version of `root` without `key`
    ///
    /// Sugar for updating with the empty value. Deleting an absent key is
    /// a no-op outcome: the old root comes back and no nodes are staged.
    pub async fn delete<R>(
        &self,
        key: &[u8],
        root: &Digest,
        reader: &R,
    ) -> Result<UpdateOutcome, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        self.update(key, &[], root, reader).await
    }

    /// Apply several updates as one outcome
    ///
    /// Entries apply in order against a private staging area, so later
    /// entries observe earlier ones and the last write to a key wins.
    /// Intermediate nodes made irrelevant within the batch are dropped
    /// from the outcome rather than persisted. Any failing entry aborts
    /// the whole batch.
    #[tracing::instrument(level = "debug", err, skip_all, fields(root = %root))]
    pub async fn update_many<R, I, K, V>(
        &self,
        entries: I,
        root: &Digest,
        reader: &R,
    ) -> Result<UpdateOutcome, TreeError>
    where
        R: NodeReader + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut current_root = *root;
        let mut staged: HashMap<Digest, NodeBlob> = HashMap::new();
        let mut by_position: BTreeMap<BitPath, NodeBlob> = BTreeMap::new();

        for (key, value) in entries {
            let key_hash = self.hashed_key(key.as_ref())?;

            let outcome = {
                let overlay = StagedReader {
                    staged: &staged,
                    inner: reader,
                };
                let walk = self.walk(&key_hash, &current_root, &overlay).await?;
                self.recombine(&key_hash, value.as_ref(), &current_root, &walk)?
            };

            // a no-op entry leaves the staged state untouched; running the
            // collapse sweep for it would evict nodes staged by earlier
            // entries along the same path
            if outcome.new_root == current_root {
                continue;
            }
            current_root = outcome.new_root;

            let mut staged_lengths = HashSet::new();
            for node in outcome.nodes {
                if let Some(position) = node.path {
                    staged_lengths.insert(position.len());
                    by_position.insert(position, node.clone());
                }
                staged.insert(node.hash, node);
            }

            // positions this entry collapsed back to zero-hashes must not
            // be persisted by the batch either
            let path = self.path_of(&key_hash);
            for length in 0..=self.depth {
                if !staged_lengths.contains(&length) {
                    by_position.remove(&path.prefix(length));
                }
            }
        }

        Ok(UpdateOutcome {
            new_root: current_root,
            nodes: by_position.into_values().collect(),
        })
    }

    /// Rebuild the path from a rewritten leaf slot up to the root
    fn recombine(
        &self,
        key_hash: &Digest,
        value: &[u8],
        root: &Digest,
        walk: &Walk,
    ) -> Result<UpdateOutcome, TreeError> {
        if let LeafSlot::Leaf {
            key_hash: resident, ..
        } = &walk.slot
        {
            if resident != key_hash {
                return Err(PathCollision {
                    in_tree: *resident,
                    inserted: *key_hash,
                    depth: self.depth,
                }
                .into());
            }
        }

        let path = self.path_of(key_hash);

        // the empty value is the deletion sentinel: the slot reverts to
        // empty instead of holding an empty-valued leaf
        let leaf = match value.is_empty() {
            true => None,
            false => Some(Node::Leaf {
                key_hash: *key_hash,
                value: value.to_vec(),
            }),
        };
        let mut current = match &leaf {
            Some(node) => node.hash::<H>(),
            None => *self.zero.level(0),
        };

        if current == walk.leaf_digest {
            // overwriting a value with itself, or deleting an absent key
            return Ok(UpdateOutcome {
                new_root: *root,
                nodes: Vec::new(),
            });
        }

        let mut nodes = Vec::with_capacity(self.depth + 1);
        if let Some(node) = leaf {
            nodes.push(NodeBlob {
                hash: current,
                bytes: node.to_bytes(),
                path: Some(path),
            });
        }

        for level in 1..=self.depth {
            let position = self.depth - level;
            let sibling = walk.siblings[position];

            let node = match path.bit(position) {
                false => Node::Internal {
                    left: current,
                    right: sibling,
                },
                true => Node::Internal {
                    left: sibling,
                    right: current,
                },
            };

            current = node.hash::<H>();
            if current != *self.zero.level(level) {
                nodes.push(NodeBlob {
                    hash: current,
                    bytes: node.to_bytes(),
                    path: Some(path.prefix(position)),
                });
            }
        }

        Ok(UpdateOutcome {
            new_root: current,
            nodes,
        })
    }
}

/// A read view over a base store plus a batch's not-yet-persisted nodes
struct StagedReader<'a, R: ?Sized> {
    staged: &'a HashMap<Digest, NodeBlob>,
    inner: &'a R,
}

#[async_trait]
impl<R: NodeReader + ?Sized> NodeReader for StagedReader<'_, R> {
    async fn read(&self, hash: &Digest) -> Result<Option<NodeBlob>, StorageError> {
        match self.staged.get(hash) {
            Some(node) => Ok(Some(node.clone())),
            None => self.inner.read(hash).await,
        }
    }
}
