use primitives::{Digest, TreeHasher};

use crate::node::{Node, NodeKind};
use crate::storage::NodeReader;
use crate::tree::error::{Corruption, TreeError};
use crate::tree::SparseTree;

impl<H: TreeHasher> SparseTree<H> {
    /// Look up the value stored for `key` in the version at `root`
    ///
    /// `None` means the key stores nothing there, including the case where
    /// the key's slot is occupied by a colliding key. Reads at most
    /// `depth + 1` nodes and usually far fewer, since the first zero-hash
    /// on the path settles the answer.
    ///
    /// ```rust
    /// # use merkv::{MemoryStore, Sha256Hasher, SparseTree};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tree = SparseTree::<Sha256Hasher>::new(64)?;
    /// let store = MemoryStore::new();
    ///
    /// // the empty version answers without any storage reads
    /// assert_eq!(tree.get(b"alice", &tree.empty_root(), &store).await?, None);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<R>(
        &self,
        key: &[u8],
        root: &Digest,
        reader: &R,
    ) -> Result<Option<Vec<u8>>, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        let key_hash = self.hashed_key(key)?;
        self.get_hashed(&key_hash, root, reader).await
    }

    /// [`get`](Self::get) for a pre-hashed key
    #[tracing::instrument(level = "debug", err, skip_all, fields(root = %root, key_hash = %key_hash))]
    pub async fn get_hashed<R>(
        &self,
        key_hash: &Digest,
        root: &Digest,
        reader: &R,
    ) -> Result<Option<Vec<u8>>, TreeError>
    where
        R: NodeReader + ?Sized,
    {
        let path = self.path_of(key_hash);
        let mut current = *root;

        for level in (1..=self.depth).rev() {
            if current == *self.zero.level(level) {
                return Ok(None);
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

            current = match path.bit(self.depth - level) {
                false => left,
                true => right,
            };
        }

        if current == *self.zero.level(0) {
            return Ok(None);
        }

        match self.read_node(reader, &current).await? {
            Node::Leaf {
                key_hash: resident,
                value,
            } => Ok((resident == *key_hash).then_some(value)),
            Node::Internal { .. } => Err(Corruption::WrongKind {
                hash: current,
                level: 0,
                expected: NodeKind::Leaf,
                found: NodeKind::Internal,
            }
            .into()),
        }
    }
}
