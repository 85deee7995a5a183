//! Proof generation

use primitives::{Digest, TreeHasher};

use crate::proof::{InclusionProof, NonInclusionKind, NonInclusionProof, Siblings};
use crate::storage::NodeReader;
use crate::tree::{LeafSlot, SparseTree, TreeError, Walk};

impl<H: TreeHasher> SparseTree<H> {
    /// Prove that `key` maps to a value in the version at `root`
    ///
    /// Answers `None` when the key stores nothing there; ask
    /// [`prove_non_inclusion`](Self::prove_non_inclusion) for the
    /// complementary proof. Proofs come out uncompressed; call
    /// [`InclusionProof::compressed`] to elide zero-hash siblings before
    /// sending one anywhere.
    ///
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # use merkv::{MemoryStore, NodeWriter, Sha256Hasher, SparseTree};
    /// let tree = SparseTree::<Sha256Hasher>::new(32)?;
    /// let store = MemoryStore::new();
    ///
    /// let outcome = tree.update(b"alice", b"100", &tree.empty_root(), &store).await?;
    /// store.write_batch(outcome.nodes).await?;
    ///
    /// let proof = tree
    ///     .prove_inclusion(b"alice", &outcome.new_root, &store)
    ///     .await?
    ///     .ok_or("missing")?;
    ///
    /// // verification needs no storage, only the trusted root
    /// assert!(tree.verify_inclusion(&proof, &outcome.new_root)?);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn prove_inclusion<R: NodeReader + ?Sized>(
        &self,
        key: &[u8],
        root: &Digest,
        reader: &R,
    ) -> Result<Option<InclusionProof>, TreeError> {
        let key_hash = self.hashed_key(key)?;
        self.prove_inclusion_hashed(&key_hash, root, reader).await
    }

    /// [`prove_inclusion`](Self::prove_inclusion) for an already-hashed key
    #[tracing::instrument(level = "debug", err, skip_all, fields(root = %root, key_hash = %key_hash))]
    pub async fn prove_inclusion_hashed<R: NodeReader + ?Sized>(
        &self,
        key_hash: &Digest,
        root: &Digest,
        reader: &R,
    ) -> Result<Option<InclusionProof>, TreeError> {
        let Walk { siblings, slot, .. } = self.walk(key_hash, root, reader).await?;

        let LeafSlot::Leaf { key_hash: resident, value } = slot else {
            return Ok(None);
        };
        if resident != *key_hash {
            return Ok(None);
        }

        Ok(Some(InclusionProof {
            key_hash: *key_hash,
            value,
            depth: self.depth(),
            hash_algorithm_id: H::ALGORITHM_ID.to_owned(),
            siblings: Siblings::explicit(siblings),
            is_compressed: false,
        }))
    }

    /// Prove that `key` stores nothing in the version at `root`
    ///
    /// Answers `None` when the key does map to a value there. The proof's
    /// [`kind`](NonInclusionProof::kind) records what the key's path runs
    /// into instead: an empty slot, or (in trees shallow enough for path
    /// collisions) a leaf for a different key.
    pub async fn prove_non_inclusion<R: NodeReader + ?Sized>(
        &self,
        key: &[u8],
        root: &Digest,
        reader: &R,
    ) -> Result<Option<NonInclusionProof>, TreeError> {
        let key_hash = self.hashed_key(key)?;
        self.prove_non_inclusion_hashed(&key_hash, root, reader).await
    }

    /// [`prove_non_inclusion`](Self::prove_non_inclusion) for an already-hashed key
    #[tracing::instrument(level = "debug", err, skip_all, fields(root = %root, key_hash = %key_hash))]
    pub async fn prove_non_inclusion_hashed<R: NodeReader + ?Sized>(
        &self,
        key_hash: &Digest,
        root: &Digest,
        reader: &R,
    ) -> Result<Option<NonInclusionProof>, TreeError> {
        let Walk { siblings, slot, .. } = self.walk(key_hash, root, reader).await?;

        let kind = match slot {
            LeafSlot::Empty => NonInclusionKind::EmptyPath,
            LeafSlot::Leaf { key_hash: resident, .. } if resident == *key_hash => {
                return Ok(None);
            }
            LeafSlot::Leaf { key_hash: resident, value } => NonInclusionKind::LeafMismatch {
                key_hash: resident,
                value,
            },
        };

        Ok(Some(NonInclusionProof {
            key_hash: *key_hash,
            kind,
            depth: self.depth(),
            hash_algorithm_id: H::ALGORITHM_ID.to_owned(),
            siblings: Siblings::explicit(siblings),
            is_compressed: false,
        }))
    }
}
