//! Proof verification
//!
//! Verification is pure: fold the claimed leaf up the path against the
//! carried siblings and compare the result to the trusted root. A `bool`
//! answer means the proof was well formed and either matched the root or
//! did not; [`VerifyError`] is reserved for proofs that cannot be checked
//! at all because they were generated under a different configuration.

use primitives::{Digest, TreeHasher};
use thiserror::Error;

use crate::hash::{internal_hash, leaf_hash};
use crate::proof::{InclusionProof, NonInclusionKind, NonInclusionProof, Proof, Siblings};
use crate::tree::SparseTree;

/// A proof that cannot be checked against this tree's configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The proof was generated with a different hash algorithm
    #[error("proof was generated with hash algorithm `{proof}`, verifier uses `{verifier}`")]
    AlgorithmMismatch {
        /// The algorithm id carried by the proof
        proof: String,
        /// The algorithm id of the verifying tree
        verifier: &'static str,
    },
    /// The proof was generated against a tree of a different depth
    #[error("proof is for depth {proof}, verifier is configured for depth {verifier}")]
    DepthMismatch {
        /// The depth carried by the proof
        proof: usize,
        /// The depth of the verifying tree
        verifier: usize,
    },
}

impl<H: TreeHasher> SparseTree<H> {
    /// Check an inclusion proof against a trusted root
    ///
    /// `Ok(true)` means the version at `root` maps the proof's key to the
    /// proof's value. `Ok(false)` means the proof does not hold under this
    /// root; it may well hold under another.
    pub fn verify_inclusion(
        &self,
        proof: &InclusionProof,
        root: &Digest,
    ) -> Result<bool, VerifyError> {
        self.check_shape(proof.depth, &proof.hash_algorithm_id, &proof.siblings)?;

        let leaf = leaf_hash::<H>(&proof.key_hash, &proof.value);
        Ok(self.fold(leaf, &proof.key_hash, &proof.siblings) == *root)
    }

    /// Check a non-inclusion proof against a trusted root
    ///
    /// `Ok(true)` means the version at `root` stores nothing for the
    /// proof's key.
    pub fn verify_non_inclusion(
        &self,
        proof: &NonInclusionProof,
        root: &Digest,
    ) -> Result<bool, VerifyError> {
        self.check_shape(proof.depth, &proof.hash_algorithm_id, &proof.siblings)?;

        let leaf = match &proof.kind {
            NonInclusionKind::EmptyPath => *self.zero_hashes().level(0),
            NonInclusionKind::LeafMismatch { key_hash, value } => {
                // a resident leaf for the queried key proves inclusion,
                // whatever the proof claims
                if *key_hash == proof.key_hash {
                    return Ok(false);
                }
                leaf_hash::<H>(key_hash, value)
            }
        };

        Ok(self.fold(leaf, &proof.key_hash, &proof.siblings) == *root)
    }

    /// Check either kind of proof against a trusted root
    pub fn verify(&self, proof: &Proof, root: &Digest) -> Result<bool, VerifyError> {
        match proof {
            Proof::Inclusion(proof) => self.verify_inclusion(proof, root),
            Proof::NonInclusion(proof) => self.verify_non_inclusion(proof, root),
        }
    }

    fn check_shape(
        &self,
        depth: usize,
        algorithm: &str,
        siblings: &Siblings,
    ) -> Result<(), VerifyError> {
        if algorithm != H::ALGORITHM_ID {
            return Err(VerifyError::AlgorithmMismatch {
                proof: algorithm.to_owned(),
                verifier: H::ALGORITHM_ID,
            });
        }
        if depth != self.depth() {
            return Err(VerifyError::DepthMismatch {
                proof: depth,
                verifier: self.depth(),
            });
        }
        if siblings.len() != self.depth() {
            return Err(VerifyError::DepthMismatch {
                proof: siblings.len(),
                verifier: self.depth(),
            });
        }
        Ok(())
    }

    /// Recompute the root from a leaf digest and the path's siblings
    fn fold(&self, leaf: Digest, key_hash: &Digest, siblings: &Siblings) -> Digest {
        let path = self.path_of(key_hash);
        let resolved = siblings.resolve(self.zero_hashes());

        let mut current = leaf;
        for position in (0..self.depth()).rev() {
            let sibling = &resolved[position];
            current = match path.bit(position) {
                false => internal_hash::<H>(&current, sibling),
                true => internal_hash::<H>(sibling, &current),
            };
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, NodeWriter};
    use primitives::Sha256Hasher;

    async fn single_leaf_tree() -> (SparseTree<Sha256Hasher>, MemoryStore, Digest) {
        let tree = SparseTree::<Sha256Hasher>::new(8).unwrap();
        let store = MemoryStore::new();
        let outcome = tree
            .update(b"alice", b"100", &tree.empty_root(), &store)
            .await
            .unwrap();
        let root = outcome.new_root;
        store.write_batch(outcome.nodes).await.unwrap();
        (tree, store, root)
    }

    #[tokio::test]
    async fn a_resident_leaf_for_the_queried_key_never_proves_absence() {
        let (tree, store, root) = single_leaf_tree().await;

        let inclusion = tree
            .prove_inclusion(b"alice", &root, &store)
            .await
            .unwrap()
            .unwrap();
        assert!(tree.verify_inclusion(&inclusion, &root).unwrap());

        // repackage the inclusion data as a mismatch claim about itself
        let masquerade = NonInclusionProof {
            key_hash: inclusion.key_hash(),
            kind: NonInclusionKind::LeafMismatch {
                key_hash: inclusion.key_hash(),
                value: inclusion.value().to_vec(),
            },
            depth: inclusion.depth(),
            hash_algorithm_id: inclusion.hash_algorithm_id().to_owned(),
            siblings: inclusion.siblings().clone(),
            is_compressed: false,
        };

        assert_eq!(tree.verify_non_inclusion(&masquerade, &root), Ok(false));
    }

    #[tokio::test]
    async fn a_truncated_sibling_list_is_refused() {
        let (tree, store, root) = single_leaf_tree().await;

        let mut proof = tree
            .prove_inclusion(b"alice", &root, &store)
            .await
            .unwrap()
            .unwrap();
        proof.siblings = Siblings::explicit(vec![Digest::ZERO; 4]);

        assert_eq!(
            tree.verify_inclusion(&proof, &root),
            Err(VerifyError::DepthMismatch { proof: 4, verifier: 8 }),
        );
    }
}
