use sha2::{Digest as _, Sha256};

use crate::Digest;

/// A hash function usable by the tree
///
/// Implementations are stateless: the tree only ever hashes complete,
/// domain-tagged inputs, so the trait exposes one-shot hashing plus a
/// multi-part variant for callers that want to avoid concatenating first.
/// Every implementation must produce 32-byte digests.
///
/// ```rust
/// # use primitives::{Sha256Hasher, TreeHasher};
/// let digest = Sha256Hasher::hash(b"abc");
///
/// assert_eq!(
///     digest.to_hex(),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
/// );
/// ```
pub trait TreeHasher {
    /// A short, stable identifier for this hash function
    ///
    /// Recorded in tree metadata and proofs; two trees interoperate only if
    /// their identifiers match exactly.
    const ALGORITHM_ID: &'static str;

    /// Hash a byte string
    fn hash(bytes: &[u8]) -> Digest;

    /// Hash the concatenation of `parts` without materializing it
    fn hash_parts(parts: &[&[u8]]) -> Digest {
        let mut bytes = Vec::new();
        for part in parts {
            bytes.extend_from_slice(part);
        }
        Self::hash(&bytes)
    }
}

/// SHA-256, the default hash function
pub struct Sha256Hasher;

impl TreeHasher for Sha256Hasher {
    const ALGORITHM_ID: &'static str = "sha-256";

    fn hash(bytes: &[u8]) -> Digest {
        Digest(Sha256::digest(bytes).into())
    }

    fn hash_parts(parts: &[&[u8]]) -> Digest {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Digest(hasher.finalize().into())
    }
}

/// BLAKE2b with a 32-byte output
pub struct Blake2b256Hasher;

impl TreeHasher for Blake2b256Hasher {
    const ALGORITHM_ID: &'static str = "blake2b-256";

    fn hash(bytes: &[u8]) -> Digest {
        Self::hash_parts(&[bytes])
    }

    fn hash_parts(parts: &[&[u8]]) -> Digest {
        let mut state = blake2b_simd::Params::new()
            .hash_length(Digest::SIZE)
            .to_state();
        for part in parts {
            state.update(part);
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(state.finalize().as_bytes());
        Digest(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            Sha256Hasher::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            Sha256Hasher::hash(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn blake2b256_known_vector() {
        assert_eq!(
            Blake2b256Hasher::hash(b"abc").to_hex(),
            "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319"
        );
    }

    #[test]
    fn algorithm_ids_are_distinct() {
        assert_ne!(Sha256Hasher::ALGORITHM_ID, Blake2b256Hasher::ALGORITHM_ID);
    }

    #[proptest]
    fn sha256_parts_match_concatenation(parts: Vec<Vec<u8>>) {
        let concatenated: Vec<u8> = parts.iter().flatten().copied().collect();
        let parts: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();

        assert_eq!(
            Sha256Hasher::hash_parts(&parts),
            Sha256Hasher::hash(&concatenated)
        );
    }

    #[proptest]
    fn blake2b_parts_match_concatenation(parts: Vec<Vec<u8>>) {
        let concatenated: Vec<u8> = parts.iter().flatten().copied().collect();
        let parts: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();

        assert_eq!(
            Blake2b256Hasher::hash_parts(&parts),
            Blake2b256Hasher::hash(&concatenated)
        );
    }

    #[proptest]
    fn hashers_disagree(bytes: Vec<u8>) {
        assert_ne!(Sha256Hasher::hash(&bytes), Blake2b256Hasher::hash(&bytes));
    }
}
