//! Domain-separated hashing for keys and nodes
//!
//! Every hash the tree computes falls into one of three categories, each
//! tagged with its own leading domain byte: key hashes, leaf hashes, and
//! internal hashes. The tags are distinct, so a computation in one category
//! can never collide with a computation in another: a leaf can't be
//! reinterpreted as an internal node, and a key can't be chosen to equal a
//! node hash.

use primitives::{Digest, TreeHasher};

/// Domain tag for leaf node hashes
pub const LEAF_DOMAIN: u8 = 0x00;

/// Domain tag for internal node hashes
pub const INTERNAL_DOMAIN: u8 = 0x01;

/// Domain tag for key hashes
pub const KEY_DOMAIN: u8 = 0x02;

/// Map an arbitrary-length key into the digest space
///
/// Keys are hashed before path derivation, so an attacker who controls keys
/// still cannot choose tree paths directly.
///
/// ```rust
/// # use merkv::{hash::key_hash, Sha256Hasher};
/// let digest = key_hash::<Sha256Hasher>(b"alice");
///
/// assert_eq!(
///     digest.to_hex(),
///     "fba4c3be56d4071c375fb91cdd915a8cdd0d0a8e5d1eb14cc822f6ebe2d5948d",
/// );
/// ```
#[must_use]
pub fn key_hash<H: TreeHasher>(key: &[u8]) -> Digest {
    H::hash_parts(&[&[KEY_DOMAIN], key])
}

/// The hash of a leaf node holding `value` for `key_hash`
#[must_use]
pub fn leaf_hash<H: TreeHasher>(key_hash: &Digest, value: &[u8]) -> Digest {
    H::hash_parts(&[&[LEAF_DOMAIN], key_hash.inner(), value])
}

/// The hash of an internal node with children `left` and `right`
#[must_use]
pub fn internal_hash<H: TreeHasher>(left: &Digest, right: &Digest) -> Digest {
    H::hash_parts(&[&[INTERNAL_DOMAIN], left.inner(), right.inner()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::Sha256Hasher;
    use test_strategy::proptest;

    #[test]
    fn categories_never_collide() {
        let digest = Digest::from_u64(7);
        let payload = digest.to_vec();

        let as_key = key_hash::<Sha256Hasher>(&payload);
        let as_leaf = leaf_hash::<Sha256Hasher>(&digest, &[]);
        let as_internal = internal_hash::<Sha256Hasher>(&digest, &Digest::ZERO);

        assert_ne!(as_key, as_leaf);
        assert_ne!(as_key, as_internal);
        assert_ne!(as_leaf, as_internal);
    }

    #[test]
    fn known_vectors() {
        let alice = key_hash::<Sha256Hasher>(b"alice");
        assert_eq!(
            alice.to_hex(),
            "fba4c3be56d4071c375fb91cdd915a8cdd0d0a8e5d1eb14cc822f6ebe2d5948d"
        );

        assert_eq!(
            leaf_hash::<Sha256Hasher>(&alice, b"100").to_hex(),
            "948bc4c3c31fc25877f369588910006c67dc3f2f013d508c0dda5b69808b424e"
        );
    }

    #[proptest]
    fn key_hashing_is_deterministic(key: Vec<u8>) {
        assert_eq!(
            key_hash::<Sha256Hasher>(&key),
            key_hash::<Sha256Hasher>(&key)
        );
    }

    #[proptest]
    fn internal_hash_is_order_sensitive(left: Digest, right: Digest) {
        proptest::prop_assume!(left != right);

        assert_ne!(
            internal_hash::<Sha256Hasher>(&left, &right),
            internal_hash::<Sha256Hasher>(&right, &left)
        );
    }
}
