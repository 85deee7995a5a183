//! Self-contained proofs of inclusion and non-inclusion
//!
//! A proof carries everything a verifier needs beyond the root it already
//! trusts: the key hash, the claim, the tree shape, the hash algorithm id,
//! and the sibling hashes along the key's path. Verification recomputes
//! the root from the claimed leaf and compares; storage is never touched.
//!
//! ## Compression
//!
//! In a sparse tree most siblings are zero-hashes, which the verifier can
//! recompute for free. [`InclusionProof::compressed`] (and its
//! non-inclusion twin) elides them behind a bitmask, shrinking a
//! depth-256 proof of a near-empty tree from kilobytes to tens of bytes.
//! Compression never changes what a proof claims, only how it is written
//! down; both forms verify identically.
//!
//! ## Wire format
//!
//! `to_bytes`/[`Proof::from_bytes`] implement a versioned, strict byte
//! encoding meant for transport and archival. Strict means every byte is
//! accounted for: unknown versions, types, or flag bits, set padding
//! bits, and trailing bytes are all refused as [`MalformedProof`].

mod generate;
mod verify;
mod wire;

pub use verify::VerifyError;
pub use wire::MalformedProof;

use bitvec::prelude::{BitVec, Lsb0};
use primitives::Digest;

use crate::zero::ZeroHashes;

/// The sibling hashes along one root-to-leaf path
///
/// Kept in path order: position 0 is the sibling adjacent to the root,
/// position `len - 1` the one adjacent to the leaf. Each position is
/// either explicit (its hash is carried) or implicit (elided because it
/// equals the zero-hash for its level); bit `p` of the mask is set when
/// position `p` is explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Siblings {
    mask: BitVec<u8, Lsb0>,
    hashes: Vec<Digest>,
}

impl Siblings {
    /// A fully explicit sibling list
    pub(crate) fn explicit(hashes: Vec<Digest>) -> Self {
        Self {
            mask: BitVec::repeat(true, hashes.len()),
            hashes,
        }
    }

    pub(crate) fn from_parts(mask: BitVec<u8, Lsb0>, hashes: Vec<Digest>) -> Self {
        debug_assert_eq!(mask.count_ones(), hashes.len());
        Self { mask, hashes }
    }

    /// How many positions the path has (the proof's tree depth)
    #[must_use]
    pub fn len(&self) -> usize {
        self.mask.len()
    }

    /// Whether the path has no positions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// How many positions carry their hash explicitly
    #[must_use]
    pub fn explicit_count(&self) -> usize {
        self.hashes.len()
    }

    /// Whether position `position` carries its hash explicitly
    #[must_use]
    pub fn is_explicit(&self, position: usize) -> bool {
        self.mask[position]
    }

    /// Whether no position is elided
    #[must_use]
    pub fn is_fully_explicit(&self) -> bool {
        self.mask.all()
    }

    /// The explicitly carried hashes, in path order
    #[must_use]
    pub fn hashes(&self) -> &[Digest] {
        &self.hashes
    }

    /// All `len` sibling hashes, elisions filled in from the zero table
    pub(crate) fn resolve(&self, zero: &ZeroHashes) -> Vec<Digest> {
        debug_assert_eq!(zero.depth(), self.len());

        let depth = self.len();
        let mut explicit = self.hashes.iter();

        (0..depth)
            .map(|position| match self.mask[position] {
                true => *explicit
                    .next()
                    .expect("mask popcount matches the hash count"),
                // the sibling at position p roots a subtree whose top is
                // depth - 1 - p levels above the leaves
                false => *zero.level(depth - 1 - position),
            })
            .collect()
    }

    /// Re-encode with every zero-hash sibling elided
    pub(crate) fn compressed(&self, zero: &ZeroHashes) -> Self {
        let depth = self.len();
        let mut mask = BitVec::repeat(false, depth);
        let mut hashes = Vec::new();

        for (position, sibling) in self.resolve(zero).into_iter().enumerate() {
            if sibling != *zero.level(depth - 1 - position) {
                mask.set(position, true);
                hashes.push(sibling);
            }
        }

        Self { mask, hashes }
    }

    /// Re-encode with every sibling explicit
    pub(crate) fn decompressed(&self, zero: &ZeroHashes) -> Self {
        Self::explicit(self.resolve(zero))
    }

    /// The mask packed into bytes, least-significant bit first
    pub(crate) fn mask_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len().div_ceil(8)];
        for position in self.mask.iter_ones() {
            bytes[position / 8] |= 1 << (position % 8);
        }
        bytes
    }
}

/// Proof that a key maps to a value in the version at some root
///
/// Produced by [`SparseTree::prove_inclusion`](crate::SparseTree::prove_inclusion)
/// and checked by [`SparseTree::verify_inclusion`](crate::SparseTree::verify_inclusion).
/// The root is deliberately not a field: verification is always "does
/// this proof check out under the root *I* trust".
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InclusionProof {
    pub(crate) key_hash: Digest,
    #[cfg_attr(feature = "serde", serde(with = "hex::serde"))]
    pub(crate) value: Vec<u8>,
    pub(crate) depth: usize,
    pub(crate) hash_algorithm_id: String,
    pub(crate) siblings: Siblings,
    pub(crate) is_compressed: bool,
}

impl InclusionProof {
    /// The hash of the proven key
    #[must_use]
    pub fn key_hash(&self) -> Digest {
        self.key_hash
    }

    /// The value the proof claims the key maps to
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The depth of the tree the proof was generated against
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The id of the hash algorithm the proof was generated with
    #[must_use]
    pub fn hash_algorithm_id(&self) -> &str {
        &self.hash_algorithm_id
    }

    /// The sibling hashes along the key's path
    #[must_use]
    pub fn siblings(&self) -> &Siblings {
        &self.siblings
    }

    /// Whether zero-hash siblings are elided
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    /// This proof with every zero-hash sibling elided
    ///
    /// # Panics
    ///
    /// Panics if `zero` was computed for a different depth than the proof;
    /// use the table of the tree that generated it.
    #[must_use]
    pub fn compressed(&self, zero: &ZeroHashes) -> Self {
        assert_eq!(zero.depth(), self.depth, "zero-hash table depth must match the proof");
        Self {
            siblings: self.siblings.compressed(zero),
            is_compressed: true,
            ..self.clone()
        }
    }

    /// This proof with every sibling carried explicitly
    ///
    /// # Panics
    ///
    /// Panics if `zero` was computed for a different depth than the proof.
    #[must_use]
    pub fn decompressed(&self, zero: &ZeroHashes) -> Self {
        assert_eq!(zero.depth(), self.depth, "zero-hash table depth must match the proof");
        Self {
            siblings: self.siblings.decompressed(zero),
            is_compressed: false,
            ..self.clone()
        }
    }
}

/// Proof that a key stores nothing in the version at some root
///
/// Comes in two shapes, depending on what the key's path runs into; see
/// [`NonInclusionKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NonInclusionProof {
    pub(crate) key_hash: Digest,
    pub(crate) kind: NonInclusionKind,
    pub(crate) depth: usize,
    pub(crate) hash_algorithm_id: String,
    pub(crate) siblings: Siblings,
    pub(crate) is_compressed: bool,
}

/// How absence shows up at the end of a key's path
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NonInclusionKind {
    /// The path ends in an empty slot
    EmptyPath,
    /// The slot is occupied by a leaf for a different key hash, which can
    /// only happen at depths shallow enough for path collisions
    LeafMismatch {
        /// The resident leaf's key hash
        key_hash: Digest,
        /// The resident leaf's value
        #[cfg_attr(feature = "serde", serde(with = "hex::serde"))]
        value: Vec<u8>,
    },
}

impl NonInclusionProof {
    /// The hash of the key proven absent
    #[must_use]
    pub fn key_hash(&self) -> Digest {
        self.key_hash
    }

    /// What the key's path runs into instead of its own leaf
    #[must_use]
    pub fn kind(&self) -> &NonInclusionKind {
        &self.kind
    }

    /// The depth of the tree the proof was generated against
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The id of the hash algorithm the proof was generated with
    #[must_use]
    pub fn hash_algorithm_id(&self) -> &str {
        &self.hash_algorithm_id
    }

    /// The sibling hashes along the key's path
    #[must_use]
    pub fn siblings(&self) -> &Siblings {
        &self.siblings
    }

    /// Whether zero-hash siblings are elided
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    /// This proof with every zero-hash sibling elided
    ///
    /// # Panics
    ///
    /// Panics if `zero` was computed for a different depth than the proof.
    #[must_use]
    pub fn compressed(&self, zero: &ZeroHashes) -> Self {
        assert_eq!(zero.depth(), self.depth, "zero-hash table depth must match the proof");
        Self {
            siblings: self.siblings.compressed(zero),
            is_compressed: true,
            ..self.clone()
        }
    }

    /// This proof with every sibling carried explicitly
    ///
    /// # Panics
    ///
    /// Panics if `zero` was computed for a different depth than the proof.
    #[must_use]
    pub fn decompressed(&self, zero: &ZeroHashes) -> Self {
        assert_eq!(zero.depth(), self.depth, "zero-hash table depth must match the proof");
        Self {
            siblings: self.siblings.decompressed(zero),
            is_compressed: false,
            ..self.clone()
        }
    }
}

/// Either kind of proof, as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Proof {
    /// The key maps to a value
    Inclusion(InclusionProof),
    /// The key stores nothing
    NonInclusion(NonInclusionProof),
}

impl Proof {
    /// The hash of the key the proof is about
    #[must_use]
    pub fn key_hash(&self) -> Digest {
        match self {
            Proof::Inclusion(proof) => proof.key_hash,
            Proof::NonInclusion(proof) => proof.key_hash,
        }
    }

    /// The depth of the tree the proof was generated against
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Proof::Inclusion(proof) => proof.depth,
            Proof::NonInclusion(proof) => proof.depth,
        }
    }

    /// The id of the hash algorithm the proof was generated with
    #[must_use]
    pub fn hash_algorithm_id(&self) -> &str {
        match self {
            Proof::Inclusion(proof) => &proof.hash_algorithm_id,
            Proof::NonInclusion(proof) => &proof.hash_algorithm_id,
        }
    }

    /// Whether zero-hash siblings are elided
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        match self {
            Proof::Inclusion(proof) => proof.is_compressed,
            Proof::NonInclusion(proof) => proof.is_compressed,
        }
    }

    /// This proof with every zero-hash sibling elided
    ///
    /// # Panics
    ///
    /// Panics if `zero` was computed for a different depth than the proof.
    #[must_use]
    pub fn compressed(&self, zero: &ZeroHashes) -> Self {
        match self {
            Proof::Inclusion(proof) => Proof::Inclusion(proof.compressed(zero)),
            Proof::NonInclusion(proof) => Proof::NonInclusion(proof.compressed(zero)),
        }
    }

    /// This proof with every sibling carried explicitly
    ///
    /// # Panics
    ///
    /// Panics if `zero` was computed for a different depth than the proof.
    #[must_use]
    pub fn decompressed(&self, zero: &ZeroHashes) -> Self {
        match self {
            Proof::Inclusion(proof) => Proof::Inclusion(proof.decompressed(zero)),
            Proof::NonInclusion(proof) => Proof::NonInclusion(proof.decompressed(zero)),
        }
    }
}

impl From<InclusionProof> for Proof {
    fn from(proof: InclusionProof) -> Self {
        Proof::Inclusion(proof)
    }
}

impl From<NonInclusionProof> for Proof {
    fn from(proof: NonInclusionProof) -> Self {
        Proof::NonInclusion(proof)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::Siblings;
    use bitvec::prelude::BitVec;
    use primitives::Digest;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// `Siblings` as `{ "mask": [bool], "hashes": [hex] }`
    #[derive(Serialize, Deserialize)]
    struct Repr {
        mask: Vec<bool>,
        hashes: Vec<Digest>,
    }

    impl Serialize for Siblings {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            Repr {
                mask: self.mask.iter().by_vals().collect(),
                hashes: self.hashes.clone(),
            }
            .serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Siblings {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let repr = Repr::deserialize(deserializer)?;

            if repr.mask.len() > crate::metadata::MAX_DEPTH {
                return Err(D::Error::custom("sibling mask is longer than any supported depth"));
            }
            let explicit = repr.mask.iter().filter(|bit| **bit).count();
            if explicit != repr.hashes.len() {
                return Err(D::Error::custom("sibling hash count does not match the mask"));
            }

            let mut mask = BitVec::repeat(false, repr.mask.len());
            for (position, bit) in repr.mask.into_iter().enumerate() {
                mask.set(position, bit);
            }

            Ok(Siblings {
                mask,
                hashes: repr.hashes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_table(depth: usize) -> ZeroHashes {
        ZeroHashes::compute::<primitives::Sha256Hasher>(depth)
    }

    #[test]
    fn compression_round_trips() {
        let zero = zero_table(4);
        // positions 1 and 3 are real, 0 and 2 are the zero-hashes for
        // their levels (3, 2, 1, 0 from the root down)
        let full = Siblings::explicit(vec![
            *zero.level(3),
            Digest::from_u64(11),
            *zero.level(1),
            Digest::from_u64(13),
        ]);

        let compressed = full.compressed(&zero);
        assert_eq!(compressed.len(), 4);
        assert_eq!(compressed.explicit_count(), 2);
        assert!(!compressed.is_explicit(0));
        assert!(compressed.is_explicit(1));
        assert_eq!(compressed.hashes(), &[Digest::from_u64(11), Digest::from_u64(13)]);

        assert_eq!(compressed.resolve(&zero), full.resolve(&zero));
        assert_eq!(compressed.decompressed(&zero), full);

        // compressing twice changes nothing
        assert_eq!(compressed.compressed(&zero), compressed);
    }

    #[test]
    fn mask_bytes_pad_with_zeroes() {
        let mut hashes = vec![Digest::from_u64(1); 3];
        hashes.extend([Digest::from_u64(2); 6]);
        let siblings = Siblings::explicit(hashes);

        // 9 positions need 2 bytes; the top 7 bits of the second stay 0
        assert_eq!(siblings.mask_bytes(), vec![0xff, 0x01]);
        assert!(siblings.is_fully_explicit());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_rejects_a_mismatched_mask() {
        let zero = zero_table(2);
        let siblings = Siblings::explicit(vec![Digest::from_u64(1), *zero.level(0)]).compressed(&zero);

        let json = serde_json::to_value(&siblings).unwrap();
        let back: Siblings = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, siblings);

        // claim two explicit positions but carry one hash
        let mut forged = json;
        forged["mask"] = serde_json::json!([true, true]);
        assert!(serde_json::from_value::<Siblings>(forged).is_err());
    }
}
