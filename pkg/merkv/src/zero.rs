use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use primitives::{Digest, TreeHasher};

use crate::hash::internal_hash;

/// The table of empty-subtree hashes, one per level
///
/// Level 0 holds the all-zero "absent leaf" sentinel; each level above it is
/// the internal hash of two copies of the level below. An empty subtree of
/// height `h` therefore hashes to `level(h)` without any node being
/// materialized.
///
/// ```rust
/// # use merkv::{hash::internal_hash, Digest, Sha256Hasher, ZeroHashes};
/// let zero = ZeroHashes::compute::<Sha256Hasher>(8);
///
/// assert_eq!(*zero.level(0), Digest::ZERO);
/// assert_eq!(
///     *zero.level(3),
///     internal_hash::<Sha256Hasher>(zero.level(2), zero.level(2)),
/// );
/// ```
///
/// The table is shared behind an [`Arc`], so clones are cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZeroHashes {
    levels: Arc<[Digest]>,
}

impl ZeroHashes {
    /// Compute the table for a tree of the given depth
    ///
    /// Deterministic per `(H, depth)`: recomputing always yields an
    /// identical table. Costs `depth` hash operations.
    #[must_use]
    pub fn compute<H: TreeHasher>(depth: usize) -> Self {
        let mut levels = Vec::with_capacity(depth + 1);
        let mut current = Digest::ZERO;
        levels.push(current);

        for _ in 0..depth {
            current = internal_hash::<H>(&current, &current);
            levels.push(current);
        }

        Self {
            levels: levels.into(),
        }
    }

    pub(crate) fn from_levels(levels: Vec<Digest>) -> Self {
        Self {
            levels: levels.into(),
        }
    }

    /// The empty-subtree hash at `level`
    ///
    /// Panics if `level` exceeds the table's depth.
    #[inline]
    #[must_use]
    pub fn level(&self, level: usize) -> &Digest {
        &self.levels[level]
    }

    /// The hash of a fully empty tree, the table's top entry
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Digest {
        &self.levels[self.levels.len() - 1]
    }

    /// The tree depth this table was computed for
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// All entries, sentinel first
    #[inline]
    #[must_use]
    pub fn levels(&self) -> &[Digest] {
        &self.levels
    }
}

impl BorshSerialize for ZeroHashes {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        self.levels().serialize(writer)
    }
}

impl BorshDeserialize for ZeroHashes {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let levels = Vec::<Digest>::deserialize_reader(reader)?;
        if levels.is_empty() {
            return Err(borsh::io::Error::new(
                borsh::io::ErrorKind::InvalidData,
                "zero-hash table must have at least one level",
            ));
        }

        Ok(Self::from_levels(levels))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ZeroHashes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(self.levels(), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ZeroHashes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let levels = <Vec<Digest> as serde::Deserialize>::deserialize(deserializer)?;
        if levels.is_empty() {
            return Err(serde::de::Error::custom(
                "zero-hash table must have at least one level",
            ));
        }

        Ok(Self::from_levels(levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{Blake2b256Hasher, Sha256Hasher};

    #[test]
    fn sentinel_is_all_zero() {
        let zero = ZeroHashes::compute::<Sha256Hasher>(4);
        assert_eq!(*zero.level(0), Digest::ZERO);
        assert_eq!(zero.depth(), 4);
        assert_eq!(zero.levels().len(), 5);
    }

    #[test]
    fn chain_property_holds() {
        let zero = ZeroHashes::compute::<Sha256Hasher>(16);

        for level in 1..=16 {
            assert_eq!(
                *zero.level(level),
                internal_hash::<Sha256Hasher>(zero.level(level - 1), zero.level(level - 1)),
            );
        }
    }

    #[test]
    fn sha256_known_vectors() {
        let zero = ZeroHashes::compute::<Sha256Hasher>(256);

        assert_eq!(
            zero.level(1).to_hex(),
            "ae0798d0ecaed2b778eddebf18f071a561c53658c05e76cedecc27cafbdbc577"
        );
        assert_eq!(
            zero.level(2).to_hex(),
            "90534fe0aff6db9edb29eee74e78a386916a581c8e6465349493e1a6c87241e1"
        );
        assert_eq!(
            zero.level(8).to_hex(),
            "8e4b3745e5f2f7d48e36b192cb39242fa0f7a76fac1e36a519d8ebe00f3e21fb"
        );
        assert_eq!(
            zero.level(64).to_hex(),
            "cf2d05fab95ef9818c63931581abea59294c115de9465fceba4f4a077ce22678"
        );
        assert_eq!(
            zero.root().to_hex(),
            "6155289130893872355eac98042d22aefa2c2e708bea169402760e3b55f9a2dc"
        );
    }

    #[test]
    fn blake2b_known_vector() {
        let zero = ZeroHashes::compute::<Blake2b256Hasher>(1);
        assert_eq!(
            zero.root().to_hex(),
            "086dabbfde6914778334b717e94921e353b7cc3f103cd2d19c5a825f30c067cc"
        );
    }

    #[test]
    fn recomputation_is_identical() {
        let first = ZeroHashes::compute::<Sha256Hasher>(32);
        let second = ZeroHashes::compute::<Sha256Hasher>(32);
        assert_eq!(first, second);
    }

    #[test]
    fn hashers_produce_different_tables() {
        let sha = ZeroHashes::compute::<Sha256Hasher>(8);
        let blake = ZeroHashes::compute::<Blake2b256Hasher>(8);
        assert_ne!(sha.root(), blake.root());
    }

    #[test]
    fn borsh_round_trip() {
        let zero = ZeroHashes::compute::<Sha256Hasher>(8);
        let bytes = borsh::to_vec(&zero).unwrap();
        let decoded: ZeroHashes = borsh::from_slice(&bytes).unwrap();
        assert_eq!(decoded, zero);
    }

    #[test]
    fn borsh_rejects_an_empty_table() {
        let empty: Vec<Digest> = Vec::new();
        let bytes = borsh::to_vec(&empty).unwrap();
        assert!(borsh::from_slice::<ZeroHashes>(&bytes).is_err());
    }
}
