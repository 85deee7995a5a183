use borsh::{BorshDeserialize, BorshSerialize};
use primitives::{Digest, TreeHasher};

use crate::zero::ZeroHashes;

/// Version of the serialized layouts: metadata, node encoding, proof wire
pub const FORMAT_VERSION: u32 = 1;

/// Version of the tree's traversal and proof semantics
pub const CORE_VERSION: u32 = 1;

/// The deepest supported tree, the bit width of a digest
pub const MAX_DEPTH: usize = Digest::BITS;

/// Immutable per-tree configuration
///
/// Created once when a tree is initialized, persisted through a
/// [`MetadataStore`](crate::MetadataStore), and validated whenever the tree
/// is reopened. Everything a verifier needs to interpret roots and proofs is
/// here: the hash algorithm, the depth, and the zero-hash table they imply.
///
/// The format version is the first serialized field, so a build confronted
/// with a future layout fails with a clear error instead of misreading it.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeMetadata {
    format_version: u32,
    core_version: u32,
    hash_algorithm_id: String,
    tree_depth: u32,
    zero_hashes: ZeroHashes,
}

impl TreeMetadata {
    /// Create the metadata record for a new tree of the given depth
    pub fn new<H: TreeHasher>(depth: usize) -> Result<Self, MetadataError> {
        if !(1..=MAX_DEPTH).contains(&depth) {
            return Err(MetadataError::DepthOutOfRange {
                depth,
                max: MAX_DEPTH,
            });
        }

        Ok(Self::from_parts(
            H::ALGORITHM_ID.to_owned(),
            depth as u32,
            ZeroHashes::compute::<H>(depth),
        ))
    }

    pub(crate) fn from_parts(
        hash_algorithm_id: String,
        tree_depth: u32,
        zero_hashes: ZeroHashes,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            core_version: CORE_VERSION,
            hash_algorithm_id,
            tree_depth,
            zero_hashes,
        }
    }

    /// Check that this metadata is usable by a tree driven by `H`
    ///
    /// Verifies the versions, the algorithm id, the depth bounds, and that
    /// the recorded zero-hash table matches a fresh recomputation for `H`.
    pub fn validate<H: TreeHasher>(&self) -> Result<(), MetadataError> {
        if self.format_version != FORMAT_VERSION {
            return Err(MetadataError::UnsupportedFormatVersion {
                found: self.format_version,
                supported: FORMAT_VERSION,
            });
        }

        if self.core_version != CORE_VERSION {
            return Err(MetadataError::UnsupportedCoreVersion {
                found: self.core_version,
                supported: CORE_VERSION,
            });
        }

        if self.hash_algorithm_id != H::ALGORITHM_ID {
            return Err(MetadataError::AlgorithmMismatch {
                metadata: self.hash_algorithm_id.clone(),
                hasher: H::ALGORITHM_ID,
            });
        }

        let depth = self.depth();
        if !(1..=MAX_DEPTH).contains(&depth) {
            return Err(MetadataError::DepthOutOfRange {
                depth,
                max: MAX_DEPTH,
            });
        }

        if self.zero_hashes != ZeroHashes::compute::<H>(depth) {
            return Err(MetadataError::ZeroTableMismatch);
        }

        Ok(())
    }

    /// The identifier of the hash algorithm this tree was created with
    #[inline]
    #[must_use]
    pub fn hash_algorithm_id(&self) -> &str {
        &self.hash_algorithm_id
    }

    /// The tree depth
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree_depth as usize
    }

    /// The recorded zero-hash table
    #[inline]
    #[must_use]
    pub fn zero_hashes(&self) -> &ZeroHashes {
        &self.zero_hashes
    }

    /// The serialized-layout version this record was written with
    #[inline]
    #[must_use]
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// The semantics version this record was written with
    #[inline]
    #[must_use]
    pub fn core_version(&self) -> u32 {
        self.core_version
    }

    /// Encode to the stable byte representation
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("metadata always serializes")
    }

    /// Decode a metadata record, checking the format version first
    ///
    /// The leading version is inspected before the rest of the bytes, so an
    /// unknown layout fails with [`MetadataError::UnsupportedFormatVersion`]
    /// rather than a decode error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        let version_bytes: [u8; 4] = bytes
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(MetadataError::Truncated)?;

        let format_version = u32::from_le_bytes(version_bytes);
        if format_version != FORMAT_VERSION {
            return Err(MetadataError::UnsupportedFormatVersion {
                found: format_version,
                supported: FORMAT_VERSION,
            });
        }

        borsh::from_slice(bytes).map_err(MetadataError::Undecodable)
    }
}

/// The ways tree configuration can be invalid or incompatible
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// A serialized layout this build doesn't read
    #[error("unsupported format version {found} (this build reads version {supported})")]
    UnsupportedFormatVersion {
        /// The version found in the record
        found: u32,
        /// The version this build reads
        supported: u32,
    },

    /// Tree semantics this build doesn't implement
    #[error("unsupported core version {found} (this build implements version {supported})")]
    UnsupportedCoreVersion {
        /// The version found in the record
        found: u32,
        /// The version this build implements
        supported: u32,
    },

    /// The metadata was created with a different hash algorithm
    #[error("metadata was created with hash algorithm {metadata}, but the tree uses {hasher}")]
    AlgorithmMismatch {
        /// The algorithm id recorded in the metadata
        metadata: String,
        /// The algorithm id of the configured hasher
        hasher: &'static str,
    },

    /// A depth outside `1..=MAX_DEPTH`
    #[error("tree depth {depth} is out of range (expected 1..={max})")]
    DepthOutOfRange {
        /// The rejected depth
        depth: usize,
        /// The deepest supported tree
        max: usize,
    },

    /// The recorded zero-hash table doesn't match the algorithm and depth
    #[error("recorded zero-hash table does not match the configured hash algorithm and depth")]
    ZeroTableMismatch,

    /// Too few bytes to even hold a format version
    #[error("metadata bytes are truncated")]
    Truncated,

    /// Bytes that don't decode as a metadata record
    #[error("metadata failed to decode")]
    Undecodable(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{Blake2b256Hasher, Sha256Hasher};

    #[test]
    fn new_metadata_validates() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(8).unwrap();

        assert_eq!(metadata.depth(), 8);
        assert_eq!(metadata.hash_algorithm_id(), "sha-256");
        assert_eq!(metadata.format_version(), FORMAT_VERSION);
        assert_eq!(metadata.core_version(), CORE_VERSION);
        metadata.validate::<Sha256Hasher>().unwrap();
    }

    #[test]
    fn rejects_out_of_range_depths() {
        assert!(matches!(
            TreeMetadata::new::<Sha256Hasher>(0),
            Err(MetadataError::DepthOutOfRange { depth: 0, .. })
        ));
        assert!(matches!(
            TreeMetadata::new::<Sha256Hasher>(257),
            Err(MetadataError::DepthOutOfRange { depth: 257, .. })
        ));
        assert!(TreeMetadata::new::<Sha256Hasher>(256).is_ok());
        assert!(TreeMetadata::new::<Sha256Hasher>(1).is_ok());
    }

    #[test]
    fn validate_catches_an_algorithm_mismatch() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(8).unwrap();

        assert!(matches!(
            metadata.validate::<Blake2b256Hasher>(),
            Err(MetadataError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn validate_catches_a_tampered_zero_table() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(4).unwrap();

        let mut levels = metadata.zero_hashes().levels().to_vec();
        levels[2] = Digest::from_u64(999);
        let tampered = TreeMetadata::from_parts(
            metadata.hash_algorithm_id().to_owned(),
            4,
            ZeroHashes::from_levels(levels),
        );

        assert!(matches!(
            tampered.validate::<Sha256Hasher>(),
            Err(MetadataError::ZeroTableMismatch)
        ));
    }

    #[test]
    fn byte_round_trip() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(16).unwrap();
        let decoded = TreeMetadata::from_bytes(&metadata.to_bytes()).unwrap();

        assert_eq!(decoded, metadata);
        decoded.validate::<Sha256Hasher>().unwrap();
    }

    #[test]
    fn decode_rejects_unknown_format_versions() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(4).unwrap();
        let mut bytes = metadata.to_bytes();
        bytes[0] = 99;

        assert!(matches!(
            TreeMetadata::from_bytes(&bytes),
            Err(MetadataError::UnsupportedFormatVersion { found: 99, .. })
        ));
    }

    #[test]
    fn decode_rejects_truncation() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(4).unwrap();
        let bytes = metadata.to_bytes();

        assert!(matches!(
            TreeMetadata::from_bytes(&bytes[..2]),
            Err(MetadataError::Truncated)
        ));
        assert!(matches!(
            TreeMetadata::from_bytes(&bytes[..bytes.len() - 1]),
            Err(MetadataError::Undecodable(_))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let metadata = TreeMetadata::new::<Sha256Hasher>(8).unwrap();
        let json = serde_json::to_string(&metadata).unwrap();
        let decoded: TreeMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, metadata);
    }
}
