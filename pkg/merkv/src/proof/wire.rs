//! The versioned byte encoding of proofs
//!
//! A proof encodes as, all integers little-endian:
//!
//! ```text
//! version     u8       currently 1
//! type        u8       0 inclusion, 1 empty-path, 2 leaf-mismatch
//! flags       u8       bit 0 set when zero-hash siblings are elided
//! key_hash    32 bytes
//! claim       by type:
//!               inclusion      u32 length + value bytes
//!               empty-path     nothing
//!               leaf-mismatch  32-byte resident key hash, then
//!                              u32 length + resident value bytes
//! depth       u32
//! algorithm   u32 length + UTF-8 id
//! mask        ceil(depth / 8) bytes; bit p % 8 of byte p / 8 is set
//!             when position p carries its sibling explicitly
//! siblings    32 bytes per explicit position, in path order
//! ```
//!
//! Decoding is strict: every deviation maps to a [`MalformedProof`].

use bitvec::prelude::BitVec;
use primitives::Digest;
use thiserror::Error;

use crate::metadata::MAX_DEPTH;
use crate::proof::{InclusionProof, NonInclusionKind, NonInclusionProof, Proof, Siblings};

const WIRE_VERSION: u8 = 1;

const TYPE_INCLUSION: u8 = 0;
const TYPE_NON_INCLUSION_EMPTY: u8 = 1;
const TYPE_NON_INCLUSION_MISMATCH: u8 = 2;

const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Bytes that do not decode as a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedProof {
    /// The version byte names an encoding this build does not read
    #[error("unsupported proof wire version {found} (this build reads version {supported})")]
    UnsupportedVersion {
        /// The version byte found in the input
        found: u8,
        /// The version this build reads
        supported: u8,
    },
    /// The type byte names no known proof type
    #[error("unknown proof type byte {0}")]
    UnknownProofType(u8),
    /// A flag bit this build does not know is set
    #[error("unknown flag bits {0:#010b}")]
    UnknownFlags(u8),
    /// The input ends before the encoding is complete
    #[error("proof bytes end before the encoding is complete")]
    Truncated,
    /// The input continues past the end of the encoding
    #[error("proof bytes continue past the end of the encoding")]
    TrailingBytes,
    /// The hash algorithm id is not valid UTF-8
    #[error("hash algorithm id is not valid UTF-8")]
    InvalidAlgorithmId,
    /// The carried depth is outside the supported range
    #[error("depth {depth} is outside the supported range 1..={max}")]
    DepthOutOfRange {
        /// The depth found in the input
        depth: usize,
        /// The deepest supported tree
        max: usize,
    },
    /// An uncompressed proof elides siblings its flag says it carries
    #[error("an uncompressed proof must carry every sibling")]
    MissingSiblings,
    /// A mask bit past the tree depth is set
    #[error("sibling mask has bits set past the tree depth")]
    PaddingBits,
}

struct Cursor<'a> {
    bytes: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8, MalformedProof> {
        let (first, rest) = self.bytes.split_first().ok_or(MalformedProof::Truncated)?;
        self.bytes = rest;
        Ok(*first)
    }

    fn u32(&mut self) -> Result<u32, MalformedProof> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("take answers exactly four bytes")))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MalformedProof> {
        if self.bytes.len() < len {
            return Err(MalformedProof::Truncated);
        }
        let (taken, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Ok(taken)
    }

    fn digest(&mut self) -> Result<Digest, MalformedProof> {
        let bytes = self.take(Digest::SIZE)?;
        Ok(Digest::new(bytes.try_into().expect("take answers exactly digest-sized slices")))
    }

    /// A u32 length prefix followed by that many bytes
    fn bytes(&mut self) -> Result<Vec<u8>, MalformedProof> {
        let len = usize::try_from(self.u32()?).expect("u32 fits in usize");
        // the length is validated against the remaining input before any
        // allocation happens
        Ok(self.take(len)?.to_vec())
    }

    fn finish(self) -> Result<(), MalformedProof> {
        match self.bytes.is_empty() {
            true => Ok(()),
            false => Err(MalformedProof::TrailingBytes),
        }
    }
}

fn header(proof_type: u8, is_compressed: bool) -> Vec<u8> {
    let flags = match is_compressed {
        true => FLAG_COMPRESSED,
        false => 0,
    };
    vec![WIRE_VERSION, proof_type, flags]
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).expect("value and id lengths fit in 32 bits");
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
}

fn put_tail(out: &mut Vec<u8>, depth: usize, algorithm: &str, siblings: &Siblings) {
    let depth = u32::try_from(depth).expect("depth is range-checked at construction");
    out.extend_from_slice(&depth.to_le_bytes());
    put_bytes(out, algorithm.as_bytes());
    out.extend_from_slice(&siblings.mask_bytes());
    for hash in siblings.hashes() {
        out.extend_from_slice(hash.inner());
    }
}

fn read_siblings(cursor: &mut Cursor<'_>, depth: usize) -> Result<Siblings, MalformedProof> {
    let mask_bytes = cursor.take(depth.div_ceil(8))?;

    let mut mask = BitVec::repeat(false, depth);
    let mut explicit = 0;
    for position in 0..mask_bytes.len() * 8 {
        let set = mask_bytes[position / 8] & (1 << (position % 8)) != 0;
        match (set, position < depth) {
            (true, true) => {
                mask.set(position, true);
                explicit += 1;
            }
            (true, false) => return Err(MalformedProof::PaddingBits),
            (false, _) => {}
        }
    }

    let mut hashes = Vec::with_capacity(explicit);
    for _ in 0..explicit {
        hashes.push(cursor.digest()?);
    }

    Ok(Siblings::from_parts(mask, hashes))
}

impl InclusionProof {
    /// Encode for transport
    ///
    /// # Panics
    ///
    /// Panics if the value is longer than `u32::MAX` bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = header(TYPE_INCLUSION, self.is_compressed);
        out.extend_from_slice(self.key_hash.inner());
        put_bytes(&mut out, &self.value);
        put_tail(&mut out, self.depth, &self.hash_algorithm_id, &self.siblings);
        out
    }
}

impl NonInclusionProof {
    /// Encode for transport
    ///
    /// # Panics
    ///
    /// Panics if a resident value is longer than `u32::MAX` bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let proof_type = match &self.kind {
            NonInclusionKind::EmptyPath => TYPE_NON_INCLUSION_EMPTY,
            NonInclusionKind::LeafMismatch { .. } => TYPE_NON_INCLUSION_MISMATCH,
        };

        let mut out = header(proof_type, self.is_compressed);
        out.extend_from_slice(self.key_hash.inner());
        if let NonInclusionKind::LeafMismatch { key_hash, value } = &self.kind {
            out.extend_from_slice(key_hash.inner());
            put_bytes(&mut out, value);
        }
        put_tail(&mut out, self.depth, &self.hash_algorithm_id, &self.siblings);
        out
    }
}

impl Proof {
    /// Encode for transport
    ///
    /// # Panics
    ///
    /// Panics if a carried value is longer than `u32::MAX` bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Proof::Inclusion(proof) => proof.to_bytes(),
            Proof::NonInclusion(proof) => proof.to_bytes(),
        }
    }

    /// Decode a proof from its wire encoding
    ///
    /// Decoding checks shape only. Whether the proof holds is for
    /// [`SparseTree::verify`](crate::SparseTree::verify) to say, against a
    /// root the caller trusts.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedProof> {
        let mut cursor = Cursor { bytes };

        let version = cursor.u8()?;
        if version != WIRE_VERSION {
            return Err(MalformedProof::UnsupportedVersion {
                found: version,
                supported: WIRE_VERSION,
            });
        }

        let proof_type = cursor.u8()?;
        let flags = cursor.u8()?;
        if flags & !FLAG_COMPRESSED != 0 {
            return Err(MalformedProof::UnknownFlags(flags));
        }
        let is_compressed = flags & FLAG_COMPRESSED != 0;

        let key_hash = cursor.digest()?;

        enum Claim {
            Value(Vec<u8>),
            Empty,
            Mismatch(Digest, Vec<u8>),
        }

        let claim = match proof_type {
            TYPE_INCLUSION => Claim::Value(cursor.bytes()?),
            TYPE_NON_INCLUSION_EMPTY => Claim::Empty,
            TYPE_NON_INCLUSION_MISMATCH => Claim::Mismatch(cursor.digest()?, cursor.bytes()?),
            unknown => return Err(MalformedProof::UnknownProofType(unknown)),
        };

        let depth = usize::try_from(cursor.u32()?).expect("u32 fits in usize");
        if !(1..=MAX_DEPTH).contains(&depth) {
            return Err(MalformedProof::DepthOutOfRange { depth, max: MAX_DEPTH });
        }

        let hash_algorithm_id = String::from_utf8(cursor.bytes()?)
            .map_err(|_| MalformedProof::InvalidAlgorithmId)?;

        let siblings = read_siblings(&mut cursor, depth)?;
        if !is_compressed && !siblings.is_fully_explicit() {
            return Err(MalformedProof::MissingSiblings);
        }

        cursor.finish()?;

        Ok(match claim {
            Claim::Value(value) => Proof::Inclusion(InclusionProof {
                key_hash,
                value,
                depth,
                hash_algorithm_id,
                siblings,
                is_compressed,
            }),
            Claim::Empty => Proof::NonInclusion(NonInclusionProof {
                key_hash,
                kind: NonInclusionKind::EmptyPath,
                depth,
                hash_algorithm_id,
                siblings,
                is_compressed,
            }),
            Claim::Mismatch(resident, value) => Proof::NonInclusion(NonInclusionProof {
                key_hash,
                kind: NonInclusionKind::LeafMismatch { key_hash: resident, value },
                depth,
                hash_algorithm_id,
                siblings,
                is_compressed,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_siblings(depth: usize) -> Siblings {
        Siblings::explicit((1..=depth as u64).map(Digest::from_u64).collect())
    }

    fn sample_inclusion(depth: usize) -> InclusionProof {
        InclusionProof {
            key_hash: Digest::from_u64(7),
            value: b"v".to_vec(),
            depth,
            hash_algorithm_id: "sha-256".to_owned(),
            siblings: sample_siblings(depth),
            is_compressed: false,
        }
    }

    #[test]
    fn all_three_types_round_trip() {
        // an odd depth forces padding bits in the mask's last byte
        let depth = 9;
        let base = sample_inclusion(depth);

        let proofs = [
            Proof::Inclusion(base.clone()),
            Proof::NonInclusion(NonInclusionProof {
                key_hash: base.key_hash,
                kind: NonInclusionKind::EmptyPath,
                depth,
                hash_algorithm_id: base.hash_algorithm_id.clone(),
                siblings: base.siblings.clone(),
                is_compressed: false,
            }),
            Proof::NonInclusion(NonInclusionProof {
                key_hash: base.key_hash,
                kind: NonInclusionKind::LeafMismatch {
                    key_hash: Digest::from_u64(8),
                    value: b"other".to_vec(),
                },
                depth,
                hash_algorithm_id: base.hash_algorithm_id.clone(),
                siblings: base.siblings,
                is_compressed: false,
            }),
        ];

        for proof in proofs {
            assert_eq!(Proof::from_bytes(&proof.to_bytes()), Ok(proof));
        }
    }

    #[test]
    fn each_header_malformation_is_named() {
        let bytes = sample_inclusion(8).to_bytes();

        let mut forged = bytes.clone();
        forged[0] = 2;
        assert_eq!(
            Proof::from_bytes(&forged),
            Err(MalformedProof::UnsupportedVersion { found: 2, supported: 1 }),
        );

        let mut forged = bytes.clone();
        forged[1] = 9;
        assert_eq!(Proof::from_bytes(&forged), Err(MalformedProof::UnknownProofType(9)));

        let mut forged = bytes;
        forged[2] |= 0b0000_0010;
        assert_eq!(Proof::from_bytes(&forged), Err(MalformedProof::UnknownFlags(0b0000_0010)));

        assert_eq!(Proof::from_bytes(&[]), Err(MalformedProof::Truncated));
    }

    #[test]
    fn the_byte_count_must_be_exact() {
        let bytes = sample_inclusion(8).to_bytes();

        assert_eq!(
            Proof::from_bytes(&bytes[..bytes.len() - 1]),
            Err(MalformedProof::Truncated),
        );

        let mut extended = bytes;
        extended.push(0);
        assert_eq!(Proof::from_bytes(&extended), Err(MalformedProof::TrailingBytes));
    }

    #[test]
    fn the_depth_field_is_range_checked() {
        // layout: header 3, key hash 32, value length 4, value 1, depth 4
        let bytes = sample_inclusion(8).to_bytes();

        let mut forged = bytes.clone();
        forged[40..44].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            Proof::from_bytes(&forged),
            Err(MalformedProof::DepthOutOfRange { depth: 0, max: MAX_DEPTH }),
        );

        let mut forged = bytes;
        forged[40..44].copy_from_slice(&300u32.to_le_bytes());
        assert_eq!(
            Proof::from_bytes(&forged),
            Err(MalformedProof::DepthOutOfRange { depth: 300, max: MAX_DEPTH }),
        );
    }

    #[test]
    fn the_algorithm_id_must_be_utf8() {
        // the id starts at byte 48 for a one-byte value
        let mut forged = sample_inclusion(8).to_bytes();
        forged[48] = 0xff;
        assert_eq!(Proof::from_bytes(&forged), Err(MalformedProof::InvalidAlgorithmId));
    }

    #[test]
    fn padding_bits_must_stay_clear() {
        // depth 9 leaves seven padding bits in the second mask byte
        let mut forged = sample_inclusion(9).to_bytes();
        let mask_offset = 3 + 32 + 4 + 1 + 4 + 4 + 7;
        assert_eq!(forged[mask_offset..mask_offset + 2], [0xff, 0x01]);

        forged[mask_offset + 1] = 0x03;
        assert_eq!(Proof::from_bytes(&forged), Err(MalformedProof::PaddingBits));
    }

    #[test]
    fn an_uncompressed_proof_must_carry_every_sibling() {
        let mut mask = BitVec::repeat(true, 8);
        mask.set(3, false);
        let partial = InclusionProof {
            siblings: Siblings::from_parts(mask, vec![Digest::from_u64(1); 7]),
            is_compressed: true,
            ..sample_inclusion(8)
        };

        let mut bytes = partial.to_bytes();
        // claim the uncompressed form while eliding a sibling
        bytes[2] = 0;
        assert_eq!(Proof::from_bytes(&bytes), Err(MalformedProof::MissingSiblings));
    }
}
