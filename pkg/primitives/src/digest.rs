use borsh::{BorshDeserialize, BorshSerialize};
use std::borrow::Borrow;
use std::fmt::{Debug, Display};
use std::str::FromStr;

/// A 32-byte hash digest
///
/// Every hash-shaped value in the store (key hashes, node hashes, roots, the
/// zero-hash table) is a `Digest`. It renders as lowercase hex and parses
/// with or without a `0x` prefix:
///
/// ```rust
/// # use primitives::Digest;
/// let digest: Digest = "0x0000000000000000000000000000000000000000000000000000000000000005"
///     .parse()
///     .unwrap();
///
/// assert_eq!(digest, Digest::from_u64(5));
/// ```
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
)]
// Serialize transparently with serde
// because otherwise it would be serialized as a tuple.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Digest(#[cfg_attr(feature = "serde", serde(with = "hex::serde"))] pub [u8; 32]);

impl Digest {
    /// The size of a digest in bytes
    pub const SIZE: usize = 32;

    /// The size of a digest in bits
    pub const BITS: usize = 256;

    /// The all-zero digest, used as the "absent leaf" sentinel
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a digest from its raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a digest whose last 8 bytes are the big-endian encoding of `n`
    ///
    /// Mostly useful for tests and examples that need distinct digests
    #[must_use]
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..32].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// The raw bytes of this digest
    #[inline]
    #[must_use]
    pub const fn inner(&self) -> &[u8; 32] {
        &self.0
    }

    /// Consume the digest, returning the raw bytes
    #[inline]
    #[must_use]
    pub const fn into_inner(self) -> [u8; 32] {
        self.0
    }

    /// The bytes of this digest as a new `Vec`
    #[must_use]
    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// The lowercase hex encoding of this digest
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Borrow<[u8]> for Digest {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The error returned when converting a slice of the wrong length into a
/// [`Digest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wrong digest length: expected {expected} bytes, found {found}")]
pub struct WrongDigestLength {
    /// The length a digest requires, always [`Digest::SIZE`]
    pub expected: usize,
    /// The length of the provided slice
    pub found: usize,
}

impl TryFrom<&[u8]> for Digest {
    type Error = WrongDigestLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| WrongDigestLength {
            expected: Self::SIZE,
            found: bytes.len(),
        })?;

        Ok(Self(bytes))
    }
}

impl FromStr for Digest {
    type Err = hex::FromHexError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

#[cfg(any(test, feature = "proptest"))]
mod proptest_impls {
    use super::Digest;
    use proptest::arbitrary::{any, Arbitrary, StrategyFor};
    use proptest::strategy::{Map, Strategy};

    impl Arbitrary for Digest {
        type Parameters = ();
        type Strategy = Map<StrategyFor<[u8; 32]>, fn([u8; 32]) -> Digest>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>().prop_map(Digest::new)
        }
    }
}
