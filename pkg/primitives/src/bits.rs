use std::cmp::Ordering;
use std::fmt::{Debug, Write};
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use bitvec::prelude::{BitArray, Msb0};
use bitvec::slice::BitSlice;

use crate::Digest;

/// A directional path through a binary tree: the first `len` bits of a
/// [`Digest`], most significant bit first
///
/// Bit `false` means "descend left", bit `true` means "descend right". The
/// bit at index 0 is the decision taken at the root.
///
/// Comparison, hashing, and iteration all operate on the live prefix only;
/// bits beyond the path length are ignored:
///
/// ```rust
/// # use primitives::Digest;
/// let mut bytes = [0u8; 32];
/// bytes[0] = 0b1010_0000;
///
/// let path = Digest::new(bytes).bit_path(4).unwrap();
/// let bits: Vec<bool> = path.into_iter().collect();
///
/// assert_eq!(bits, vec![true, false, true, false]);
/// ```
#[derive(Clone, Copy)]
pub struct BitPath {
    /// All the bits of the digest in big-endian order (most significant first)
    bits: BitArray<[u8; 32], Msb0>,
    len: usize,
}

impl BitPath {
    /// The zero-length path, the position of a root node
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bits: BitArray::new([0u8; 32]),
            len: 0,
        }
    }

    /// Get the bits as a [`BitSlice`]
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &BitSlice<u8, Msb0> {
        &self.bits[..self.len]
    }

    /// The number of bits in this path
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if this path has no bits
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bit at `index`, where index 0 is the root-level decision
    ///
    /// Panics if `index >= self.len()`
    #[inline]
    #[must_use]
    pub fn bit(&self, index: usize) -> bool {
        self.as_slice()[index]
    }

    /// The first `len` bits of this path
    ///
    /// Panics if `len > self.len()`
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        assert!(len <= self.len);
        Self {
            bits: self.bits,
            len,
        }
    }
}

/// The error returned when a requested path length doesn't fit a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bit path length {requested} is out of range (expected 1..={max})")]
pub struct InvalidPathLength {
    /// The requested number of bits
    pub requested: usize,
    /// The number of bits a digest can provide, always [`Digest::BITS`]
    pub max: usize,
}

impl Digest {
    /// The first `len` bits of this digest as a directional path, most
    /// significant bit first
    ///
    /// Fails if `len` is zero or exceeds [`Digest::BITS`].
    pub fn bit_path(&self, len: usize) -> Result<BitPath, InvalidPathLength> {
        if len == 0 || len > Self::BITS {
            return Err(InvalidPathLength {
                requested: len,
                max: Self::BITS,
            });
        }

        Ok(BitPath {
            bits: BitArray::new(self.0),
            len,
        })
    }
}

impl PartialEq for BitPath {
    #[inline]
    fn eq(&self, other: &BitPath) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for BitPath {}

impl PartialOrd for BitPath {
    #[inline]
    fn partial_cmp(&self, other: &BitPath) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BitPath {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.deref().cmp(other.as_slice())
    }
}

impl Hash for BitPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deref().hash(state);
    }
}

impl Deref for BitPath {
    type Target = BitSlice<u8, Msb0>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl IntoIterator for BitPath {
    type Item = bool;
    type IntoIter = core::iter::Take<bitvec::array::IntoIter<[u8; 32], Msb0>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.bits.into_iter().take(self.len)
    }
}

impl<'a> IntoIterator for &'a BitPath {
    type Item = bool;
    type IntoIter = core::iter::Take<bitvec::array::IntoIter<[u8; 32], Msb0>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        (*self).into_iter()
    }
}

impl Debug for BitPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("BitPath(")?;
        for bit in self {
            f.write_char(match bit {
                false => '0',
                true => '1',
            })?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[test]
    fn msb_first() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1100_0101;
        let digest = Digest::new(bytes);

        let bits: Vec<bool> = digest.bit_path(8).unwrap().into_iter().collect();
        assert_eq!(
            bits,
            vec![true, true, false, false, false, true, false, true]
        );
    }

    #[test]
    fn rejects_out_of_range_lengths() {
        let digest = Digest::from_u64(1);

        assert_eq!(
            digest.bit_path(0).unwrap_err(),
            InvalidPathLength {
                requested: 0,
                max: 256
            }
        );
        assert_eq!(
            digest.bit_path(257).unwrap_err(),
            InvalidPathLength {
                requested: 257,
                max: 256
            }
        );
        assert!(digest.bit_path(256).is_ok());
        assert!(digest.bit_path(1).is_ok());
    }

    #[test]
    fn eq_ignores_bits_beyond_the_prefix() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[0] = 0b1010_0000;
        b[0] = 0b1010_1111;

        let a = Digest::new(a);
        let b = Digest::new(b);

        assert_eq!(a.bit_path(4).unwrap(), b.bit_path(4).unwrap());
        assert_ne!(a.bit_path(5).unwrap(), b.bit_path(5).unwrap());
    }

    #[test]
    fn prefix_truncates() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1011_0000;
        let path = Digest::new(bytes).bit_path(8).unwrap();

        let prefix = path.prefix(3);
        assert_eq!(prefix.len(), 3);
        let bits: Vec<bool> = prefix.into_iter().collect();
        assert_eq!(bits, vec![true, false, true]);

        assert!(path.prefix(0).is_empty());
    }

    #[test]
    fn empty_path() {
        let empty = BitPath::empty();
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
        assert_eq!(empty, Digest::from_u64(99).bit_path(8).unwrap().prefix(0));
    }

    #[test]
    fn debug_renders_bits() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1010_0000;
        let path = Digest::new(bytes).bit_path(4).unwrap();

        assert_eq!(format!("{path:?}"), "BitPath(1010)");
    }

    #[proptest]
    fn has_right_number_of_bits(digest: Digest, #[strategy(1usize..=256)] len: usize) {
        let path = digest.bit_path(len).unwrap();

        assert_eq!(path.len(), len);
        assert_eq!(path.iter().collect::<Vec<_>>().len(), len);
        assert_eq!(path.into_iter().collect::<Vec<_>>().len(), len);
    }
}
