#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_bool)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::explicit_deref_methods)]
#![allow(clippy::doc_markdown)]
#![deny(missing_docs)]

//! Shared primitives for the authenticated key-value store: 32-byte
//! [`Digest`]s, directional [`BitPath`]s derived from them, and the pluggable
//! [`TreeHasher`] functions that produce them.

mod bits;
mod digest;
mod hasher;

pub use bits::{BitPath, InvalidPathLength};
pub use digest::{Digest, WrongDigestLength};
pub use hasher::{Blake2b256Hasher, Sha256Hasher, TreeHasher};
