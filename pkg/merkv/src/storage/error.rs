use std::error::Error as StdError;
use std::fmt::{self, Display};

use thiserror::Error;

/// An error reported by a storage adapter
///
/// Adapters live outside this crate, so the type is built for wrapping:
/// tag the operation that failed, classify it as a [`StorageErrorKind`],
/// and optionally attach context such as a snapshot name. The tree core
/// never looks past the kind.
///
/// ```rust
/// use merkv::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new("restore_snapshot", StorageErrorKind::SnapshotMissing)
///     .with_context("nightly-backup");
///
/// assert!(err.is_snapshot_missing());
/// assert_eq!(
///     err.to_string(),
///     "storage operation `restore_snapshot` failed (nightly-backup): no such snapshot",
/// );
/// ```
#[derive(Debug)]
pub struct StorageError {
    operation: &'static str,
    context: Option<String>,
    kind: StorageErrorKind,
}

/// What went wrong inside a storage adapter
#[derive(Debug, Error)]
pub enum StorageErrorKind {
    /// The backend itself failed (I/O, network, encoding, ...)
    #[error(transparent)]
    Backend(Box<dyn StdError + Send + Sync>),

    /// The adapter does not implement this optional operation
    #[error("operation is not supported by this storage backend")]
    Unsupported,

    /// No tree metadata has been stored yet
    #[error("no tree metadata is stored")]
    MetadataMissing,

    /// The named snapshot does not exist
    #[error("no such snapshot")]
    SnapshotMissing,

    /// A snapshot with this name already exists
    #[error("a snapshot with this name already exists")]
    SnapshotExists,

    /// The snapshot records metadata that does not match the store's
    #[error("snapshot metadata does not match the stored tree metadata")]
    SnapshotIncompatible,
}

impl StorageError {
    /// Classify a failure of `operation`
    #[must_use]
    pub fn new(operation: &'static str, kind: StorageErrorKind) -> Self {
        Self {
            operation,
            context: None,
            kind,
        }
    }

    /// Wrap a backend error raised by `operation`
    pub fn backend(
        operation: &'static str,
        error: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::new(operation, StorageErrorKind::Backend(error.into()))
    }

    /// Report `operation` as unimplemented by this adapter
    #[must_use]
    pub fn unsupported(operation: &'static str) -> Self {
        Self::new(operation, StorageErrorKind::Unsupported)
    }

    /// Attach human-readable context, such as a snapshot name
    #[must_use]
    pub fn with_context(mut self, context: impl Display) -> Self {
        self.context = Some(context.to_string());
        self
    }

    /// The storage operation that failed
    #[inline]
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// The context attached by the adapter, if any
    #[inline]
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The failure classification
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }

    /// Is this a backend failure
    #[inline]
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(&self.kind, StorageErrorKind::Backend(_))
    }

    /// Is this an unimplemented optional operation
    #[inline]
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(&self.kind, StorageErrorKind::Unsupported)
    }

    /// Is this a lookup of a snapshot that does not exist
    #[inline]
    #[must_use]
    pub fn is_snapshot_missing(&self) -> bool {
        matches!(&self.kind, StorageErrorKind::SnapshotMissing)
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage operation `{}` failed", self.operation)?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            StorageErrorKind::Backend(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_operation_and_kind() {
        let err = StorageError::unsupported("read_by_path");
        assert_eq!(
            err.to_string(),
            "storage operation `read_by_path` failed: operation is not supported by this storage backend",
        );
        assert!(err.is_unsupported());
        assert!(!err.is_backend());
    }

    #[test]
    fn backend_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = StorageError::backend("write_batch", io).with_context("batch of 9");

        assert!(err.is_backend());
        assert_eq!(err.operation(), "write_batch");
        assert_eq!(err.context(), Some("batch of 9"));
        assert_eq!(
            err.to_string(),
            "storage operation `write_batch` failed (batch of 9): disk on fire",
        );
        assert!(err.source().is_some());
    }
}
