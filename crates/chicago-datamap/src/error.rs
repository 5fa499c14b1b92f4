//! Error types for datamap collections.

use thiserror::Error;

/// Errors that can occur while loading a datamap collection.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blob is structurally unusable.
    #[error("invalid datamap collection: {0}")]
    InvalidCollection(String),

    /// The blob was written by a different exporter version.
    #[error("unsupported datamap collection version: {found} (expected {expected})")]
    InvalidCollectionVersion { found: u32, expected: u32 },
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCollection(reason.into())
    }
}

/// Result type for datamap operations.
pub type Result<T> = std::result::Result<T, Error>;
