//! Error types for chicago-common.

use thiserror::Error;

/// Common error type for chicago operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A cursor was asked for more bytes than its range holds.
    #[error("reader overflowed at offset {position}")]
    Overflowed { position: usize },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
