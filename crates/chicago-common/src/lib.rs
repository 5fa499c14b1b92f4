//! Common utilities for chicago.
//!
//! This crate provides the foundational types shared by the schema loader and
//! the save parser:
//!
//! - [`ByteCursor`] - Bounded cursor with sticky overflow over a borrowed byte range
//! - [`ByteWriter`] - Little-endian stream writer for building schema blobs and save streams
//! - [`Tag`] - 4-byte magic plus version, checked at every container level

mod cursor;
mod error;
mod tag;
mod writer;

pub use cursor::{ByteCursor, CursorState};
pub use error::{Error, Result};
pub use tag::Tag;
pub use writer::ByteWriter;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Truncate a fixed-size, NUL-padded character buffer at its first NUL.
#[inline]
pub fn cstr_prefix(bytes: &[u8]) -> &[u8] {
    match memchr::memchr(0, bytes) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    }
}
