//! Error types for save parsing.

use chicago_common::Tag;
use thiserror::Error;

/// Errors that can occur while parsing a save.
///
/// Most variants abort the parse. [`is_recoverable`](Error::is_recoverable)
/// tells which ones only cost the current entity or block.
#[derive(Debug, Error)]
pub enum Error {
    /// The arena allocation limit was reached.
    #[error("out of memory")]
    OutOfMemory,

    /// A read or skip went past the end of the current range.
    #[error("reader overflowed")]
    ReaderOverflowed,

    #[error("bad symbol table")]
    BadSymbolTable,

    #[error("bad symbol: {0}")]
    BadSymbol(String),

    #[error("bad field group marker: {0} (expected 4)")]
    BadFieldsMarker(i16),

    #[error("bad field count: {0}")]
    BadFieldCount(i64),

    #[error("field {class}::{field} not found")]
    FieldNotFound { class: String, field: String },

    #[error("bad field read")]
    BadFieldRead,

    #[error("bad field type: {0}")]
    BadFieldType(u32),

    #[error("bad record start: negative size {0}")]
    BadBlockStart(i16),

    #[error("bad record end: expected offset {expected:#x}, at {actual:#x}")]
    BadBlockEnd { expected: usize, actual: usize },

    #[error("datamap not found: {0}")]
    DatamapNotFound(String),

    #[error("unsupported {block} version: {version}")]
    UnsupportedBlockVersion { block: &'static str, version: i32 },

    #[error("nesting deeper than {0} field groups")]
    NestingTooDeep(usize),

    #[error("bad .sav tag: {0}")]
    SavBadTag(Tag),

    #[error("bad .hl1 tag: {0}")]
    Hl1BadTag(Tag),

    #[error("bad .hl2 tag: {0}")]
    Hl2BadTag(Tag),

    #[error("bad .hl2 section header")]
    Hl2BadSectionHeader,

    #[error("bad state file length: {0}")]
    BadStateFileLength(i32),

    #[error("bad state file count: {0}")]
    BadStateFileCount(i32),

    #[error("bad state file name: {0:?}")]
    BadStateFileName(String),

    /// Schema error.
    #[error("{0}")]
    Datamap(#[from] chicago_datamap::Error),
}

impl From<chicago_common::Error> for Error {
    fn from(err: chicago_common::Error) -> Self {
        match err {
            chicago_common::Error::Overflowed { .. } => Self::ReaderOverflowed,
        }
    }
}

impl Error {
    /// Errors that abandon one entity or block without aborting the parse.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedBlockVersion { .. } | Self::DatamapNotFound(_)
        )
    }
}

/// Result type for save parsing.
pub type Result<T> = std::result::Result<T, Error>;
