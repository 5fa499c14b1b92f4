//! Symbol tables.
//!
//! Field and class names in a save stream are written once into a table of
//! NUL-terminated strings and referenced by index everywhere else.

use chicago_common::ByteCursor;

use crate::{Error, Result};

/// Symbols of one save-stream segment, borrowed from the stream.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable<'a> {
    symbols: Vec<&'a [u8]>,
}

impl<'a> SymbolTable<'a> {
    /// A table with no symbols; every lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index `count` consecutive strings from a cursor bounded to the table.
    pub fn read(mut cursor: ByteCursor<'a>, count: i32) -> Result<Self> {
        let count = usize::try_from(count).map_err(|_| Error::BadSymbolTable)?;
        // Every symbol takes at least its terminator.
        if count > cursor.remaining() {
            return Err(Error::BadSymbolTable);
        }

        let mut symbols = Vec::new();
        symbols
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory)?;
        for _ in 0..count {
            let len = cursor.strlen();
            let symbol = cursor.read_bytes(len).unwrap_or_default();
            cursor.skip(1);
            symbols.push(symbol);
        }
        cursor.check().map_err(|_| Error::BadSymbolTable)?;
        Ok(Self { symbols })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Resolve a symbol index.
    pub fn lookup(&self, index: i32) -> Result<&'a str> {
        let bytes = usize::try_from(index)
            .ok()
            .and_then(|i| self.symbols.get(i))
            .ok_or_else(|| {
                Error::BadSymbol(format!("index {index} out of {} symbols", self.len()))
            })?;
        if bytes.is_empty() {
            return Err(Error::BadSymbol(format!("symbol {index} is empty")));
        }
        std::str::from_utf8(bytes)
            .map_err(|_| Error::BadSymbol(format!("symbol {index} is not UTF-8")))
    }
}
