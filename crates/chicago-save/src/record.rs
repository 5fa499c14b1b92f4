//! Length-prefixed, symbol-tagged records.
//!
//! A record header is a signed 16-bit byte length followed by a 16-bit symbol
//! index. Opening a record narrows the cursor to the declared length; closing
//! it moves the cursor to the first byte after the record.

use chicago_common::ByteCursor;

use crate::{Error, Result, SymbolTable};

/// An open record.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    symbol: &'a str,
    after: ByteCursor<'a>,
}

impl<'a> Record<'a> {
    /// Read a record header and narrow `cursor` to the record body.
    pub fn start(symbols: &SymbolTable<'a>, cursor: &mut ByteCursor<'a>) -> Result<Self> {
        let size = cursor.read_i16();
        let symbol = cursor.read_i16();
        cursor.check()?;
        if size < 0 {
            return Err(Error::BadBlockStart(size));
        }
        let symbol = symbols.lookup(i32::from(symbol))?;
        let after = cursor.split_and_swap(size as usize);
        cursor.check()?;
        Ok(Self { symbol, after })
    }

    /// Name the record is tagged with.
    #[inline]
    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    /// Absolute offset of the declared end of the record.
    #[inline]
    pub fn end_position(&self) -> usize {
        self.after.position()
    }

    /// Move `cursor` past the record.
    ///
    /// With `check_exact` the body must have been consumed completely and
    /// without overflowing. Otherwise the cursor is resynchronized regardless.
    /// Returns whether the cursor stood exactly at the declared end.
    pub fn end(self, cursor: &mut ByteCursor<'a>, check_exact: bool) -> Result<bool> {
        let exact = !cursor.is_overflowed() && cursor.position() == self.end_position();
        if check_exact && !exact {
            cursor.check()?;
            return Err(Error::BadBlockEnd {
                expected: self.end_position(),
                actual: cursor.position(),
            });
        }
        *cursor = self.after;
        Ok(exact)
    }
}
