//! Bounded byte cursor with sticky overflow.
//!
//! [`ByteCursor`] never fails on individual reads. Instead, any operation that
//! would step past the end of its range flips the cursor into the
//! [`CursorState::Overflowed`] state, and every later operation becomes a
//! no-op. Callers chain as many reads as they like and check once with
//! [`ByteCursor::check`].

use zerocopy::FromBytes;

use crate::{Error, Result};

/// Whether a cursor is still usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Ok,
    Overflowed,
}

/// A cursor over a sub-range of a borrowed byte buffer.
///
/// Positions are absolute offsets into the underlying buffer, so cursors split
/// from the same buffer can be compared and re-based against each other.
///
/// # Example
///
/// ```
/// use chicago_common::ByteCursor;
///
/// let data = [0x04, 0x00, 0x2a, 0x00, 0x00, 0x00];
/// let mut cursor = ByteCursor::new(&data);
///
/// assert_eq!(cursor.read_i16(), 4);
/// assert_eq!(cursor.read_i32(), 42);
/// assert_eq!(cursor.read_u32(), 0); // past the end
/// assert!(cursor.is_overflowed());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    state: CursorState,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor over the whole of `data`.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
            state: CursorState::Ok,
        }
    }

    /// An empty, already overflowed cursor positioned at `at`.
    #[inline]
    fn overflowed_at(data: &'a [u8], at: usize) -> Self {
        Self {
            data,
            pos: at,
            end: at,
            state: CursorState::Overflowed,
        }
    }

    /// Absolute offset of the next byte to be read.
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Absolute offset one past the last readable byte.
    #[inline]
    pub const fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.state == CursorState::Overflowed
    }

    /// Bytes left in range. Always zero once overflowed.
    #[inline]
    pub fn remaining(&self) -> usize {
        match self.state {
            CursorState::Ok => self.end - self.pos,
            CursorState::Overflowed => 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Turn the overflow flag into an error.
    #[inline]
    pub fn check(&self) -> Result<()> {
        match self.state {
            CursorState::Ok => Ok(()),
            CursorState::Overflowed => Err(Error::Overflowed { position: self.pos }),
        }
    }

    /// The unread bytes in range.
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        match self.state {
            CursorState::Ok => &self.data[self.pos..self.end],
            CursorState::Overflowed => &[],
        }
    }

    #[inline]
    fn could_read(&self, n: usize) -> bool {
        self.state == CursorState::Ok && n <= self.end - self.pos
    }

    #[inline]
    fn overflow(&mut self) {
        self.state = CursorState::Overflowed;
    }

    /// Advance by `n` bytes.
    #[inline]
    pub fn skip(&mut self, n: usize) {
        if self.could_read(n) {
            self.pos += n;
        } else {
            self.overflow();
        }
    }

    /// Advance by up to `n` bytes, stopping at the end of the range instead of
    /// overflowing.
    #[inline]
    pub fn skip_capped(&mut self, n: usize) {
        if self.state == CursorState::Ok {
            self.pos += n.min(self.end - self.pos);
        }
    }

    /// Fill `dest` from the cursor. `dest` is left untouched on overflow.
    #[inline]
    pub fn read(&mut self, dest: &mut [u8]) {
        if let Some(bytes) = self.read_bytes(dest.len()) {
            dest.copy_from_slice(bytes);
        }
    }

    /// Borrow the next `n` bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.could_read(n) {
            let bytes = &self.data[self.pos..self.pos + n];
            self.pos += n;
            Some(bytes)
        } else {
            self.overflow();
            None
        }
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        self.read(&mut out);
        out
    }

    #[inline]
    pub fn read_u8(&mut self) -> u8 {
        self.read_array::<1>()[0]
    }

    #[inline]
    pub fn read_i16(&mut self) -> i16 {
        i16::from_le_bytes(self.read_array())
    }

    #[inline]
    pub fn read_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.read_array())
    }

    #[inline]
    pub fn read_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.read_array())
    }

    #[inline]
    pub fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.read_array())
    }

    #[inline]
    pub fn read_f32(&mut self) -> f32 {
        f32::from_le_bytes(self.read_array())
    }

    /// Read a plain-old-data struct. `None` on overflow.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Option<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>())?;
        T::read_from_bytes(bytes).ok()
    }

    /// Look at the next 32-bit value without consuming it or touching the
    /// overflow state.
    #[inline]
    pub fn peek_u32(&self) -> Option<u32> {
        if self.could_read(4) {
            let b = &self.data[self.pos..self.pos + 4];
            Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    /// Number of bytes before the next NUL, or everything left if there is none.
    #[inline]
    pub fn strlen(&self) -> usize {
        let rest = self.rest();
        memchr::memchr(0, rest).unwrap_or(rest.len())
    }

    /// Like [`strlen`](Self::strlen) but never scans more than `max` bytes.
    #[inline]
    pub fn strnlen(&self, max: usize) -> usize {
        let rest = self.rest();
        let window = &rest[..max.min(rest.len())];
        memchr::memchr(0, window).unwrap_or(window.len())
    }

    /// Carve off the next `n` bytes as their own cursor and advance past them.
    pub fn split(&mut self, n: usize) -> ByteCursor<'a> {
        if self.could_read(n) {
            let sub = Self {
                data: self.data,
                pos: self.pos,
                end: self.pos + n,
                state: CursorState::Ok,
            };
            self.pos += n;
            sub
        } else {
            self.overflow();
            Self::overflowed_at(self.data, self.end)
        }
    }

    /// Narrow this cursor to the next `n` bytes and return a cursor for
    /// everything after them.
    ///
    /// Used to process a length-prefixed span as the current range and resume
    /// the outer range afterwards by assigning the returned cursor back.
    pub fn split_and_swap(&mut self, n: usize) -> ByteCursor<'a> {
        if self.could_read(n) {
            let after = Self {
                data: self.data,
                pos: self.pos + n,
                end: self.end,
                state: CursorState::Ok,
            };
            self.end = self.pos + n;
            after
        } else {
            self.overflow();
            Self::overflowed_at(self.data, self.end)
        }
    }

    /// A new cursor starting `offset` bytes past the current position and
    /// sharing this cursor's end. `self` is not advanced.
    pub fn jump(&self, offset: usize) -> ByteCursor<'a> {
        if self.could_read(offset) {
            Self {
                data: self.data,
                pos: self.pos + offset,
                end: self.end,
                state: CursorState::Ok,
            }
        } else {
            Self::overflowed_at(self.data, self.end)
        }
    }
}
