//! Little-endian stream writer.
//!
//! Used to lay out schema blobs and to synthesize save streams. Length fields
//! that are only known after their body is written are reserved up front and
//! patched in afterwards.

use byteorder::{ByteOrder, LittleEndian};
use zerocopy::{Immutable, IntoBytes};

/// Growable little-endian byte writer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Write a string followed by its NUL terminator.
    pub fn write_cstr(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self
    }

    /// Write `s` into a fixed `width`-byte field, NUL padded. Longer strings
    /// are truncated so that at least one NUL remains.
    pub fn write_padded(&mut self, s: &str, width: usize) -> &mut Self {
        let len = s.len().min(width.saturating_sub(1));
        self.buf.extend_from_slice(&s.as_bytes()[..len]);
        self.buf.resize(self.buf.len() + (width - len), 0);
        self
    }

    /// Write a plain-old-data struct verbatim.
    pub fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) -> &mut Self {
        self.write_bytes(value.as_bytes())
    }

    /// Pad with zeros up to `position`.
    pub fn pad_to(&mut self, position: usize) -> &mut Self {
        if position > self.buf.len() {
            self.buf.resize(position, 0);
        }
        self
    }

    /// Reserve a 16-bit slot and return its offset for [`patch_i16`](Self::patch_i16).
    pub fn reserve_i16(&mut self) -> usize {
        let at = self.buf.len();
        self.write_i16(0);
        at
    }

    /// Reserve a 32-bit slot and return its offset for [`patch_i32`](Self::patch_i32).
    pub fn reserve_i32(&mut self) -> usize {
        let at = self.buf.len();
        self.write_i32(0);
        at
    }

    pub fn patch_i16(&mut self, at: usize, value: i16) {
        LittleEndian::write_i16(&mut self.buf[at..at + 2], value);
    }

    pub fn patch_i32(&mut self, at: usize, value: i32) {
        LittleEndian::write_i32(&mut self.buf[at..at + 4], value);
    }

    /// Patch a reserved 32-bit slot with the number of bytes written after it.
    pub fn patch_len_i32(&mut self, at: usize) {
        let len = self.buf.len() - (at + 4);
        self.patch_i32(at, len as i32);
    }
}
