//! Restored instances and the handle tables their slots point into.
//!
//! A restored instance is a class id plus a zero-initialized byte buffer laid
//! out like the class's instance. Fixed-size fields hold their on-disk bytes.
//! String and custom slots hold a little-endian `u32` handle into
//! [`Handles`]; `0` means absent.

use chicago_datamap::{ClassId, FieldDescriptor};

use crate::custom::CustomValue;
use crate::{Arena, Error, Result};

/// One restored instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoredInstance<'a> {
    pub class: ClassId,
    pub data: &'a [u8],
}

/// A contiguous run of restored instances of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoredArray<'a> {
    pub class: ClassId,
    pub stride: usize,
    pub len: usize,
    pub data: &'a [u8],
}

impl<'a> RestoredArray<'a> {
    /// An array with no elements.
    pub fn empty(class: ClassId) -> Self {
        Self {
            class,
            stride: 0,
            len: 0,
            data: &[],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<RestoredInstance<'a>> {
        if index >= self.len {
            return None;
        }
        let start = index * self.stride;
        let data = self.data.get(start..start + self.stride)?;
        Some(RestoredInstance {
            class: self.class,
            data,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = RestoredInstance<'a>> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }
}

/// Strings and custom values referenced from restored slots.
///
/// Strings keep the bytes the stream carried; table growth is charged to the
/// parse's [`Arena`].
#[derive(Debug, Default)]
pub struct Handles<'a> {
    strings: Vec<&'a [u8]>,
    customs: Vec<CustomValue<'a>>,
}

impl<'a> Handles<'a> {
    /// Resolve a string handle to its bytes.
    pub fn bytes(&self, handle: u32) -> Option<&'a [u8]> {
        let index = (handle as usize).checked_sub(1)?;
        self.strings.get(index).copied()
    }

    /// Resolve a string handle; `None` when absent or not UTF-8.
    pub fn string(&self, handle: u32) -> Option<&'a str> {
        self.bytes(handle)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Resolve a custom value handle.
    pub fn custom(&self, handle: u32) -> Option<&CustomValue<'a>> {
        let index = (handle as usize).checked_sub(1)?;
        self.customs.get(index)
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn custom_count(&self) -> usize {
        self.customs.len()
    }

    pub(crate) fn push_string(&mut self, arena: &Arena, bytes: &'a [u8]) -> Result<u32> {
        grow(&mut self.strings, arena)?;
        self.strings.push(bytes);
        Ok(self.strings.len() as u32)
    }

    pub(crate) fn push_custom(&mut self, arena: &Arena, value: CustomValue<'a>) -> Result<u32> {
        grow(&mut self.customs, arena)?;
        self.customs.push(value);
        Ok(self.customs.len() as u32)
    }
}

/// Make room for one more element, charging any new capacity to `arena`.
fn grow<T>(table: &mut Vec<T>, arena: &Arena) -> Result<()> {
    if table.len() < table.capacity() {
        return Ok(());
    }
    let extra = table.capacity().max(4);
    arena.charge(extra.saturating_mul(std::mem::size_of::<T>()))?;
    table.try_reserve_exact(extra).map_err(|_| Error::OutOfMemory)
}

#[inline]
pub(crate) fn le_bytes<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    data.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

/// First element of an integer field.
#[inline]
pub(crate) fn field_i32(data: &[u8], field: &FieldDescriptor) -> i32 {
    le_bytes(data, field.offset).map_or(0, i32::from_le_bytes)
}

/// First element of a short field.
#[inline]
pub(crate) fn field_i16(data: &[u8], field: &FieldDescriptor) -> i16 {
    le_bytes(data, field.offset).map_or(0, i16::from_le_bytes)
}

/// Handle stored in the first slot of a string or custom field.
#[inline]
pub(crate) fn field_handle(data: &[u8], field: &FieldDescriptor) -> u32 {
    le_bytes(data, field.offset).map_or(0, u32::from_le_bytes)
}

#[inline]
pub(crate) fn write_handle(slot: &mut [u8], handle: u32) {
    if let Some(dest) = slot.get_mut(..4) {
        dest.copy_from_slice(&handle.to_le_bytes());
    }
}
