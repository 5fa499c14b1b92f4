//! On-disk structures of a serialized datamap collection.
//!
//! All references inside the blob are [`RelOff`]s: byte offsets relative to the
//! start of the region they point into. They are only ever turned into
//! [`ClassId`](crate::ClassId)s and owned strings by the relocator.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Magic at the end of every collection trailer.
pub const COLLECTION_MAGIC: [u8; 8] = *b"CHDMCOLL";

/// Layout version understood by this crate.
pub const COLLECTION_VERSION: u32 = 1;

/// Bytes written before the first region so that no region starts at offset 0.
pub const COLLECTION_PREAMBLE: usize = 8;

/// A region-relative offset, or [`RelOff::NULL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct RelOff(pub u64);

impl RelOff {
    pub const NULL: Self = Self(u64::MAX);

    #[inline]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    #[inline]
    pub fn get(self) -> Option<u64> {
        (!self.is_null()).then_some(self.0)
    }
}

impl From<Option<u64>> for RelOff {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::NULL, Self)
    }
}

/// Fixed trailer at the very end of the blob.
///
/// Region offsets are absolute byte offsets from the start of the blob.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawCollectionTrailer {
    pub n_classes: u64,
    pub n_linked_names: u64,
    pub classes: u64,
    pub fields: u64,
    pub strings: u64,
    pub linked_names: u64,
    pub version: u32,
    pub magic: [u8; 8],
    pub _reserved: u32,
}

/// A class descriptor (a "datamap").
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawClassDescriptor {
    /// String pool offset of the class name.
    pub name: RelOff,
    /// Class region offset of the base class.
    pub base: RelOff,
    /// Field region offset of the first field.
    pub fields: RelOff,
    pub n_fields: u64,
    /// String pool offset of the module the class was found in.
    pub module: RelOff,
    pub instance_size: u64,
}

/// A field descriptor (a "type description").
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawFieldDescriptor {
    /// Raw [`FieldKind`](crate::FieldKind) value.
    pub kind: u32,
    pub flags: u16,
    pub _reserved: u16,
    pub name: RelOff,
    pub external_name: RelOff,
    pub offset: u64,
    pub n_elems: u64,
    pub total_size: u64,
    /// Opaque identifier of the native restore routine, shared by every field
    /// that uses the same routine.
    pub custom_ops: RelOff,
    /// Class region offset of the embedded class.
    pub embedded: RelOff,
}

/// An alternative name a class can be looked up by.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawLinkedName {
    pub name: RelOff,
    pub class: RelOff,
}

pub const TRAILER_SIZE: usize = std::mem::size_of::<RawCollectionTrailer>();
pub const CLASS_SIZE: usize = std::mem::size_of::<RawClassDescriptor>();
pub const FIELD_SIZE: usize = std::mem::size_of::<RawFieldDescriptor>();
pub const LINKED_NAME_SIZE: usize = std::mem::size_of::<RawLinkedName>();
