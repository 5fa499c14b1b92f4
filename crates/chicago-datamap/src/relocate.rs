//! Validation and relocation of serialized collections.
//!
//! The blob is untrusted. Every reference is checked before it is turned
//! into an index, and the first bad reference rejects the whole collection.

use std::ops::Range;

use tracing::debug;
use zerocopy::FromBytes;

use crate::raw::*;
use crate::{ClassDescriptor, ClassId, Collection, Error, FieldDescriptor, FieldKind, Result};

/// Largest instance a collection may declare.
pub const MAX_INSTANCE_SIZE: u64 = 1 << 24;

impl Collection {
    /// Validate a serialized collection and build the owned, index-based form.
    ///
    /// # Example
    ///
    /// ```
    /// use chicago_datamap::{Collection, CollectionBuilder, FieldKind};
    ///
    /// let mut builder = CollectionBuilder::new();
    /// let foo = builder.add_class("Foo", None, None, 4);
    /// builder.add_field(foo, "value", FieldKind::Integer, 0, 1);
    ///
    /// let collection = Collection::relocate(&builder.build())?;
    /// assert!(collection.find_class("Foo").is_some());
    /// # Ok::<(), chicago_datamap::Error>(())
    /// ```
    pub fn relocate(bytes: &[u8]) -> Result<Self> {
        let relocator = Relocator::new(bytes)?;
        let collection = relocator.run()?;
        debug!(
            classes = collection.len(),
            fields = collection.field_count(),
            linked_names = collection.linked_names().len(),
            "relocated datamap collection"
        );
        Ok(collection)
    }
}

struct Relocator<'a> {
    bytes: &'a [u8],
    n_classes: usize,
    n_linked: usize,
    classes: Range<usize>,
    fields: Range<usize>,
    strings: Range<usize>,
    linked: Range<usize>,
}

impl<'a> Relocator<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self> {
        let len = bytes.len();
        if len < TRAILER_SIZE {
            return Err(Error::invalid("buffer is smaller than the collection trailer"));
        }
        let body_end = len - TRAILER_SIZE;
        let trailer = RawCollectionTrailer::read_from_bytes(&bytes[body_end..])
            .map_err(|_| Error::invalid("unreadable trailer"))?;

        let magic = trailer.magic;
        if magic != COLLECTION_MAGIC {
            return Err(Error::invalid("bad trailer magic"));
        }
        let version = trailer.version;
        if version != COLLECTION_VERSION {
            return Err(Error::InvalidCollectionVersion {
                found: version,
                expected: COLLECTION_VERSION,
            });
        }

        let n_classes = to_usize(trailer.n_classes, "class count")?;
        if n_classes == 0 {
            return Err(Error::invalid("collection declares no classes"));
        }
        let n_linked = to_usize(trailer.n_linked_names, "linked name count")?;

        let classes_start = region_start(trailer.classes, len, "class region")?;
        let fields_start = region_start(trailer.fields, len, "field region")?;
        let strings_start = region_start(trailer.strings, len, "string pool")?;
        let linked_start = if n_linked > 0 {
            region_start(trailer.linked_names, len, "linked name region")?
        } else {
            body_end
        };

        let classes_end = array_end(classes_start, n_classes, CLASS_SIZE, "class region")?;
        let linked_end = array_end(linked_start, n_linked, LINKED_NAME_SIZE, "linked name region")?;

        if classes_end > fields_start
            || fields_start > strings_start
            || strings_start > linked_start
            || linked_end > body_end
        {
            return Err(Error::invalid("collection regions overlap or are out of order"));
        }

        Ok(Self {
            bytes,
            n_classes,
            n_linked,
            classes: classes_start..classes_end,
            fields: fields_start..strings_start,
            strings: strings_start..linked_start,
            linked: linked_start..linked_end,
        })
    }

    fn run(&self) -> Result<Collection> {
        let raw_classes = (0..self.n_classes)
            .map(|i| self.record::<RawClassDescriptor>(self.classes.start + i * CLASS_SIZE))
            .collect::<Result<Vec<_>>>()?;

        let sizes = raw_classes
            .iter()
            .map(|raw| {
                let size = raw.instance_size;
                if size > MAX_INSTANCE_SIZE {
                    return Err(Error::invalid(format!("instance size {size} is too large")));
                }
                Ok(size as usize)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut classes = Vec::with_capacity(self.n_classes);
        for (i, raw) in raw_classes.iter().enumerate() {
            let name = self
                .string(raw.name)?
                .ok_or_else(|| Error::invalid(format!("class {i} has no name")))?;
            let module = self.string(raw.module)?;
            let base = self.class_ref(raw.base)?;
            let fields = self.fields(raw, &name, sizes[i], &sizes)?;

            classes.push(ClassDescriptor {
                name,
                module,
                base,
                fields,
                instance_size: sizes[i],
            });
        }

        check_base_chains(&classes)?;

        let mut linked_names = Vec::with_capacity(self.n_linked);
        for i in 0..self.n_linked {
            let raw: RawLinkedName = self.record(self.linked.start + i * LINKED_NAME_SIZE)?;
            let name = self
                .string(raw.name)?
                .ok_or_else(|| Error::invalid("linked name without a name"))?;
            let class = self
                .class_ref(raw.class)?
                .ok_or_else(|| Error::invalid(format!("linked name {name} has no class")))?;
            linked_names.push((name, class));
        }

        Ok(Collection::from_parts(classes, linked_names))
    }

    fn fields(
        &self,
        raw: &RawClassDescriptor,
        class_name: &str,
        instance_size: usize,
        sizes: &[usize],
    ) -> Result<Vec<FieldDescriptor>> {
        let n_fields = to_usize(raw.n_fields, "field count")?;
        let first = match (raw.fields.get(), n_fields) {
            (None, 0) => return Ok(Vec::new()),
            (Some(off), n) if n > 0 => self.target(off, &self.fields, FIELD_SIZE, "field array")?,
            _ => {
                return Err(Error::invalid(format!(
                    "class {class_name}: field array and field count disagree"
                )))
            }
        };
        let region_len = (self.fields.end - self.fields.start) / FIELD_SIZE;
        if first.checked_add(n_fields).map_or(true, |end| end > region_len) {
            return Err(Error::invalid(format!(
                "class {class_name}: field array runs past the field region"
            )));
        }

        let mut fields = Vec::with_capacity(n_fields);
        for i in first..first + n_fields {
            let raw: RawFieldDescriptor = self.record(self.fields.start + i * FIELD_SIZE)?;
            let field = self.field(&raw, class_name)?;
            check_layout(&field, class_name, instance_size, sizes)?;
            fields.push(field);
        }
        Ok(fields)
    }

    fn field(&self, raw: &RawFieldDescriptor, class_name: &str) -> Result<FieldDescriptor> {
        let name = self
            .string(raw.name)?
            .ok_or_else(|| Error::invalid(format!("class {class_name}: unnamed field")))?;
        Ok(FieldDescriptor {
            external_name: self.string(raw.external_name)?,
            raw_kind: raw.kind,
            flags: raw.flags,
            offset: to_usize(raw.offset, "field offset")?,
            n_elems: to_usize(raw.n_elems, "element count")?,
            total_size: to_usize(raw.total_size, "field size")?,
            embedded: self.class_ref(raw.embedded)?,
            custom_ops: raw.custom_ops.get(),
            name,
        })
    }

    fn record<T: FromBytes>(&self, at: usize) -> Result<T> {
        let size = std::mem::size_of::<T>();
        self.bytes
            .get(at..at + size)
            .and_then(|b| T::read_from_bytes(b).ok())
            .ok_or_else(|| Error::invalid(format!("descriptor at {at} is out of bounds")))
    }

    /// Resolve a region-relative offset to an absolute position inside `region`,
    /// returning the element index for arrays of `stride`-sized records.
    fn target(&self, offset: u64, region: &Range<usize>, stride: usize, what: &str) -> Result<usize> {
        let abs = (region.start as u64)
            .checked_add(offset)
            .filter(|&abs| strictly_inside(abs, self.bytes.len()))
            .ok_or_else(|| Error::invalid(format!("{what} reference {offset:#x} is outside the buffer")))?
            as usize;
        if abs >= region.end || offset as usize % stride != 0 {
            return Err(Error::invalid(format!(
                "{what} reference {offset:#x} does not address a record in its region"
            )));
        }
        Ok(offset as usize / stride)
    }

    fn class_ref(&self, off: RelOff) -> Result<Option<ClassId>> {
        match off.get() {
            None => Ok(None),
            Some(offset) => {
                let index = self.target(offset, &self.classes, CLASS_SIZE, "class")?;
                Ok(Some(ClassId(index as u32)))
            }
        }
    }

    fn string(&self, off: RelOff) -> Result<Option<String>> {
        let Some(offset) = off.get() else {
            return Ok(None);
        };
        let start = self.strings.start + self.target(offset, &self.strings, 1, "string")?;
        let pool = &self.bytes[start..self.strings.end];
        let len = memchr::memchr(0, pool)
            .ok_or_else(|| Error::invalid(format!("unterminated string at {start}")))?;
        let s = std::str::from_utf8(&pool[..len])
            .map_err(|_| Error::invalid(format!("string at {start} is not UTF-8")))?;
        Ok(Some(s.to_owned()))
    }
}

/// A non-null reference must have at least one byte after it and may not be the
/// buffer start itself.
#[inline]
fn strictly_inside(abs: u64, len: usize) -> bool {
    abs > 0 && abs < len as u64
}

fn region_start(offset: u64, len: usize, what: &str) -> Result<usize> {
    if strictly_inside(offset, len) {
        Ok(offset as usize)
    } else {
        Err(Error::invalid(format!("{what} offset {offset:#x} is outside the buffer")))
    }
}

fn array_end(start: usize, count: usize, stride: usize, what: &str) -> Result<usize> {
    count
        .checked_mul(stride)
        .and_then(|n| start.checked_add(n))
        .ok_or_else(|| Error::invalid(format!("{what} size overflows")))
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::invalid(format!("{what} {value} does not fit in memory")))
}

fn check_layout(
    field: &FieldDescriptor,
    class_name: &str,
    instance_size: usize,
    sizes: &[usize],
) -> Result<()> {
    let bad = |what: &str| {
        Error::invalid(format!("{class_name}::{}: {what}", field.name))
    };

    if field
        .offset
        .checked_add(field.total_size)
        .map_or(true, |end| end > instance_size)
    {
        return Err(bad("field lies outside the instance"));
    }

    match field.kind() {
        Some(kind) if kind.is_string() => {
            if field.n_elems.checked_mul(4).map_or(true, |n| n > field.total_size) {
                return Err(bad("string slots are smaller than a handle"));
            }
        }
        Some(FieldKind::Custom) => {
            if field.total_size < 4 {
                return Err(bad("custom slot is smaller than a handle"));
            }
        }
        Some(FieldKind::Embedded) => {
            let embedded = field.embedded.ok_or_else(|| bad("embedded field without a class"))?;
            let needed = sizes[embedded.index()].checked_mul(field.n_elems);
            if needed.map_or(true, |n| n > field.total_size) {
                return Err(bad("embedded elements do not fit the field"));
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_base_chains(classes: &[ClassDescriptor]) -> Result<()> {
    for (i, class) in classes.iter().enumerate() {
        let mut steps = 0;
        let mut cur = class.base;
        while let Some(base) = cur {
            steps += 1;
            if steps > classes.len() {
                return Err(Error::invalid(format!("class {i} has a cyclic base chain")));
            }
            if classes[base.index()].instance_size > class.instance_size {
                return Err(Error::invalid(format!(
                    "{}: base class {} is larger than the derived class",
                    class.name,
                    classes[base.index()].name
                )));
            }
            cur = classes[base.index()].base;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectionBuilder;

    fn foo_blob() -> Vec<u8> {
        let mut builder = CollectionBuilder::new();
        let foo = builder.add_class("Foo", Some("server.dll"), None, 4);
        builder.add_field(foo, "value", FieldKind::Integer, 0, 1);
        builder.build()
    }

    /// Absolute offset of class `i`'s record in a builder-produced blob.
    fn class_at(i: usize) -> usize {
        COLLECTION_PREAMBLE + i * CLASS_SIZE
    }

    fn patch_u64(blob: &mut [u8], at: usize, value: u64) {
        blob[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn assert_invalid(blob: &[u8]) {
        match Collection::relocate(blob) {
            Err(Error::InvalidCollection(_)) => {}
            other => panic!("expected InvalidCollection, got {other:?}"),
        }
    }

    #[test]
    fn test_relocate_minimal() {
        let collection = Collection::relocate(&foo_blob()).unwrap();
        let foo = collection.find_class("Foo").unwrap();
        let class = collection.class(foo);
        assert_eq!(class.module.as_deref(), Some("server.dll"));
        assert_eq!(class.instance_size, 4);
        assert_eq!(class.base, None);
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.fields[0].name, "value");
        assert_eq!(class.fields[0].kind(), Some(FieldKind::Integer));
        assert_eq!(class.fields[0].slot(), 0..4);
    }

    #[test]
    fn test_relocate_hierarchy_and_links() {
        let mut builder = CollectionBuilder::new();
        let vec2 = builder.add_class("Vec2", None, None, 8);
        builder.add_field(vec2, "x", FieldKind::Float, 0, 1);
        builder.add_field(vec2, "y", FieldKind::Float, 4, 1);
        let base = builder.add_class("CBase", None, None, 20);
        builder.add_embedded(base, "m_pos", vec2, 0, 1);
        builder
            .add_custom(base, "m_hList", 8, 12, Some(0x1234))
            .external_name = Some("actors".into());
        let derived = builder.add_class("CDerived", None, Some(base), 24);
        builder.add_field(derived, "m_iszName", FieldKind::String, 20, 1);
        builder.add_linked_name("derived_entity", derived);

        let c = Collection::relocate(&builder.build()).unwrap();
        let derived = c.find_class("derived_entity").unwrap();
        assert_eq!(c.class(derived).name, "CDerived");
        assert!(c.inherits_from(derived, "CBase"));

        let (_, pos) = c.find_field(derived, "m_pos").unwrap();
        assert_eq!(pos.embedded, c.find_class("Vec2"));
        let (_, list) = c.find_field(derived, "m_hList").unwrap();
        assert_eq!(list.custom_ops, Some(0x1234));
        assert_eq!(list.external_name.as_deref(), Some("actors"));
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let mut builder = CollectionBuilder::new();
        let foo = builder.add_class("Foo", None, None, 4);
        builder.add_field(foo, "odd", FieldKind::Integer, 0, 1).raw_kind = 99;
        let c = Collection::relocate(&builder.build()).unwrap();
        let field = &c.class(ClassId(0)).fields[0];
        assert_eq!(field.raw_kind, 99);
        assert_eq!(field.kind(), None);
    }

    #[test]
    fn test_too_small() {
        assert_invalid(&[0u8; TRAILER_SIZE - 1]);
    }

    #[test]
    fn test_corrupted_magic() {
        let mut blob = foo_blob();
        let at = blob.len() - 12;
        blob[at] ^= 0xFF;
        assert_invalid(&blob);
    }

    #[test]
    fn test_version_mismatch() {
        let mut blob = foo_blob();
        let at = blob.len() - 16;
        blob[at] = 2;
        assert!(matches!(
            Collection::relocate(&blob),
            Err(Error::InvalidCollectionVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_no_classes() {
        assert_invalid(&CollectionBuilder::new().build());
    }

    #[test]
    fn test_region_offset_at_buffer_edges() {
        let mut blob = foo_blob();
        let len = blob.len();
        // classes offset
        patch_u64(&mut blob, len - TRAILER_SIZE + 16, 0);
        assert_invalid(&blob);

        let mut blob = foo_blob();
        patch_u64(&mut blob, len - TRAILER_SIZE + 32, len as u64);
        assert_invalid(&blob);
    }

    #[test]
    fn test_fields_and_count_must_agree() {
        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0) + 16, u64::MAX);
        assert_invalid(&blob);

        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0) + 24, 0);
        assert_invalid(&blob);

        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0) + 24, 2);
        assert_invalid(&blob);
    }

    #[test]
    fn test_references_outside_buffer() {
        // base class far past the end
        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0) + 8, 1 << 40);
        assert_invalid(&blob);

        // base class not aligned to a class record
        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0) + 8, 1);
        assert_invalid(&blob);

        // name pointing at the end of the string pool
        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0), "value\0Foo\0server.dll\0".len() as u64);
        assert_invalid(&blob);
    }

    #[test]
    fn test_null_class_name() {
        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0), u64::MAX);
        assert_invalid(&blob);
    }

    #[test]
    fn test_unterminated_string() {
        let mut builder = CollectionBuilder::new();
        builder.add_class("Foo", None, None, 0);
        let mut blob = builder.build();
        // "Foo\0" is the whole pool; drop its terminator.
        let pool_end = blob.len() - TRAILER_SIZE;
        blob[pool_end - 1] = b'!';
        assert_invalid(&blob);
    }

    #[test]
    fn test_field_outside_instance() {
        let mut builder = CollectionBuilder::new();
        let foo = builder.add_class("Foo", None, None, 4);
        builder.add_field(foo, "value", FieldKind::Integer, 2, 1);
        assert_invalid(&builder.build());
    }

    #[test]
    fn test_string_slot_too_small() {
        let mut builder = CollectionBuilder::new();
        let foo = builder.add_class("Foo", None, None, 8);
        builder.add_field(foo, "names", FieldKind::String, 0, 2).total_size = 6;
        assert_invalid(&builder.build());
    }

    #[test]
    fn test_embedded_does_not_fit() {
        let mut builder = CollectionBuilder::new();
        let inner = builder.add_class("Inner", None, None, 8);
        let outer = builder.add_class("Outer", None, None, 16);
        builder.add_embedded(outer, "items", inner, 0, 2).n_elems = 3;
        assert_invalid(&builder.build());
    }

    #[test]
    fn test_base_cycle() {
        let mut blob = foo_blob();
        patch_u64(&mut blob, class_at(0) + 8, 0);
        assert_invalid(&blob);
    }

    #[test]
    fn test_base_larger_than_derived() {
        let mut builder = CollectionBuilder::new();
        let base = builder.add_class("Base", None, None, 16);
        builder.add_class("Derived", None, Some(base), 8);
        assert_invalid(&builder.build());
    }

    #[test]
    fn test_instance_size_cap() {
        let mut builder = CollectionBuilder::new();
        builder.add_class("Huge", None, None, MAX_INSTANCE_SIZE as usize + 1);
        assert_invalid(&builder.build());
    }
}
