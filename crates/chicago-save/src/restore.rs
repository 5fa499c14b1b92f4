//! Schema-driven field restoration.
//!
//! A field group on disk is a record of four bytes (the field count) tagged
//! with the class symbol, followed by one record per saved field. Each field
//! record is tagged with the field's name and holds its raw value.

use chicago_datamap::{ClassDescriptor, ClassId, FieldDescriptor, FieldKind};
use tracing::trace;

use crate::context::ParseContext;
use crate::custom::{CustomDecoder, CustomValue};
use crate::record::Record;
use crate::restored::write_handle;
use crate::{Error, Result};

/// Declared size of the field-count record opening every field group.
const FIELDS_MARKER: i16 = 4;

/// Rotating start index for field lookups within one field group.
///
/// Streams usually list fields in schema order, so starting each scan just
/// past the previous match makes lookups O(1) in the common case.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FieldCookie(usize);

impl FieldCookie {
    pub fn find<'c>(&mut self, class: &'c ClassDescriptor, name: &str) -> Result<&'c FieldDescriptor> {
        let n = class.fields.len();
        for step in 0..n {
            let index = (self.0 + step) % n;
            let field = &class.fields[index];
            if field.name.eq_ignore_ascii_case(name) {
                self.0 = (index + 1) % n;
                return Ok(field);
            }
        }
        Err(Error::FieldNotFound {
            class: class.name.clone(),
            field: name.to_owned(),
        })
    }
}

impl<'a> ParseContext<'a> {
    /// Restore one field group of `class` into `dest`.
    pub fn restore_fields(
        &mut self,
        symbol: &str,
        class: &ClassDescriptor,
        dest: &mut [u8],
    ) -> Result<()> {
        if self.depth >= self.options.max_depth {
            return Err(Error::NestingTooDeep(self.options.max_depth));
        }
        self.depth += 1;
        let result = self.restore_field_group(symbol, class, dest);
        self.depth -= 1;
        result
    }

    fn restore_field_group(
        &mut self,
        symbol: &str,
        class: &ClassDescriptor,
        dest: &mut [u8],
    ) -> Result<()> {
        let marker = self.cursor.read_i16();
        self.cursor.check()?;
        if marker != FIELDS_MARKER {
            return Err(Error::BadFieldsMarker(marker));
        }

        let index = self.cursor.read_i16();
        self.cursor.check()?;
        let found = self.symbols.lookup(i32::from(index))?;
        if !found.eq_ignore_ascii_case(symbol) {
            return Err(Error::BadSymbol(format!(
                "expected field group {symbol}, found {found}"
            )));
        }

        let count = self.cursor.read_i32();
        self.cursor.check()?;
        if count < 0 {
            return Err(Error::BadFieldCount(i64::from(count)));
        }
        trace!(class = %class.name, count, "restoring field group");

        let mut cookie = FieldCookie::default();
        for _ in 0..count {
            let record = Record::start(&self.symbols, &mut self.cursor)?;
            let field = cookie.find(class, record.symbol())?;
            self.restore_field(class, field, dest)?;
            self.close_record(record)?;
        }
        Ok(())
    }

    /// Restore an instance of `class` as one field group per class in its
    /// inheritance chain, base first.
    pub fn restore_recursive(&mut self, class: ClassId, dest: &mut [u8]) -> Result<()> {
        let collection = self.collection;
        let chain: Vec<ClassId> = collection.base_chain(class).collect();
        for &id in chain.iter().rev() {
            let desc = collection.class(id);
            self.restore_fields(&desc.name, desc, dest)?;
        }
        Ok(())
    }

    fn restore_field(
        &mut self,
        class: &ClassDescriptor,
        field: &FieldDescriptor,
        dest: &mut [u8],
    ) -> Result<()> {
        let slot = dest.get_mut(field.slot()).ok_or(Error::BadFieldRead)?;
        trace!(field = %field.name, kind = field.raw_kind, "restoring field");
        match field.kind() {
            Some(FieldKind::Custom) => self.restore_custom_field(class, field, slot),
            Some(FieldKind::Embedded) => self.restore_embedded_field(field, slot),
            _ => self.restore_simple_field(slot, field.raw_kind, field.n_elems, field.total_size),
        }
    }

    fn restore_embedded_field(&mut self, field: &FieldDescriptor, slot: &mut [u8]) -> Result<()> {
        let embedded = field.embedded.ok_or(Error::BadFieldType(field.raw_kind))?;
        let stride = self.class(embedded).instance_size;
        for i in 0..field.n_elems {
            let start = i.checked_mul(stride).ok_or(Error::BadFieldRead)?;
            let elem = slot
                .get_mut(start..start + stride)
                .ok_or(Error::BadFieldRead)?;
            self.restore_recursive(embedded, elem)?;
        }
        Ok(())
    }

    fn restore_custom_field(
        &mut self,
        class: &ClassDescriptor,
        field: &FieldDescriptor,
        slot: &mut [u8],
    ) -> Result<()> {
        let decoder = field.custom_ops.and_then(|ops| self.registry.decoder(ops));
        let Some(decoder) = decoder else {
            let skipped = self.cursor.remaining();
            self.diag(format!(
                "no custom restore for {}::{}, skipping {skipped} bytes",
                class.name, field.name
            ))?;
            self.cursor.skip(skipped);
            return Ok(());
        };

        let value = match decoder {
            CustomDecoder::Vector(element) => CustomValue::Vector(self.restore_vector(element)?),
            CustomDecoder::Variant => CustomValue::Variant(self.restore_variant()?),
            CustomDecoder::Activity => CustomValue::Activity(self.restore_activity()?),
            CustomDecoder::EntityOutput => match self.restore_entity_output(field)? {
                Some(output) => CustomValue::EntityOutput(output),
                None => return Ok(()),
            },
        };
        let handle = self.handles.push_custom(self.arena, value)?;
        write_handle(slot, handle);
        Ok(())
    }

    /// Restore a field whose kind has a fixed on-disk shape.
    pub fn restore_simple_field(
        &mut self,
        dest: &mut [u8],
        raw_kind: u32,
        n_elems: usize,
        total_size: usize,
    ) -> Result<()> {
        let kind = FieldKind::from_u32(raw_kind).ok_or(Error::BadFieldType(raw_kind))?;
        if kind.is_string() {
            let stride = total_size.checked_div(n_elems).unwrap_or(0);
            for i in 0..n_elems {
                let len = self.cursor.strlen();
                if len > 0 {
                    let bytes = self.cursor.read_bytes(len).unwrap_or_default();
                    let bytes = self.arena.alloc_bytes(bytes)?;
                    let handle = self.handles.push_string(self.arena, bytes)?;
                    if let Some(elem) = dest.get_mut(i * stride..) {
                        write_handle(elem, handle);
                    }
                }
                // Terminator; tolerated when the stream ends right after the text.
                self.cursor.skip_capped(1);
            }
        } else if kind.is_fixed_binary() {
            if total_size == 0 || self.cursor.remaining() < total_size {
                return Err(Error::BadFieldRead);
            }
            let dest = dest.get_mut(..total_size).ok_or(Error::BadFieldRead)?;
            self.cursor.read(dest);
        } else {
            return Err(Error::BadFieldType(raw_kind));
        }
        self.cursor.check()?;
        Ok(())
    }

    /// Read one NUL-terminated string into the arena, bytes as written.
    /// Empty strings are `None`.
    pub fn read_string(&mut self) -> Result<Option<&'a [u8]>> {
        let len = self.cursor.strlen();
        let bytes = self.cursor.read_bytes(len).unwrap_or_default();
        self.cursor.skip(1);
        self.cursor.check()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.arena.alloc_bytes(bytes)?))
    }
}
