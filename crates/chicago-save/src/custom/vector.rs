//! Growable arrays ("uv" field groups).

use chicago_datamap::{ClassDescriptor, FieldDescriptor, FieldKind};

use super::{RestoredVector, VectorElement};
use crate::context::ParseContext;
use crate::{Error, Result};

impl<'a> ParseContext<'a> {
    /// Read a 32-bit element count that must be non-negative and no larger
    /// than the bytes left in range.
    pub(crate) fn element_count(&mut self) -> Result<usize> {
        let count = self.cursor.read_i32();
        self.cursor.check()?;
        let count = usize::try_from(count).map_err(|_| Error::BadFieldCount(i64::from(count)))?;
        if count > self.cursor.remaining() {
            return Err(Error::ReaderOverflowed);
        }
        Ok(count)
    }

    pub(crate) fn restore_vector(&mut self, element: VectorElement) -> Result<RestoredVector<'a>> {
        let len = self.element_count()?;
        let stride = match element {
            VectorElement::Primitive(kind) => kind.element_size(),
            VectorElement::Embedded(class) => self.class(class).instance_size,
        };
        let size = stride.checked_mul(len).ok_or(Error::OutOfMemory)?;
        let data = self.arena.alloc_zeroed(size)?;

        match element {
            // One "uv" group per element, holding the element as an embedded field.
            VectorElement::Embedded(class) => {
                let mut elems = FieldDescriptor::new("elems", FieldKind::Embedded, 0, 1);
                elems.total_size = stride;
                elems.embedded = Some(class);
                let mut holder = ClassDescriptor::new("uv", stride);
                holder.fields.push(elems);

                for i in 0..len {
                    let start = i * stride;
                    self.restore_fields("uv", &holder, &mut data[start..start + stride])?;
                }
            }
            // A single "elems" group spanning every element.
            VectorElement::Primitive(kind) => {
                if len > 0 {
                    let mut holder = ClassDescriptor::new("uv", size);
                    holder
                        .fields
                        .push(FieldDescriptor::new("elems", kind, 0, len));
                    self.restore_fields("elems", &holder, data)?;
                }
            }
        }

        Ok(RestoredVector {
            element,
            len,
            stride,
            data,
        })
    }
}
