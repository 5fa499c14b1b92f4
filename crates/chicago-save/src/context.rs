//! State shared by every step of one parse.

use chicago_common::{cstr_prefix, ByteCursor};
use chicago_datamap::{ClassDescriptor, ClassId, Collection, FieldDescriptor, FieldKind};
use tracing::{debug, warn};

use crate::custom::CustomRegistry;
use crate::record::Record;
use crate::restored::{Handles, RestoredArray, RestoredInstance};
use crate::{Arena, Error, ParseOptions, RecordEndPolicy, Result, SymbolTable};

pub(crate) struct ParseContext<'a> {
    pub collection: &'a Collection,
    pub registry: &'a CustomRegistry,
    pub options: &'a ParseOptions,
    pub arena: &'a Arena,
    pub cursor: ByteCursor<'a>,
    pub symbols: SymbolTable<'a>,
    pub handles: Handles<'a>,
    pub diagnostics: Vec<String>,
    /// Module preferred when a class name exists in several modules.
    pub module: Option<&'a str>,
    /// `CBaseEntityOutput` and `CEventAction`, looked up on first use.
    pub output_classes: Option<(ClassId, ClassId)>,
    pub depth: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        collection: &'a Collection,
        registry: &'a CustomRegistry,
        options: &'a ParseOptions,
        arena: &'a Arena,
        cursor: ByteCursor<'a>,
    ) -> Self {
        Self {
            collection,
            registry,
            options,
            arena,
            cursor,
            symbols: SymbolTable::empty(),
            handles: Handles::default(),
            diagnostics: Vec::new(),
            module: None,
            output_classes: None,
            depth: 0,
        }
    }

    /// Record a recoverable problem.
    pub fn diag(&mut self, message: String) -> Result<()> {
        warn!("{message}");
        self.diagnostics
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        self.diagnostics.push(message);
        Ok(())
    }

    /// Text of a NUL-padded name buffer. Bytes that are not UTF-8 are
    /// replaced and reported.
    pub fn text(&mut self, bytes: &[u8], what: &str) -> Result<String> {
        let bytes = cstr_prefix(bytes);
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Ok(text.to_owned());
        }
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.diag(format!("{what} {text:?} is not valid UTF-8"))?;
        Ok(text)
    }

    pub fn lookup_class(&self, name: &str) -> Result<ClassId> {
        let found = match self.module {
            Some(module) => self.collection.find_class_in(module, name),
            None => self.collection.find_class(name),
        };
        found.ok_or_else(|| Error::DatamapNotFound(name.to_owned()))
    }

    #[inline]
    pub fn class(&self, id: ClassId) -> &'a ClassDescriptor {
        self.collection.class(id)
    }

    /// Find a field the parser depends on, logging when it is missing or
    /// has an unexpected kind.
    pub fn require_field(
        &mut self,
        class: ClassId,
        name: &str,
        kind: FieldKind,
    ) -> Result<&'a FieldDescriptor> {
        let collection = self.collection;
        let class_name = &collection.class(class).name;
        let Some((_, field)) = collection.find_field(class, name) else {
            self.diag(format!("{class_name} has no field {name}"))?;
            return Err(Error::FieldNotFound {
                class: class_name.clone(),
                field: name.to_owned(),
            });
        };
        if !field.is(kind) {
            self.diag(format!(
                "{class_name}::{name} has kind {}, expected {kind}",
                field.raw_kind
            ))?;
            return Err(Error::BadFieldType(field.raw_kind));
        }
        Ok(field)
    }

    pub fn alloc_instance(&self, class: ClassId) -> Result<&'a mut [u8]> {
        self.arena.alloc_zeroed(self.class(class).instance_size)
    }

    pub fn alloc_array(&self, class: ClassId, len: usize) -> Result<(&'a mut [u8], usize)> {
        let stride = self.class(class).instance_size;
        let size = stride.checked_mul(len).ok_or(Error::OutOfMemory)?;
        Ok((self.arena.alloc_zeroed(size)?, stride))
    }

    /// Allocate and restore one instance, base classes first.
    pub fn restore_instance(&mut self, class: ClassId) -> Result<RestoredInstance<'a>> {
        let data = self.alloc_instance(class)?;
        self.restore_recursive(class, data)?;
        Ok(RestoredInstance { class, data })
    }

    /// Allocate and restore one `symbol` field group of `class` only.
    pub fn restore_group(&mut self, symbol: &str, class: ClassId) -> Result<RestoredInstance<'a>> {
        let data = self.alloc_instance(class)?;
        self.restore_fields(symbol, self.class(class), data)?;
        Ok(RestoredInstance { class, data })
    }

    /// Allocate and restore `len` instances, each as one `symbol` field group.
    pub fn restore_array(
        &mut self,
        symbol: &str,
        class: ClassId,
        len: usize,
    ) -> Result<RestoredArray<'a>> {
        let (data, stride) = self.alloc_array(class, len)?;
        let desc = self.class(class);
        for i in 0..len {
            let start = i * stride;
            self.restore_fields(symbol, desc, &mut data[start..start + stride])?;
        }
        Ok(RestoredArray {
            class,
            stride,
            len,
            data,
        })
    }

    /// Close a record whose length the format does not always get right.
    pub fn close_record(&mut self, record: Record<'a>) -> Result<()> {
        let expected = record.end_position();
        let actual = self.cursor.position();
        if record.end(&mut self.cursor, false)? {
            return Ok(());
        }
        match self.options.record_end {
            RecordEndPolicy::Ignore => {
                debug!(record = record.symbol(), expected, actual, "record length mismatch");
                Ok(())
            }
            RecordEndPolicy::Report => self.diag(format!(
                "record {} ended at {actual:#x}, declared end {expected:#x}",
                record.symbol()
            )),
            RecordEndPolicy::Strict => Err(Error::BadBlockEnd { expected, actual }),
        }
    }

    /// Swap in a new cursor, returning the old one.
    #[inline]
    pub fn replace_cursor(&mut self, cursor: ByteCursor<'a>) -> ByteCursor<'a> {
        std::mem::replace(&mut self.cursor, cursor)
    }
}
