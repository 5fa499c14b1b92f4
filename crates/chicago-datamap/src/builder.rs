//! Builder for serialized datamap collections.
//!
//! Produces exactly the blob layout [`Collection::relocate`](crate::Collection::relocate)
//! accepts. Used by exporters and to synthesize schemas in tests.
//!
//! ```no_run
//! use chicago_datamap::{CollectionBuilder, FieldKind};
//!
//! let mut builder = CollectionBuilder::new();
//! let base = builder.add_class("CBaseEntity", Some("server.dll"), None, 8);
//! builder.add_field(base, "m_iHealth", FieldKind::Integer, 0, 1);
//! let npc = builder.add_class("CNPC_Test", Some("server.dll"), Some(base), 12);
//! builder.add_field(npc, "m_flSpeed", FieldKind::Float, 8, 1);
//!
//! builder.write_to_file("datamaps.bin")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::hash::BuildHasherDefault;
use std::io::{self, Write};
use std::path::Path;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use crate::raw::*;
use crate::FieldKind;

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Handle to a class in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassHandle(pub u32);

/// A field being built. Fields are public so tests can craft odd layouts.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub external_name: Option<String>,
    pub raw_kind: u32,
    pub flags: u16,
    pub offset: u64,
    pub n_elems: u64,
    pub total_size: u64,
    pub custom_ops: Option<u64>,
    pub embedded: Option<ClassHandle>,
}

#[derive(Debug, Clone)]
struct ClassDef {
    name: String,
    module: Option<String>,
    base: Option<ClassHandle>,
    instance_size: u64,
    fields: Vec<FieldDef>,
}

/// Deduplicating string pool.
#[derive(Debug, Default)]
struct StringPool {
    data: Vec<u8>,
    offsets: FxHashMap<String, u64>,
}

impl StringPool {
    fn add(&mut self, s: &str) -> u64 {
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_owned(), offset);
        offset
    }

    fn add_opt(&mut self, s: Option<&str>) -> RelOff {
        s.map_or(RelOff::NULL, |s| RelOff::new(self.add(s)))
    }
}

/// Builder for datamap collection blobs.
#[derive(Debug, Default)]
pub struct CollectionBuilder {
    classes: Vec<ClassDef>,
    linked_names: Vec<(String, ClassHandle)>,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class. Base classes must be added first.
    pub fn add_class(
        &mut self,
        name: &str,
        module: Option<&str>,
        base: Option<ClassHandle>,
        instance_size: usize,
    ) -> ClassHandle {
        self.classes.push(ClassDef {
            name: name.to_owned(),
            module: module.map(str::to_owned),
            base,
            instance_size: instance_size as u64,
            fields: Vec::new(),
        });
        ClassHandle(self.classes.len() as u32 - 1)
    }

    /// Instance size of a class already added.
    pub fn instance_size(&self, class: ClassHandle) -> usize {
        self.classes[class.0 as usize].instance_size as usize
    }

    /// Add a field of a plain kind; its size is derived from the kind.
    pub fn add_field(
        &mut self,
        class: ClassHandle,
        name: &str,
        kind: FieldKind,
        offset: usize,
        n_elems: usize,
    ) -> &mut FieldDef {
        self.push_field(
            class,
            FieldDef {
                name: name.to_owned(),
                external_name: None,
                raw_kind: kind as u32,
                flags: 0,
                offset: offset as u64,
                n_elems: n_elems as u64,
                total_size: (kind.element_size() * n_elems) as u64,
                custom_ops: None,
                embedded: None,
            },
        )
    }

    /// Add an inline array of `n_elems` instances of `embedded`.
    pub fn add_embedded(
        &mut self,
        class: ClassHandle,
        name: &str,
        embedded: ClassHandle,
        offset: usize,
        n_elems: usize,
    ) -> &mut FieldDef {
        let size = self.instance_size(embedded) * n_elems;
        let field = self.add_field(class, name, FieldKind::Embedded, offset, n_elems);
        field.total_size = size as u64;
        field.embedded = Some(embedded);
        field
    }

    /// Add a custom field restored by the routine identified by `custom_ops`.
    pub fn add_custom(
        &mut self,
        class: ClassHandle,
        name: &str,
        offset: usize,
        total_size: usize,
        custom_ops: Option<u64>,
    ) -> &mut FieldDef {
        let field = self.add_field(class, name, FieldKind::Custom, offset, 1);
        field.total_size = total_size as u64;
        field.custom_ops = custom_ops;
        field
    }

    /// Add a field verbatim.
    pub fn push_field(&mut self, class: ClassHandle, field: FieldDef) -> &mut FieldDef {
        let fields = &mut self.classes[class.0 as usize].fields;
        fields.push(field);
        let last = fields.len() - 1;
        &mut fields[last]
    }

    /// Register an extra lookup name for a class.
    pub fn add_linked_name(&mut self, name: &str, class: ClassHandle) {
        self.linked_names.push((name.to_owned(), class));
    }

    /// Write the collection to a file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    /// Build the collection and return the raw bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut output = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut output);
        output
    }

    /// Write the collection to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut strings = StringPool::default();
        let mut class_records = Vec::with_capacity(self.classes.len());
        let mut field_records = Vec::new();

        for class in &self.classes {
            let first_field = field_records.len() as u64;
            for f in &class.fields {
                field_records.push(RawFieldDescriptor {
                    kind: f.raw_kind,
                    flags: f.flags,
                    _reserved: 0,
                    name: RelOff::new(strings.add(&f.name)),
                    external_name: strings.add_opt(f.external_name.as_deref()),
                    offset: f.offset,
                    n_elems: f.n_elems,
                    total_size: f.total_size,
                    custom_ops: RelOff::from(f.custom_ops),
                    embedded: class_off(f.embedded),
                });
            }

            class_records.push(RawClassDescriptor {
                name: RelOff::new(strings.add(&class.name)),
                base: class_off(class.base),
                fields: if class.fields.is_empty() {
                    RelOff::NULL
                } else {
                    RelOff::new(first_field * FIELD_SIZE as u64)
                },
                n_fields: class.fields.len() as u64,
                module: strings.add_opt(class.module.as_deref()),
                instance_size: class.instance_size,
            });
        }

        let linked_records: Vec<RawLinkedName> = self
            .linked_names
            .iter()
            .map(|(name, class)| RawLinkedName {
                name: RelOff::new(strings.add(name)),
                class: class_off(Some(*class)),
            })
            .collect();

        let classes_off = COLLECTION_PREAMBLE;
        let fields_off = classes_off + class_records.len() * CLASS_SIZE;
        let strings_off = fields_off + field_records.len() * FIELD_SIZE;
        let linked_off = strings_off + strings.data.len();

        let trailer = RawCollectionTrailer {
            n_classes: class_records.len() as u64,
            n_linked_names: linked_records.len() as u64,
            classes: classes_off as u64,
            fields: fields_off as u64,
            strings: strings_off as u64,
            linked_names: linked_off as u64,
            version: COLLECTION_VERSION,
            magic: COLLECTION_MAGIC,
            _reserved: 0,
        };

        writer.write_all(&[0u8; COLLECTION_PREAMBLE])?;
        for c in &class_records {
            writer.write_all(zerocopy::IntoBytes::as_bytes(c))?;
        }
        for f in &field_records {
            writer.write_all(zerocopy::IntoBytes::as_bytes(f))?;
        }
        writer.write_all(&strings.data)?;
        for l in &linked_records {
            writer.write_all(zerocopy::IntoBytes::as_bytes(l))?;
        }
        writer.write_all(zerocopy::IntoBytes::as_bytes(&trailer))?;
        Ok(())
    }
}

fn class_off(class: Option<ClassHandle>) -> RelOff {
    class.map_or(RelOff::NULL, |c| RelOff::new(c.0 as u64 * CLASS_SIZE as u64))
}
