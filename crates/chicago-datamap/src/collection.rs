//! Relocated, owned datamap collection.

use std::hash::BuildHasherDefault;
use std::ops::Range;
use std::path::Path;

use hashbrown::HashMap as FastHashMap;
use memmap2::Mmap;
use rustc_hash::FxHasher;

use crate::{FieldKind, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Index of a class within a [`Collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A class ("datamap"): a named field layout with optional single inheritance.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub name: String,
    pub module: Option<String>,
    pub base: Option<ClassId>,
    pub fields: Vec<FieldDescriptor>,
    /// Size of one instance in the restored layout.
    pub instance_size: usize,
}

impl ClassDescriptor {
    /// A free-standing class that is not part of any collection.
    pub fn new(name: impl Into<String>, instance_size: usize) -> Self {
        Self {
            name: name.into(),
            module: None,
            base: None,
            fields: Vec::new(),
            instance_size,
        }
    }

    /// Find one of this class's own fields, ignoring case.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// A field of a class.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub external_name: Option<String>,
    /// Raw kind value; see [`kind`](Self::kind).
    pub raw_kind: u32,
    pub flags: u16,
    /// Byte offset of the field within the owning instance.
    pub offset: usize,
    pub n_elems: usize,
    pub total_size: usize,
    pub embedded: Option<ClassId>,
    /// Identifier of the native restore routine for custom fields.
    pub custom_ops: Option<u64>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, offset: usize, n_elems: usize) -> Self {
        Self {
            name: name.into(),
            external_name: None,
            raw_kind: kind as u32,
            flags: 0,
            offset,
            n_elems,
            total_size: kind.element_size() * n_elems,
            embedded: None,
            custom_ops: None,
        }
    }

    /// Kind of this field, `None` for values outside the known range.
    #[inline]
    pub fn kind(&self) -> Option<FieldKind> {
        FieldKind::from_u32(self.raw_kind)
    }

    #[inline]
    pub fn is(&self, kind: FieldKind) -> bool {
        self.raw_kind == kind as u32
    }

    /// Byte range of this field within its owner.
    #[inline]
    pub fn slot(&self) -> Range<usize> {
        self.offset..self.offset + self.total_size
    }
}

/// A validated set of classes, addressed by [`ClassId`].
///
/// A collection is immutable once built and can be shared between any number
/// of concurrent parses.
#[derive(Debug)]
pub struct Collection {
    classes: Vec<ClassDescriptor>,
    linked_names: Vec<(String, ClassId)>,
    by_name: FxHashMap<String, Vec<ClassId>>,
    by_linked_name: FxHashMap<String, ClassId>,
}

impl Collection {
    /// Load and relocate a collection from a file (memory-mapped while validating).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::relocate(&mmap)
    }

    pub(crate) fn from_parts(
        classes: Vec<ClassDescriptor>,
        linked_names: Vec<(String, ClassId)>,
    ) -> Self {
        let mut by_name: FxHashMap<String, Vec<ClassId>> = FxHashMap::default();
        for (i, class) in classes.iter().enumerate() {
            by_name
                .entry(class.name.clone())
                .or_default()
                .push(ClassId(i as u32));
        }

        let mut by_linked_name = FxHashMap::default();
        for (name, id) in &linked_names {
            by_linked_name.entry(name.clone()).or_insert(*id);
        }

        Self {
            classes,
            linked_names,
            by_name,
            by_linked_name,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Get a class by id.
    ///
    /// Ids handed out by this collection are always valid.
    #[inline]
    pub fn class(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.index()]
    }

    /// Iterate over all classes with their ids.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId(i as u32), c))
    }

    pub fn linked_names(&self) -> &[(String, ClassId)] {
        &self.linked_names
    }

    /// Total number of fields across all classes.
    pub fn field_count(&self) -> usize {
        self.classes.iter().map(|c| c.fields.len()).sum()
    }

    /// Find a class by name or linked name.
    ///
    /// When several modules define the same class name the first one in the
    /// collection wins; use [`find_class_in`](Self::find_class_in) to pick one.
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.by_name
            .get(name)
            .and_then(|ids| ids.first().copied())
            .or_else(|| self.by_linked_name.get(name).copied())
    }

    /// Find a class by name, preferring the one from `module`.
    pub fn find_class_in(&self, module: &str, name: &str) -> Option<ClassId> {
        match self.by_name.get(name) {
            Some(ids) => ids
                .iter()
                .copied()
                .find(|&id| self.class(id).module.as_deref() == Some(module))
                .or_else(|| ids.first().copied()),
            None => self.by_linked_name.get(name).copied(),
        }
    }

    /// Every class with exactly this name.
    pub fn classes_named(&self, name: &str) -> &[ClassId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Walk from `id` up through its base classes.
    pub fn base_chain(&self, id: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        std::iter::successors(Some(id), move |&c| self.class(c).base)
    }

    /// Whether `id` is, or derives from, a class named `ancestor`.
    pub fn inherits_from(&self, id: ClassId, ancestor: &str) -> bool {
        self.base_chain(id).any(|c| self.class(c).name == ancestor)
    }

    /// Find a field by name (ignoring case) in `id` or any of its bases.
    pub fn find_field(&self, id: ClassId, name: &str) -> Option<(ClassId, &FieldDescriptor)> {
        self.base_chain(id)
            .find_map(|c| self.class(c).field(name).map(|f| (c, f)))
    }
}
