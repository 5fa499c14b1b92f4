//! Custom field decoders.
//!
//! Fields of kind `custom` are written by a native save routine of the game
//! rather than the generic field writer. The schema only records an opaque
//! identifier of that routine (its "custom ops"); every field sharing the
//! routine shares the identifier. [`CustomRegistry`] maps identifiers to the
//! decoders this crate implements by resolving a fixed list of known
//! `(module, class, field)` triples against the schema.

mod activity;
mod output;
mod variant;
mod vector;

use std::hash::BuildHasherDefault;

use chicago_datamap::{ClassId, Collection, FieldDescriptor, FieldKind};
use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use tracing::debug;

use crate::restored::{RestoredArray, RestoredInstance};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Element type of a restored vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorElement {
    Primitive(FieldKind),
    Embedded(ClassId),
}

/// A resolved decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomDecoder {
    /// Growable array of primitives or embedded instances.
    Vector(VectorElement),
    /// Tagged union of a few primitive kinds.
    Variant,
    /// Activity index, optionally followed by its name.
    Activity,
    /// Entity output value plus its list of event actions.
    EntityOutput,
}

/// Decoder named in a [`Registration`], before it is resolved against a schema.
#[derive(Debug, Clone, Copy)]
pub enum DecoderSpec {
    Vector(FieldKind),
    /// Vector of embedded instances of the named class.
    VectorOf(&'static str),
    Variant,
    Activity,
    EntityOutput,
}

/// A field known to be written by one of the supported routines.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub module: &'static str,
    pub class: &'static str,
    pub field: &'static str,
    pub decoder: DecoderSpec,
}

/// Fields whose routines the parser recognizes.
pub const DEFAULT_REGISTRATIONS: &[Registration] = &[
    Registration {
        module: "server.dll",
        class: "CSceneEntity",
        field: "m_hActorList",
        decoder: DecoderSpec::Vector(FieldKind::EHandle),
    },
    Registration {
        module: "server.dll",
        class: "CBaseEntity",
        field: "m_aThinkFunctions",
        decoder: DecoderSpec::VectorOf("thinkfunc_t"),
    },
    Registration {
        module: "server.dll",
        class: "CBaseEntityOutput",
        field: "m_Value",
        decoder: DecoderSpec::Variant,
    },
    Registration {
        module: "server.dll",
        class: "CAI_BaseNPC",
        field: "m_IdealActivity",
        decoder: DecoderSpec::Activity,
    },
    Registration {
        module: "server.dll",
        class: "CBaseEntity",
        field: "m_OnUser1",
        decoder: DecoderSpec::EntityOutput,
    },
];

/// A custom field that received a decoder.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub class: ClassId,
    pub field: usize,
    pub ops: u64,
    pub decoder: CustomDecoder,
}

/// Maps custom-ops identifiers to decoders for one collection.
#[derive(Debug, Default)]
pub struct CustomRegistry {
    decoders: FxHashMap<u64, CustomDecoder>,
    bindings: Vec<Binding>,
}

impl CustomRegistry {
    /// Build the registry for [`DEFAULT_REGISTRATIONS`].
    pub fn new(collection: &Collection) -> Self {
        Self::with_registrations(collection, DEFAULT_REGISTRATIONS)
    }

    pub fn with_registrations(collection: &Collection, registrations: &[Registration]) -> Self {
        let mut by_field: FxHashMap<(&str, &str, &str), u64> = FxHashMap::default();
        for (_, class) in collection.classes() {
            let module = class.module.as_deref().unwrap_or_default();
            for field in &class.fields {
                if let (true, Some(ops)) = (field.is(FieldKind::Custom), field.custom_ops) {
                    by_field.insert((module, class.name.as_str(), field.name.as_str()), ops);
                }
            }
        }

        let mut decoders = FxHashMap::default();
        for reg in registrations {
            let Some(&ops) = by_field.get(&(reg.module, reg.class, reg.field)) else {
                debug!(class = reg.class, field = reg.field, "custom field not in schema");
                continue;
            };
            let decoder = match reg.decoder {
                DecoderSpec::Vector(kind) => CustomDecoder::Vector(VectorElement::Primitive(kind)),
                DecoderSpec::VectorOf(element) => {
                    match collection.find_class_in(reg.module, element) {
                        Some(id) => CustomDecoder::Vector(VectorElement::Embedded(id)),
                        None => {
                            debug!(class = reg.class, field = reg.field, element, "vector element class not in schema");
                            continue;
                        }
                    }
                }
                DecoderSpec::Variant => CustomDecoder::Variant,
                DecoderSpec::Activity => CustomDecoder::Activity,
                DecoderSpec::EntityOutput => CustomDecoder::EntityOutput,
            };
            if let Some(existing) = decoders.insert(ops, decoder) {
                debug_assert_eq!(
                    existing, decoder,
                    "conflicting decoders registered for custom ops {ops:#x}"
                );
            }
        }

        let mut bindings = Vec::new();
        for (id, class) in collection.classes() {
            for (index, field) in class.fields.iter().enumerate() {
                let decoder = field
                    .custom_ops
                    .filter(|_| field.is(FieldKind::Custom))
                    .and_then(|ops| decoders.get(&ops).map(|d| (ops, *d)));
                if let Some((ops, decoder)) = decoder {
                    bindings.push(Binding {
                        class: id,
                        field: index,
                        ops,
                        decoder,
                    });
                }
            }
        }

        debug!(
            decoders = decoders.len(),
            bound_fields = bindings.len(),
            "built custom decoder registry"
        );
        Self { decoders, bindings }
    }

    #[inline]
    pub fn decoder(&self, ops: u64) -> Option<CustomDecoder> {
        self.decoders.get(&ops).copied()
    }

    /// Every custom field in the collection that has a decoder.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

/// Field a binding refers to.
pub fn binding_field<'c>(collection: &'c Collection, binding: &Binding) -> Option<&'c FieldDescriptor> {
    collection.class(binding.class).fields.get(binding.field)
}

/// A decoded custom field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CustomValue<'a> {
    Vector(RestoredVector<'a>),
    Variant(Variant<'a>),
    Activity(Activity<'a>),
    EntityOutput(EntityOutput<'a>),
}

/// A restored growable array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoredVector<'a> {
    pub element: VectorElement,
    pub len: usize,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> RestoredVector<'a> {
    /// Raw bytes of element `index`.
    pub fn element(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.len {
            return None;
        }
        let start = index * self.stride;
        self.data.get(start..start + self.stride)
    }

    /// The elements as instances, for vectors of embedded classes.
    pub fn as_array(&self) -> Option<RestoredArray<'a>> {
        match self.element {
            VectorElement::Embedded(class) => Some(RestoredArray {
                class,
                stride: self.stride,
                len: self.len,
                data: self.data,
            }),
            VectorElement::Primitive(_) => None,
        }
    }
}

/// A restored variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variant<'a> {
    Void,
    Bool(bool),
    Int(i32),
    Float(f32),
    EHandle(u32),
    String(Option<&'a [u8]>),
    Color32([u8; 4]),
    Vector([f32; 3]),
    PositionVector([f32; 3]),
}

/// A restored activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity<'a> {
    pub index: i32,
    /// Present when the index carries the named-activity tag.
    pub name: Option<&'a [u8]>,
}

/// A restored entity output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityOutput<'a> {
    /// `CBaseEntityOutput` instance.
    pub value: RestoredInstance<'a>,
    /// `CEventAction` instances.
    pub actions: RestoredArray<'a>,
}
