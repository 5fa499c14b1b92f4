//! Read-only traversal of restored instances.

use chicago_common::cstr_prefix;
use chicago_datamap::{ClassDescriptor, Collection, FieldDescriptor, FieldKind};

use crate::custom::CustomValue;
use crate::restored::{le_bytes, Handles, RestoredInstance};

/// A restored instance together with what is needed to decode its fields.
#[derive(Debug, Clone, Copy)]
pub struct InstanceView<'a> {
    collection: &'a Collection,
    handles: &'a Handles<'a>,
    instance: RestoredInstance<'a>,
}

impl<'a> InstanceView<'a> {
    pub fn new(
        collection: &'a Collection,
        handles: &'a Handles<'a>,
        instance: RestoredInstance<'a>,
    ) -> Self {
        Self {
            collection,
            handles,
            instance,
        }
    }

    #[inline]
    pub fn instance(&self) -> RestoredInstance<'a> {
        self.instance
    }

    #[inline]
    pub fn class(&self) -> &'a ClassDescriptor {
        self.collection.class(self.instance.class)
    }

    #[inline]
    pub fn class_name(&self) -> &'a str {
        &self.class().name
    }

    /// Decode a field by name, searching base classes too.
    ///
    /// Returns `None` if the class has no such field.
    pub fn get(&self, name: &str) -> Option<Value<'a>> {
        let (_, field) = self.collection.find_field(self.instance.class, name)?;
        Some(self.decode(field))
    }

    /// All fields, base classes first.
    pub fn fields(&self) -> impl Iterator<Item = (&'a FieldDescriptor, Value<'a>)> + '_ {
        let collection = self.collection;
        let mut chain: Vec<_> = collection.base_chain(self.instance.class).collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(move |id| collection.class(id).fields.iter())
            .map(move |field| (field, self.decode(field)))
    }

    #[inline]
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|v| v.as_i32())
    }

    #[inline]
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(|v| v.as_f32())
    }

    #[inline]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    /// A string or character-array field; `None` when it is not UTF-8.
    #[inline]
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(|v| v.as_str())
    }

    /// The bytes of a string or character-array field, as saved.
    #[inline]
    pub fn get_bytes(&self, name: &str) -> Option<&'a [u8]> {
        self.get(name).and_then(|v| v.as_bytes())
    }

    /// The first element of an embedded field.
    pub fn embedded(&self, name: &str) -> Option<InstanceView<'a>> {
        match self.get(name)? {
            Value::Embedded(view) => Some(view),
            Value::Array(values) => values.into_iter().find_map(|v| match v {
                Value::Embedded(view) => Some(view),
                _ => None,
            }),
            _ => None,
        }
    }

    /// The decoded value of a custom field.
    pub fn custom(&self, name: &str) -> Option<&'a CustomValue<'a>> {
        match self.get(name)? {
            Value::Custom(value) => value,
            _ => None,
        }
    }

    /// View another instance restored in the same parse.
    pub fn view(&self, instance: RestoredInstance<'a>) -> InstanceView<'a> {
        Self::new(self.collection, self.handles, instance)
    }

    fn decode(&self, field: &FieldDescriptor) -> Value<'a> {
        let Some(slot) = self.instance.data.get(field.slot()) else {
            return Value::Null;
        };
        let Some(kind) = field.kind() else {
            return Value::Bytes(slot);
        };
        match kind {
            // Character arrays are text buffers.
            FieldKind::Character if field.n_elems > 1 => Value::Chars(slot),
            FieldKind::Embedded => {
                let Some(class) = field.embedded else {
                    return Value::Null;
                };
                let stride = self.collection.class(class).instance_size;
                self.elements(slot, stride, field.n_elems, |data| {
                    Value::Embedded(self.view(RestoredInstance { class, data }))
                })
            }
            // One handle per custom field, whatever its element count.
            FieldKind::Custom => slot
                .get(..4)
                .map_or(Value::Null, |data| self.decode_element(kind, data)),
            _ => {
                // String handles sit at the start of equal shares of the slot.
                let stride = if kind.is_string() {
                    field.total_size.checked_div(field.n_elems).unwrap_or(0)
                } else {
                    kind.element_size()
                };
                self.elements(slot, stride, field.n_elems, |data| self.decode_element(kind, data))
            }
        }
    }

    fn elements(
        &self,
        slot: &'a [u8],
        stride: usize,
        n_elems: usize,
        decode: impl Fn(&'a [u8]) -> Value<'a>,
    ) -> Value<'a> {
        if n_elems == 1 || stride == 0 {
            return slot.get(..stride).map_or(Value::Null, decode);
        }
        Value::Array(
            slot.chunks_exact(stride)
                .take(n_elems)
                .map(decode)
                .collect(),
        )
    }

    fn decode_element(&self, kind: FieldKind, data: &'a [u8]) -> Value<'a> {
        let u32_at = |off| le_bytes(data, off).map(u32::from_le_bytes);
        let f32_at = |off| le_bytes(data, off).map(f32::from_le_bytes).unwrap_or_default();
        match kind {
            FieldKind::Void => Value::Null,
            FieldKind::Boolean => Value::Bool(data.first().is_some_and(|&b| b != 0)),
            FieldKind::Character => data.first().map_or(Value::Null, |&b| Value::Byte(b)),
            FieldKind::Short => le_bytes(data, 0).map_or(Value::Null, |b| Value::Short(i16::from_le_bytes(b))),
            FieldKind::Integer
            | FieldKind::Tick
            | FieldKind::ClassPtr
            | FieldKind::Edict
            | FieldKind::Input => u32_at(0).map_or(Value::Null, |v| Value::Int(v as i32)),
            FieldKind::Float | FieldKind::Time => u32_at(0).map_or(Value::Null, |v| Value::Float(f32::from_bits(v))),
            FieldKind::EHandle => u32_at(0).map_or(Value::Null, Value::Handle),
            FieldKind::Color32 => le_bytes(data, 0).map_or(Value::Null, Value::Color),
            FieldKind::Vector2D | FieldKind::Interval => Value::Vector2([f32_at(0), f32_at(4)]),
            FieldKind::Vector | FieldKind::PositionVector => {
                Value::Vector([f32_at(0), f32_at(4), f32_at(8)])
            }
            FieldKind::Quaternion => Value::Quaternion([f32_at(0), f32_at(4), f32_at(8), f32_at(12)]),
            FieldKind::VMatrix | FieldKind::VMatrixWorldspace | FieldKind::Matrix3x4Worldspace => {
                Value::Bytes(data)
            }
            FieldKind::Custom => Value::Custom(u32_at(0).and_then(|h| self.handles.custom(h))),
            FieldKind::String
            | FieldKind::ModelName
            | FieldKind::SoundName
            | FieldKind::Function
            | FieldKind::ModelIndex
            | FieldKind::MaterialIndex => Value::String(u32_at(0).and_then(|h| self.handles.bytes(h))),
            FieldKind::Embedded => Value::Null,
        }
    }
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    /// Single `character` field.
    Byte(u8),
    Short(i16),
    /// `integer`, `tick`, `classptr`, `edict` and `input`.
    Int(i32),
    /// `float` and `time`.
    Float(f32),
    Handle(u32),
    Color([u8; 4]),
    /// `vector2d` and `interval`.
    Vector2([f32; 2]),
    /// `vector` and `position_vector`.
    Vector([f32; 3]),
    Quaternion([f32; 4]),
    /// Matrices and kinds this crate cannot decode.
    Bytes(&'a [u8]),
    /// `character` array, NUL-padded.
    Chars(&'a [u8]),
    /// String-family field as saved; `None` when empty.
    String(Option<&'a [u8]>),
    Embedded(InstanceView<'a>),
    /// `None` when the field was absent or had no decoder.
    Custom(Option<&'a CustomValue<'a>>),
    Array(Vec<Value<'a>>),
}

impl PartialEq for InstanceView<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.collection, other.collection) && self.instance == other.instance
    }
}

impl<'a> Value<'a> {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Byte(v) => Some(i32::from(*v)),
            Value::Short(v) => Some(i32::from(*v)),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_handle(&self) -> Option<u32> {
        match self {
            Value::Handle(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vector(&self) -> Option<[f32; 3]> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Text of a string field or character array, if it is UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        self.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Bytes of a string field, or a character array up to its first NUL.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::String(s) => *s,
            Value::Chars(bytes) => Some(cstr_prefix(bytes)),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<InstanceView<'a>> {
        match self {
            Value::Embedded(view) => Some(*view),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&'a CustomValue<'a>> {
        match self {
            Value::Custom(value) => *value,
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }
}
