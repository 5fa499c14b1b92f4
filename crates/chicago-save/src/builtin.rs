//! Classes the format uses that are not part of any exported schema.

use chicago_common::cstr_prefix;
use chicago_datamap::{ClassDescriptor, FieldDescriptor, FieldKind};

use crate::restored::le_bytes;

/// Size of the restored game header.
pub const GAME_HEADER_SIZE: usize = 404;

/// Name and byte range of each text field of the header.
pub(crate) const GAME_HEADER_TEXT: [(&str, std::ops::Range<usize>); 4] = [
    ("mapName", 0..32),
    ("comment", 32..112),
    ("originMapName", 116..148),
    ("landmark", 148..404),
];

/// Layout of the header at the start of the global fields.
pub fn game_header_class() -> ClassDescriptor {
    let mut class = ClassDescriptor::new("GAME_HEADER", GAME_HEADER_SIZE);
    class.fields = vec![
        FieldDescriptor::new("mapName", FieldKind::Character, 0, 32),
        FieldDescriptor::new("comment", FieldKind::Character, 32, 80),
        FieldDescriptor::new("mapCount", FieldKind::Integer, 112, 1),
        FieldDescriptor::new("originMapName", FieldKind::Character, 116, 32),
        FieldDescriptor::new("landmark", FieldKind::Character, 148, 256),
    ];
    class
}

/// The save's game header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameHeader {
    pub map_name: String,
    pub comment: String,
    pub map_count: i32,
    pub origin_map_name: String,
    pub landmark: String,
}

impl GameHeader {
    /// Decode a buffer laid out by [`game_header_class`].
    ///
    /// Text that is not UTF-8 is decoded lossily; the save parser reports it.
    pub fn from_bytes(data: &[u8]) -> Self {
        let [map_name, comment, origin_map_name, landmark] = GAME_HEADER_TEXT.map(|(_, range)| {
            data.get(range)
                .map(|b| String::from_utf8_lossy(cstr_prefix(b)).into_owned())
                .unwrap_or_default()
        });
        Self {
            map_name,
            comment,
            map_count: le_bytes(data, 112).map_or(0, i32::from_le_bytes),
            origin_map_name,
            landmark,
        }
    }
}
