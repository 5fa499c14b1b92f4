//! Variants.

use chicago_datamap::FieldKind;

use super::Variant;
use crate::context::ParseContext;
use crate::restored::le_bytes;
use crate::Result;

fn f32_at(buf: &[u8], offset: usize) -> f32 {
    le_bytes(buf, offset).map_or(0.0, f32::from_le_bytes)
}

fn vec3(buf: &[u8]) -> [f32; 3] {
    [f32_at(buf, 0), f32_at(buf, 4), f32_at(buf, 8)]
}

impl<'a> ParseContext<'a> {
    /// A 32-bit field kind followed by one value of that kind.
    pub(crate) fn restore_variant(&mut self) -> Result<Variant<'a>> {
        let tag = self.cursor.read_i32();
        self.cursor.check()?;

        let kind = u32::try_from(tag).ok().and_then(FieldKind::from_u32);
        let kind = match kind {
            Some(FieldKind::Void) => return Ok(Variant::Void),
            Some(
                kind @ (FieldKind::Boolean
                | FieldKind::Integer
                | FieldKind::Float
                | FieldKind::EHandle
                | FieldKind::String
                | FieldKind::Color32
                | FieldKind::Vector
                | FieldKind::PositionVector),
            ) => kind,
            _ => {
                self.diag(format!("variant has unsupported type {tag}"))?;
                return Ok(Variant::Void);
            }
        };

        let mut buf = [0u8; 12];
        let size = kind.element_size();
        self.restore_simple_field(&mut buf[..size], kind as u32, 1, size)?;

        let word = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Ok(match kind {
            FieldKind::Boolean => Variant::Bool(buf[0] != 0),
            FieldKind::Integer => Variant::Int(word as i32),
            FieldKind::Float => Variant::Float(f32::from_bits(word)),
            FieldKind::EHandle => Variant::EHandle(word),
            FieldKind::String => Variant::String(self.handles.bytes(word)),
            FieldKind::Color32 => Variant::Color32([buf[0], buf[1], buf[2], buf[3]]),
            FieldKind::Vector => Variant::Vector(vec3(&buf)),
            _ => Variant::PositionVector(vec3(&buf)),
        })
    }
}
