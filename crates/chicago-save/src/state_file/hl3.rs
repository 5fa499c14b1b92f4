//! `.hl3` state files: entities to patch on load.

use crate::context::ParseContext;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityPatch {
    /// Entity table indices.
    pub entities: Vec<i32>,
}

impl ParseContext<'_> {
    pub(super) fn restore_entity_patch(&mut self) -> Result<EntityPatch> {
        let count = self.cursor.read_i32();
        self.cursor.check()?;
        let count = usize::try_from(count).map_err(|_| Error::BadFieldCount(i64::from(count)))?;
        if count.checked_mul(4).map_or(true, |n| n > self.cursor.remaining()) {
            return Err(Error::ReaderOverflowed);
        }

        let mut entities = Vec::new();
        entities
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory)?;
        for _ in 0..count {
            entities.push(self.cursor.read_i32());
        }
        self.cursor.check()?;
        Ok(EntityPatch { entities })
    }
}
