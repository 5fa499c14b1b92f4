//! Activities.

use super::Activity;
use crate::context::ParseContext;
use crate::Result;

/// High bits marking an activity written by name.
const ACTIVITY_FILE_TAG: u32 = 0x8080_0000;
const ACTIVITY_FILE_TAG_MASK: u32 = 0xFFFF_0000;

impl<'a> ParseContext<'a> {
    pub(crate) fn restore_activity(&mut self) -> Result<Activity<'a>> {
        let index = self.cursor.read_i32();
        self.cursor.check()?;

        let mut name = None;
        if index as u32 & ACTIVITY_FILE_TAG_MASK == ACTIVITY_FILE_TAG {
            let len = self.cursor.strlen();
            let bytes = self.cursor.read_bytes(len).unwrap_or_default();
            name = Some(self.arena.alloc_bytes(bytes)?);
            self.cursor.skip_capped(1);
        }
        self.cursor.check()?;
        Ok(Activity { index, name })
    }
}
