//! The `EventQueue` block: pending entity I/O events.

use chicago_datamap::FieldKind;

use crate::context::ParseContext;
use crate::restored::{field_i32, RestoredArray, RestoredInstance};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQueueBlock<'a> {
    pub version: i16,
    /// `CEventQueue` instance.
    pub queue: RestoredInstance<'a>,
    /// `EventQueuePrioritizedEvent_t` instances.
    pub events: RestoredArray<'a>,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn restore_event_queue_body(&mut self, version: i16) -> Result<EventQueueBlock<'a>> {
        if version != 1 {
            self.diag(format!("unsupported EventQueue version {version}"))?;
            return Err(Error::UnsupportedBlockVersion {
                block: "EventQueue",
                version: i32::from(version),
            });
        }

        let queue_class = self.lookup_class("CEventQueue")?;
        let event_class = self.lookup_class("EventQueuePrioritizedEvent_t")?;
        let count_field = self.require_field(queue_class, "m_iListCount", FieldKind::Integer)?;

        let queue = self.restore_group("EventQueue", queue_class)?;
        let count = field_i32(queue.data, count_field);
        let count = usize::try_from(count).map_err(|_| Error::BadFieldCount(i64::from(count)))?;
        if count > self.cursor.remaining() {
            return Err(Error::ReaderOverflowed);
        }
        let events = self.restore_array("PEvent", event_class, count)?;

        Ok(EventQueueBlock {
            version,
            queue,
            events,
        })
    }
}
