//! Save/restore blocks.
//!
//! `.hl1` and `.hl2` state files end their header region with a block set: a
//! table naming each block and locating its header (relative to the header
//! region) and its body (relative to the body region). All headers are read
//! before any body, since bodies may depend on what their header declared.

mod entities;
mod event_queue;
mod templates;

use chicago_common::ByteCursor;
use chicago_datamap::FieldKind;
use tracing::debug;

use crate::context::ParseContext;
use crate::restored::{field_i32, RestoredArray};
use crate::{Error, Result};

pub use entities::{EntitiesBlock, Navigator, NpcHeader, RestoredEntity, ScheduleConditions};
pub use event_queue::EventQueueBlock;
pub use templates::{Template, TemplatesBlock};

/// A block of a state file.
#[derive(Debug, Clone)]
pub enum Block<'a> {
    Entities(EntitiesBlock<'a>),
    Templates(TemplatesBlock<'a>),
    EventQueue(EventQueueBlock<'a>),
    /// A block this parser has no handler for.
    Unhandled { name: String },
    /// A block abandoned after a recoverable error.
    Skipped { name: String, reason: String },
}

impl Block<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Entities(_) => "Entities",
            Self::Templates(_) => "Templates",
            Self::EventQueue(_) => "EventQueue",
            Self::Unhandled { name } | Self::Skipped { name, .. } => name,
        }
    }
}

/// All blocks of a state file, in table order.
#[derive(Debug, Clone)]
pub struct BlockSet<'a> {
    /// `SaveRestoreBlockHeader_t` instances.
    pub headers: RestoredArray<'a>,
    pub blocks: Vec<Block<'a>>,
}

impl<'a> BlockSet<'a> {
    pub fn entities(&self) -> Option<&EntitiesBlock<'a>> {
        self.blocks.iter().find_map(|b| match b {
            Block::Entities(e) => Some(e),
            _ => None,
        })
    }

    pub fn templates(&self) -> Option<&TemplatesBlock<'a>> {
        self.blocks.iter().find_map(|b| match b {
            Block::Templates(t) => Some(t),
            _ => None,
        })
    }

    pub fn event_queue(&self) -> Option<&EventQueueBlock<'a>> {
        self.blocks.iter().find_map(|b| match b {
            Block::EventQueue(q) => Some(q),
            _ => None,
        })
    }
}

/// A block whose header has been read.
enum Pending<'a> {
    Entities(RestoredArray<'a>),
    Templates(i16),
    EventQueue(i16),
    Done(Block<'a>),
}

/// Cursor `offset` bytes into `base`, or `None` if that is not inside it.
pub(crate) fn seek<'a>(base: &ByteCursor<'a>, offset: i32) -> Option<ByteCursor<'a>> {
    let offset = usize::try_from(offset).ok()?;
    let cursor = base.jump(offset);
    (!cursor.is_overflowed()).then_some(cursor)
}

impl<'a> ParseContext<'a> {
    /// Read the block table at the cursor, then every block's header and body.
    pub(crate) fn restore_block_set(
        &mut self,
        headers: ByteCursor<'a>,
        bodies: ByteCursor<'a>,
    ) -> Result<BlockSet<'a>> {
        let count = self.element_count()?;
        let table_class = self.lookup_class("SaveRestoreBlockHeader_t")?;
        let (data, stride) = self.alloc_array(table_class, count)?;
        for i in 0..count {
            let start = i * stride;
            self.restore_recursive(table_class, &mut data[start..start + stride])?;
        }
        let table = RestoredArray {
            class: table_class,
            stride,
            len: count,
            data,
        };

        let name_field = self.require_field(table_class, "szName", FieldKind::Character)?;
        let header_field = self.require_field(table_class, "locHeader", FieldKind::Integer)?;
        let body_field = self.require_field(table_class, "locBody", FieldKind::Integer)?;

        let mut pending = Vec::new();
        pending
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory)?;
        for entry in table.iter() {
            let name = match entry.data.get(name_field.slot()) {
                Some(bytes) => self.text(bytes, "block name")?,
                None => String::new(),
            };
            let loc_header = field_i32(entry.data, header_field);
            let block = self.restore_block_header(name, &headers, loc_header)?;
            pending.push(block);
        }

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory)?;
        for (entry, block) in table.iter().zip(pending) {
            let loc_body = field_i32(entry.data, body_field);
            blocks.push(self.restore_block_body(block, &bodies, loc_body)?);
        }

        Ok(BlockSet {
            headers: table,
            blocks,
        })
    }

    fn restore_block_header(
        &mut self,
        name: String,
        headers: &ByteCursor<'a>,
        loc_header: i32,
    ) -> Result<Pending<'a>> {
        if !matches!(name.as_str(), "Entities" | "Templates" | "EventQueue") {
            self.diag(format!("no handler for block {name:?}"))?;
            return Ok(Pending::Done(Block::Unhandled { name }));
        }
        let Some(cursor) = seek(headers, loc_header) else {
            self.diag(format!("bogus header location {loc_header} for block {name}"))?;
            return Ok(Pending::Done(Block::Skipped {
                name,
                reason: format!("bogus header location {loc_header}"),
            }));
        };
        debug!(block = %name, offset = cursor.position(), "reading block header");
        self.cursor = cursor;

        let result = match name.as_str() {
            "Entities" => self.restore_entities_header().map(Pending::Entities),
            "Templates" => self.read_block_version().map(Pending::Templates),
            _ => self.read_block_version().map(Pending::EventQueue),
        };
        Ok(self.recover(name, result)?.unwrap_or_else(Pending::Done))
    }

    fn restore_block_body(
        &mut self,
        block: Pending<'a>,
        bodies: &ByteCursor<'a>,
        loc_body: i32,
    ) -> Result<Block<'a>> {
        let (name, result) = match block {
            Pending::Done(block) => return Ok(block),
            Pending::Entities(table) => (
                "Entities",
                // Entities locate themselves within the body region.
                self.restore_entities_body(table, bodies).map(Block::Entities),
            ),
            Pending::Templates(version) => {
                let Some(cursor) = seek(bodies, loc_body) else {
                    return self.bogus_body("Templates", loc_body);
                };
                self.cursor = cursor;
                ("Templates", self.restore_templates_body(version).map(Block::Templates))
            }
            Pending::EventQueue(version) => {
                let Some(cursor) = seek(bodies, loc_body) else {
                    return self.bogus_body("EventQueue", loc_body);
                };
                self.cursor = cursor;
                ("EventQueue", self.restore_event_queue_body(version).map(Block::EventQueue))
            }
        };
        Ok(self.recover(name.to_owned(), result)?.unwrap_or_else(|skipped| skipped))
    }

    fn bogus_body(&mut self, name: &str, loc_body: i32) -> Result<Block<'a>> {
        self.diag(format!("bogus body location {loc_body} for block {name}"))?;
        Ok(Block::Skipped {
            name: name.to_owned(),
            reason: format!("bogus body location {loc_body}"),
        })
    }

    fn read_block_version(&mut self) -> Result<i16> {
        let version = self.cursor.read_i16();
        self.cursor.check()?;
        Ok(version)
    }

    /// Turn a recoverable failure of one block into a skipped block.
    fn recover<T>(
        &mut self,
        name: String,
        result: Result<T>,
    ) -> Result<std::result::Result<T, Block<'a>>> {
        match result {
            Ok(value) => Ok(Ok(value)),
            Err(err) if err.is_recoverable() => {
                self.diag(format!("skipping block {name}: {err}"))?;
                Ok(Err(Block::Skipped {
                    name,
                    reason: err.to_string(),
                }))
            }
            Err(err) => Err(err),
        }
    }
}
