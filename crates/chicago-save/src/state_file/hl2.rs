//! `.hl2` state files: client-side map state.

use tracing::debug;

use crate::blocks::BlockSet;
use crate::context::ParseContext;
use crate::restored::RestoredArray;
use crate::{Error, Result};

/// Marks the section header that adds the music region.
const SECTION_MAGIC: u32 = 0x5454_1234;
const SECTION_VERSION: i32 = 2;

#[derive(Debug, Clone)]
pub struct ClientState<'a> {
    pub blocks: BlockSet<'a>,
    /// `decallist_t` instances; `None` when absent or not in the schema.
    pub decals: Option<RestoredArray<'a>>,
    /// `musicsave_t` instances; `None` when absent or not in the schema.
    pub music: Option<RestoredArray<'a>>,
}

/// Region sizes and counts from the start of the file.
#[derive(Debug, Default)]
struct Sections {
    entity_size: i32,
    header_size: i32,
    decal_size: i32,
    music_size: i32,
    symbol_size: i32,
    decal_count: i32,
    music_count: i32,
    symbol_count: i32,
}

impl<'a> ParseContext<'a> {
    pub(super) fn restore_client_state(&mut self) -> Result<ClientState<'a>> {
        self.expect_tag(Error::Hl2BadTag)?;
        let sections = self.read_sections()?;
        debug!(?sections, "client state sections");

        self.read_symbol_table(sections.symbol_size, sections.symbol_count)?;
        let headers = self.take_region(sections.header_size)?;
        let bodies = self.take_region(sections.entity_size)?;
        let decals = self.take_region(sections.decal_size)?;
        let music = self.take_region(sections.music_size)?;
        let options = self.options;
        self.module = Some(options.client_module.as_str());

        self.cursor = headers;
        let blocks = self.restore_block_set(headers, bodies)?;

        self.cursor = decals;
        let decals = self.restore_optional("DECALLIST", "decallist_t", sections.decal_count)?;
        self.cursor = music;
        let music = self.restore_optional("MUSICLIST", "musicsave_t", sections.music_count)?;

        Ok(ClientState {
            blocks,
            decals,
            music,
        })
    }

    fn read_sections(&mut self) -> Result<Sections> {
        let mut sections = Sections::default();
        if self.cursor.peek_u32() == Some(SECTION_MAGIC) {
            self.cursor.skip(4);
            let version = self.cursor.read_i32();
            self.cursor.check()?;
            if version != SECTION_VERSION {
                return Err(Error::Hl2BadSectionHeader);
            }
            sections.entity_size = self.cursor.read_i32();
            sections.header_size = self.cursor.read_i32();
            sections.decal_size = self.cursor.read_i32();
            sections.music_size = self.cursor.read_i32();
            sections.symbol_size = self.cursor.read_i32();
            sections.decal_count = self.cursor.read_i32();
            sections.music_count = self.cursor.read_i32();
            sections.symbol_count = self.cursor.read_i32();
        } else {
            sections.entity_size = self.cursor.read_i32();
            sections.header_size = self.cursor.read_i32();
            sections.decal_size = self.cursor.read_i32();
            sections.symbol_size = self.cursor.read_i32();
            sections.decal_count = self.cursor.read_i32();
            sections.symbol_count = self.cursor.read_i32();
        }
        self.cursor.check()?;
        Ok(sections)
    }

    /// Like [`restore_counted`](Self::restore_counted), but a class missing
    /// from the schema is only a diagnostic.
    fn restore_optional(
        &mut self,
        symbol: &str,
        class_name: &str,
        count: i32,
    ) -> Result<Option<RestoredArray<'a>>> {
        if count == 0 {
            return Ok(None);
        }
        match self.restore_counted(symbol, class_name, count) {
            Ok(array) => Ok(Some(array)),
            Err(Error::DatamapNotFound(name)) => {
                self.diag(format!("skipping {symbol}: {name} not in schema"))?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
