//! `.hl1` state files: server-side map state.

use chicago_datamap::FieldKind;

use crate::blocks::BlockSet;
use crate::context::ParseContext;
use crate::restored::{field_i32, RestoredArray, RestoredInstance};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SaveData<'a> {
    /// `SAVE_HEADER` instance.
    pub header: RestoredInstance<'a>,
    /// `levellist_t` instances, one per map connection.
    pub adjacency: RestoredArray<'a>,
    /// `SAVELIGHTSTYLE` instances.
    pub light_styles: RestoredArray<'a>,
    pub blocks: BlockSet<'a>,
}

impl<'a> ParseContext<'a> {
    pub(super) fn restore_save_data(&mut self) -> Result<SaveData<'a>> {
        self.expect_tag(Error::Hl1BadTag)?;
        let symbol_size = self.cursor.read_i32();
        let symbol_count = self.cursor.read_i32();
        let headers_size = self.cursor.read_i32();
        let bodies_size = self.cursor.read_i32();
        self.cursor.check()?;

        self.read_symbol_table(symbol_size, symbol_count)?;
        let headers = self.take_region(headers_size)?;
        let bodies = self.take_region(bodies_size)?;
        let options = self.options;
        self.module = Some(options.server_module.as_str());

        self.cursor = headers;
        let header_class = self.lookup_class("SAVE_HEADER")?;
        let connections = self.require_field(header_class, "connectionCount", FieldKind::Integer)?;
        let light_styles = self.require_field(header_class, "lightStyleCount", FieldKind::Integer)?;
        let header = self.restore_group("Save Header", header_class)?;

        let adjacency = self.restore_counted("ADJACENCY", "levellist_t", field_i32(header.data, connections))?;
        let light_styles =
            self.restore_counted("LIGHTSTYLE", "SAVELIGHTSTYLE", field_i32(header.data, light_styles))?;

        let blocks = self.restore_block_set(headers, bodies)?;
        Ok(SaveData {
            header,
            adjacency,
            light_styles,
            blocks,
        })
    }

    /// Restore `count` field groups of the named class.
    pub(crate) fn restore_counted(
        &mut self,
        symbol: &str,
        class_name: &str,
        count: i32,
    ) -> Result<RestoredArray<'a>> {
        let count = usize::try_from(count).map_err(|_| Error::BadFieldCount(i64::from(count)))?;
        if count > self.cursor.remaining() {
            return Err(Error::ReaderOverflowed);
        }
        let class = self.lookup_class(class_name)?;
        self.restore_array(symbol, class, count)
    }
}
