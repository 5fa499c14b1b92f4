//! The `Templates` block: point_template entity data.

use chicago_datamap::FieldKind;

use crate::context::ParseContext;
use crate::restored::RestoredInstance;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template<'a> {
    /// `TemplateEntityData_t` instance.
    pub data: RestoredInstance<'a>,
    pub name: Option<&'a [u8]>,
    pub map_data: Option<&'a [u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatesBlock<'a> {
    pub version: i16,
    pub template_instance: i32,
    pub templates: Vec<Template<'a>>,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn restore_templates_body(&mut self, version: i16) -> Result<TemplatesBlock<'a>> {
        if version != 1 {
            self.diag(format!("unsupported Templates version {version}"))?;
            return Err(Error::UnsupportedBlockVersion {
                block: "Templates",
                version: i32::from(version),
            });
        }

        let class = self.lookup_class("TemplateEntityData_t")?;
        self.require_field(class, "iMapDataLength", FieldKind::Integer)?;

        let template_instance = self.cursor.read_i32();
        let count = self.cursor.read_i16();
        self.cursor.check()?;
        let count = usize::try_from(count).map_err(|_| Error::BadFieldCount(i64::from(count)))?;

        let mut templates = Vec::new();
        templates
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory)?;
        for _ in 0..count {
            let data = self.restore_instance(class)?;
            let name = self.read_string()?;
            let map_data = self.read_string()?;
            templates.push(Template {
                data,
                name,
                map_data,
            });
        }

        Ok(TemplatesBlock {
            version,
            template_instance,
            templates,
        })
    }
}
