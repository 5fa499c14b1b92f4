//! The `Entities` block.

use chicago_common::ByteCursor;
use chicago_datamap::{ClassId, FieldKind};
use tracing::{debug, trace};

use super::seek;
use crate::context::ParseContext;
use crate::custom::{RestoredVector, VectorElement};
use crate::record::Record;
use crate::restored::{field_handle, field_i16, field_i32, RestoredArray, RestoredInstance};
use crate::{Error, Result};

/// Table fields that default to -1 rather than zero.
const UNSET_TABLE_FIELDS: [&str; 3] = ["id", "edictindex", "saveentityindex"];

/// Version of `AIExtendedSaveHeader_t` that added schedule conditions.
const NPC_CONDITIONS_VERSION: i16 = 2;
/// Version of `AIExtendedSaveHeader_t` that added the navigator.
const NPC_NAVIGATOR_VERSION: i16 = 5;

/// Schedule condition lists saved ahead of an NPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleConditions<'a> {
    pub conditions: Vec<&'a [u8]>,
    pub custom_interrupts: Vec<&'a [u8]>,
    pub pre_ignore: Vec<&'a [u8]>,
    pub ignore: Vec<&'a [u8]>,
}

/// Navigator state saved ahead of an NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator<'a> {
    pub version: i16,
    /// `AI_Waypoint_t` route, when the version is understood.
    pub path: Option<RestoredVector<'a>>,
}

/// Extra structures preceding an NPC's own fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcHeader<'a> {
    /// `AIExtendedSaveHeader_t` instance.
    pub extended: RestoredInstance<'a>,
    pub version: i16,
    pub conditions: Option<ScheduleConditions<'a>>,
    pub navigator: Option<Navigator<'a>>,
}

/// One restored entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredEntity<'a> {
    /// Position in the entity table.
    pub index: usize,
    pub classname: &'a str,
    pub instance: RestoredInstance<'a>,
    pub npc: Option<NpcHeader<'a>>,
}

#[derive(Debug, Clone)]
pub struct EntitiesBlock<'a> {
    /// `entitytable_t` instances.
    pub table: RestoredArray<'a>,
    /// One slot per table entry; `None` for empty or unrestorable entries.
    pub entities: Vec<Option<RestoredEntity<'a>>>,
}

impl<'a> EntitiesBlock<'a> {
    /// Entities that were restored.
    pub fn restored(&self) -> impl Iterator<Item = &RestoredEntity<'a>> {
        self.entities.iter().flatten()
    }
}

impl<'a> ParseContext<'a> {
    pub(crate) fn restore_entities_header(&mut self) -> Result<RestoredArray<'a>> {
        let count = self.element_count()?;
        let class = self.lookup_class("entitytable_t")?;
        let (data, stride) = self.alloc_array(class, count)?;

        let collection = self.collection;
        for name in UNSET_TABLE_FIELDS {
            let Some((_, field)) = collection.find_field(class, name) else {
                self.diag(format!("entitytable_t has no field {name}"))?;
                continue;
            };
            for i in 0..count {
                let start = i * stride + field.offset;
                if let Some(slot) = data.get_mut(start..start + 4) {
                    slot.copy_from_slice(&(-1i32).to_le_bytes());
                }
            }
        }

        let desc = self.class(class);
        for i in 0..count {
            let start = i * stride;
            self.restore_fields("ETABLE", desc, &mut data[start..start + stride])?;
        }
        debug!(count, "read entity table");
        Ok(RestoredArray {
            class,
            stride,
            len: count,
            data,
        })
    }

    pub(crate) fn restore_entities_body(
        &mut self,
        table: RestoredArray<'a>,
        bodies: &ByteCursor<'a>,
    ) -> Result<EntitiesBlock<'a>> {
        let classname_field = self.require_field(table.class, "classname", FieldKind::String)?;
        let size_field = self.require_field(table.class, "size", FieldKind::Integer)?;
        let location_field = self.require_field(table.class, "location", FieldKind::Integer)?;

        let mut entities = Vec::new();
        entities
            .try_reserve_exact(table.len())
            .map_err(|_| Error::OutOfMemory)?;

        for (index, entry) in table.iter().enumerate() {
            let handle = field_handle(entry.data, classname_field);
            let classname = self.handles.string(handle);
            if classname.is_none() {
                if let Some(bytes) = self.handles.bytes(handle) {
                    self.diag(format!(
                        "entity {index} classname {:?} is not valid UTF-8",
                        String::from_utf8_lossy(bytes)
                    ))?;
                }
            }
            let size = field_i32(entry.data, size_field);
            let (Some(classname), true) = (classname, size != 0) else {
                entities.push(None);
                continue;
            };

            let location = field_i32(entry.data, location_field);
            let body = match (seek(bodies, location), usize::try_from(size)) {
                (Some(mut at), Ok(size)) => Some(at.split(size)),
                _ => None,
            };
            let Some(body) = body.filter(|b| !b.is_overflowed()) else {
                self.diag(format!(
                    "entity {index} ({classname}) has bogus location {location} size {size}"
                ))?;
                entities.push(None);
                continue;
            };

            self.cursor = body;
            match self.restore_entity(index, classname) {
                Ok(entity) => entities.push(Some(entity)),
                Err(Error::OutOfMemory) => return Err(Error::OutOfMemory),
                Err(err) => {
                    self.diag(format!("failed to restore entity {index} ({classname}): {err}"))?;
                    entities.push(None);
                }
            }
        }

        debug!(
            restored = entities.iter().flatten().count(),
            total = entities.len(),
            "restored entities"
        );
        Ok(EntitiesBlock { table, entities })
    }

    fn restore_entity(&mut self, index: usize, classname: &'a str) -> Result<RestoredEntity<'a>> {
        let class = self.lookup_class(classname)?;
        trace!(index, classname, "restoring entity");
        let npc = if self.collection.inherits_from(class, "CAI_BaseNPC") {
            Some(self.restore_npc_header(classname)?)
        } else {
            None
        };
        let instance = self.restore_instance(class)?;
        Ok(RestoredEntity {
            index,
            classname,
            instance,
            npc,
        })
    }

    fn restore_npc_header(&mut self, classname: &str) -> Result<NpcHeader<'a>> {
        let header_class = self.lookup_class("AIExtendedSaveHeader_t")?;
        let extended = self.restore_instance(header_class)?;
        let version = match self.collection.find_field(header_class, "version") {
            Some((_, field)) => field_i16(extended.data, field),
            None => {
                self.diag("AIExtendedSaveHeader_t has no field version".to_owned())?;
                0
            }
        };

        let conditions = if version >= NPC_CONDITIONS_VERSION {
            Some(self.restore_schedule_conditions()?)
        } else {
            self.diag(format!(
                "{classname}: extended header version {version} predates schedule conditions"
            ))?;
            None
        };

        let navigator = if version >= NPC_NAVIGATOR_VERSION {
            Some(self.restore_navigator()?)
        } else {
            self.diag(format!(
                "{classname}: extended header version {version} predates navigator state"
            ))?;
            None
        };

        Ok(NpcHeader {
            extended,
            version,
            conditions,
            navigator,
        })
    }

    fn restore_schedule_conditions(&mut self) -> Result<ScheduleConditions<'a>> {
        let record = Record::start(&self.symbols, &mut self.cursor)?;
        let conditions = ScheduleConditions {
            conditions: self.read_string_list()?,
            custom_interrupts: self.read_string_list()?,
            pre_ignore: self.read_string_list()?,
            ignore: self.read_string_list()?,
        };
        record.end(&mut self.cursor, true)?;
        Ok(conditions)
    }

    /// Strings up to and including an empty one.
    fn read_string_list(&mut self) -> Result<Vec<&'a [u8]>> {
        let mut list = Vec::new();
        while let Some(s) = self.read_string()? {
            list.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
            list.push(s);
        }
        Ok(list)
    }

    fn restore_navigator(&mut self) -> Result<Navigator<'a>> {
        let record = Record::start(&self.symbols, &mut self.cursor)?;
        let version = self.cursor.read_i16();
        self.cursor.check()?;

        let mut path = None;
        if version == 1 {
            match self.waypoint_class() {
                Ok(class) => match self.restore_vector(VectorElement::Embedded(class)) {
                    Ok(vector) => path = Some(vector),
                    Err(Error::OutOfMemory) => return Err(Error::OutOfMemory),
                    Err(err) => self.diag(format!("failed to restore navigator path: {err}"))?,
                },
                Err(err) => self.diag(format!("failed to restore navigator path: {err}"))?,
            }
        } else {
            self.diag(format!("unsupported navigator version {version}"))?;
        }
        self.close_record(record)?;
        Ok(Navigator { version, path })
    }

    fn waypoint_class(&self) -> Result<ClassId> {
        self.lookup_class("AI_Waypoint_t")
    }
}
