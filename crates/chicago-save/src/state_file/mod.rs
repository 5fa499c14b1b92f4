//! State files embedded in a save.
//!
//! A save carries one state file per visited map and map-specific data kind.
//! The suffix of the stored name selects the format.

mod hl1;
mod hl2;
mod hl3;

use chicago_common::{ByteCursor, Tag};
use tracing::debug;

use crate::context::ParseContext;
use crate::{Error, Result, SymbolTable};

pub use hl1::SaveData;
pub use hl2::ClientState;
pub use hl3::EntityPatch;

/// Tag opening `.hl1` and `.hl2` state files.
pub const VALVE_TAG: Tag = Tag::new(b"VALV", 0x73);

/// Kind of a state file, as given by its name's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateFileKind {
    /// `.hl1`: map entities and server state.
    SaveData,
    /// `.hl2`: client-side decals and music.
    ClientState,
    /// `.hl3`: indices of entities to patch on load.
    EntityPatch,
}

impl StateFileKind {
    /// Kind for a stored name such as `d1_trainstation_01.hl1`.
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, suffix) = name.rsplit_once('.')?;
        match suffix.to_ascii_lowercase().as_str() {
            "hl1" => Some(Self::SaveData),
            "hl2" => Some(Self::ClientState),
            "hl3" => Some(Self::EntityPatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StateFileData<'a> {
    SaveData(SaveData<'a>),
    ClientState(ClientState<'a>),
    EntityPatch(EntityPatch),
}

impl StateFileData<'_> {
    pub fn kind(&self) -> StateFileKind {
        match self {
            Self::SaveData(_) => StateFileKind::SaveData,
            Self::ClientState(_) => StateFileKind::ClientState,
            Self::EntityPatch(_) => StateFileKind::EntityPatch,
        }
    }
}

/// One parsed state file.
#[derive(Debug, Clone)]
pub struct StateFile<'a> {
    pub name: String,
    pub data: StateFileData<'a>,
}

impl<'a> StateFile<'a> {
    pub fn kind(&self) -> StateFileKind {
        self.data.kind()
    }

    pub fn save_data(&self) -> Option<&SaveData<'a>> {
        match &self.data {
            StateFileData::SaveData(d) => Some(d),
            _ => None,
        }
    }

    pub fn client_state(&self) -> Option<&ClientState<'a>> {
        match &self.data {
            StateFileData::ClientState(d) => Some(d),
            _ => None,
        }
    }

    pub fn entity_patch(&self) -> Option<&EntityPatch> {
        match &self.data {
            StateFileData::EntityPatch(d) => Some(d),
            _ => None,
        }
    }
}

impl<'a> ParseContext<'a> {
    /// Parse the state file `name` whose bytes are the current cursor range.
    ///
    /// The active symbol table and module are restored afterwards.
    pub(crate) fn restore_state_file(&mut self, name: String) -> Result<StateFile<'a>> {
        let kind = StateFileKind::from_name(&name)
            .ok_or_else(|| Error::BadStateFileName(name.clone()))?;
        debug!(name = %name, ?kind, size = self.cursor.remaining(), "parsing state file");

        let symbols = std::mem::take(&mut self.symbols);
        let module = self.module;
        let data = match kind {
            StateFileKind::SaveData => self.restore_save_data().map(StateFileData::SaveData),
            StateFileKind::ClientState => {
                self.restore_client_state().map(StateFileData::ClientState)
            }
            StateFileKind::EntityPatch => {
                self.restore_entity_patch().map(StateFileData::EntityPatch)
            }
        };
        self.symbols = symbols;
        self.module = module;

        Ok(StateFile { name, data: data? })
    }

    /// Read a tag, failing with `bad` if it is not [`VALVE_TAG`].
    pub(crate) fn expect_tag(&mut self, bad: fn(Tag) -> Error) -> Result<()> {
        let tag = self.cursor.read_struct::<Tag>().ok_or(Error::ReaderOverflowed)?;
        if tag != VALVE_TAG {
            return Err(bad(tag));
        }
        Ok(())
    }

    /// Split the next `size` bytes off the cursor.
    pub(crate) fn take_region(&mut self, size: i32) -> Result<ByteCursor<'a>> {
        let size = usize::try_from(size).map_err(|_| Error::ReaderOverflowed)?;
        let region = self.cursor.split(size);
        self.cursor.check()?;
        Ok(region)
    }

    /// Read a `size`-byte symbol table of `count` symbols and make it active.
    pub(crate) fn read_symbol_table(&mut self, size: i32, count: i32) -> Result<()> {
        let region = self.take_region(size).map_err(|_| Error::BadSymbolTable)?;
        self.symbols = SymbolTable::read(region, count)?;
        Ok(())
    }
}
