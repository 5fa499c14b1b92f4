//! Schema-driven parser for Source engine save files.
//!
//! A save (`.sav`) is a stream of field groups: for each class, a record
//! holding the number of saved fields followed by one record per field,
//! every record tagged with a name from a symbol table. Nothing in the
//! stream describes the layout of the fields themselves, so parsing needs
//! the game's datamaps, loaded as a [`Collection`](chicago_datamap::Collection).
//!
//! # Quick Start
//!
//! ```no_run
//! use chicago_datamap::Collection;
//! use chicago_save::{Arena, SaveParser};
//!
//! let collection = Collection::open("hl2_datamaps.bin")?;
//! let parser = SaveParser::new(&collection);
//!
//! let bytes = std::fs::read("quick.sav")?;
//! let arena = Arena::new();
//! let outcome = parser.parse(&bytes, &arena);
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("warning: {diagnostic}");
//! }
//!
//! let save = outcome.result?;
//! println!("map: {}", save.game_header.map_name);
//! for file in &save.state_files {
//!     let Some(entities) = file.save_data().and_then(|d| d.blocks.entities()) else {
//!         continue;
//!     };
//!     for entity in entities.restored() {
//!         let view = save.view(&entity.instance);
//!         println!("{} {:?}", entity.classname, view.get_str("m_iName"));
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Restored data
//!
//! Every instance is restored into a zeroed buffer laid out like the class
//! (see [`RestoredInstance`]). Fields missing from the stream keep their
//! zero value. String and custom fields hold handles into [`Handles`];
//! [`InstanceView`] decodes all of it into [`Value`]s.

mod arena;
mod builtin;
mod context;
mod error;
mod options;
mod record;
mod restore;
mod restored;
mod save;
mod symbols;
mod view;

pub mod blocks;
pub mod custom;
pub mod state_file;

pub use arena::Arena;
pub use builtin::{game_header_class, GameHeader, GAME_HEADER_SIZE};
pub use error::{Error, Result};
pub use options::{ParseOptions, RecordEndPolicy};
pub use record::Record;
pub use restored::{Handles, RestoredArray, RestoredInstance};
pub use save::{GlobalState, ParseOutcome, Restored, SaveFile, SaveParser, SAVE_TAG};
pub use symbols::SymbolTable;
pub use view::{InstanceView, Value};
