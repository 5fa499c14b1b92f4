//! Chicago - Source engine save file parsing.
//!
//! This crate provides a unified interface to the chicago crates.
//!
//! # Crates
//!
//! - [`chicago_common`] - Bounded byte cursor, stream writer and tags
//! - [`chicago_datamap`] - Datamap collection loading and relocation
//! - [`chicago_save`] - Schema-driven `.sav` and state file parsing
//!
//! # Example
//!
//! ```no_run
//! use chicago::prelude::*;
//!
//! let collection = Collection::open("hl2_datamaps.bin")?;
//! let parser = SaveParser::new(&collection);
//!
//! let bytes = std::fs::read("quick.sav")?;
//! let arena = Arena::new();
//! let save = parser.parse(&bytes, &arena).into_result()?;
//! for file in &save.state_files {
//!     println!("{} ({:?})", file.name, file.kind());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use chicago_common as common;
pub use chicago_datamap as datamap;
pub use chicago_save as save;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use chicago_common::{ByteCursor, ByteWriter, Tag};
    pub use chicago_datamap::{ClassDescriptor, ClassId, Collection, FieldDescriptor, FieldKind};
    pub use chicago_save::blocks::Block;
    pub use chicago_save::state_file::{StateFile, StateFileKind};
    pub use chicago_save::{
        Arena, InstanceView, ParseOptions, ParseOutcome, RecordEndPolicy, SaveFile, SaveParser,
        Value,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
