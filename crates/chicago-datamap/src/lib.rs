//! Datamap collections for chicago.
//!
//! A datamap collection is a serialized set of class descriptors ("datamaps")
//! and their field descriptors, exported from a running game build. The save
//! parser is driven entirely by this schema.
//!
//! # Quick Start
//!
//! ```no_run
//! use chicago_datamap::Collection;
//!
//! let collection = Collection::open("hl2_datamaps.bin")?;
//!
//! let player = collection.find_class("CBasePlayer").unwrap();
//! for class in collection.base_chain(player) {
//!     let desc = collection.class(class);
//!     println!("{} ({} fields)", desc.name, desc.fields.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Layout
//!
//! The blob holds a class array, a field array, a string pool and an optional
//! linked-name array, followed by a fixed trailer. References between them are
//! region-relative offsets ([`raw::RelOff`]); [`Collection::relocate`] validates
//! every one of them and produces an owned, index-based [`Collection`].

mod builder;
mod collection;
mod error;
mod kind;
mod relocate;

pub mod raw;

pub use builder::{ClassHandle, CollectionBuilder, FieldDef};
pub use collection::{ClassDescriptor, ClassId, Collection, FieldDescriptor};
pub use error::{Error, Result};
pub use kind::FieldKind;
pub use relocate::MAX_INSTANCE_SIZE;
