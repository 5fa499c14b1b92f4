//! Top-level save parsing.

use chicago_common::{ByteCursor, Tag};
use chicago_datamap::{Collection, FieldKind};
use tracing::{debug, info};

use crate::builtin::{game_header_class, GameHeader, GAME_HEADER_TEXT};
use crate::context::ParseContext;
use crate::custom::CustomRegistry;
use crate::restored::{field_i32, Handles, RestoredArray, RestoredInstance};
use crate::state_file::StateFile;
use crate::view::InstanceView;
use crate::{Arena, Error, ParseOptions, Result, SymbolTable};

/// Tag opening every save.
pub const SAVE_TAG: Tag = Tag::new(b"JSAV", 0x73);

/// Size of the NUL-padded state file name.
const STATE_FILE_NAME_SIZE: usize = 260;

/// Result of a parse together with every diagnostic raised on the way,
/// including those raised before a fatal error.
#[derive(Debug)]
pub struct ParseOutcome<T> {
    pub result: Result<T>,
    pub diagnostics: Vec<String>,
}

impl<T> ParseOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Global entity state shared across maps.
#[derive(Debug, Clone, Copy)]
pub struct GlobalState<'a> {
    /// `CGlobalState` instance.
    pub state: RestoredInstance<'a>,
    /// `globalentity_t` instances.
    pub entities: RestoredArray<'a>,
}

/// A parsed save.
#[derive(Debug)]
pub struct SaveFile<'a> {
    pub tag: Tag,
    pub game_header: GameHeader,
    /// `None` when the schema has no `CGlobalState`.
    pub global_state: Option<GlobalState<'a>>,
    pub state_files: Vec<StateFile<'a>>,
    pub handles: Handles<'a>,
    pub collection: &'a Collection,
}

impl<'a> SaveFile<'a> {
    /// Traverse a restored instance of this save.
    pub fn view(&self, instance: &RestoredInstance<'a>) -> InstanceView<'_> {
        InstanceView::new(self.collection, &self.handles, *instance)
    }

    pub fn state_file(&self, name: &str) -> Option<&StateFile<'a>> {
        self.state_files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// A value restored by one of the lower-level entry points, with the
/// handle table its slots refer to.
#[derive(Debug)]
pub struct Restored<'a, T> {
    pub value: T,
    pub handles: Handles<'a>,
    pub collection: &'a Collection,
}

impl<'a, T> Restored<'a, T> {
    pub fn view(&self, instance: &RestoredInstance<'a>) -> InstanceView<'_> {
        InstanceView::new(self.collection, &self.handles, *instance)
    }
}

/// Parses saves against one collection.
#[derive(Debug)]
pub struct SaveParser<'c> {
    collection: &'c Collection,
    registry: CustomRegistry,
    options: ParseOptions,
}

impl<'c> SaveParser<'c> {
    pub fn new(collection: &'c Collection) -> Self {
        Self {
            collection,
            registry: CustomRegistry::new(collection),
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn registry(&self) -> &CustomRegistry {
        &self.registry
    }

    pub fn collection(&self) -> &'c Collection {
        self.collection
    }

    fn context<'a>(&'a self, bytes: &'a [u8], arena: &'a Arena) -> ParseContext<'a> {
        ParseContext::new(
            self.collection,
            &self.registry,
            &self.options,
            arena,
            ByteCursor::new(bytes),
        )
    }

    /// Parse a complete save.
    pub fn parse<'a>(&'a self, bytes: &'a [u8], arena: &'a Arena) -> ParseOutcome<SaveFile<'a>> {
        let mut ctx = self.context(bytes, arena);
        let result = ctx.restore_save();
        let ParseContext {
            handles,
            diagnostics,
            ..
        } = ctx;
        info!(
            ok = result.is_ok(),
            diagnostics = diagnostics.len(),
            arena_bytes = arena.allocated_bytes(),
            "parsed save"
        );
        ParseOutcome {
            result: result.map(|contents| SaveFile {
                tag: contents.tag,
                game_header: contents.game_header,
                global_state: contents.global_state,
                state_files: contents.state_files,
                handles,
                collection: self.collection,
            }),
            diagnostics,
        }
    }

    /// Parse one state file given its stored name.
    pub fn parse_state_file<'a>(
        &'a self,
        name: &str,
        bytes: &'a [u8],
        arena: &'a Arena,
    ) -> ParseOutcome<Restored<'a, StateFile<'a>>> {
        let mut ctx = self.context(bytes, arena);
        let result = ctx.restore_state_file(name.to_owned());
        self.finish(ctx, result)
    }

    /// Restore one instance of `class_name` (base classes first) from a raw
    /// field-group stream.
    pub fn restore_class<'a>(
        &'a self,
        class_name: &str,
        symbols: SymbolTable<'a>,
        bytes: &'a [u8],
        arena: &'a Arena,
    ) -> ParseOutcome<Restored<'a, RestoredInstance<'a>>> {
        let mut ctx = self.context(bytes, arena);
        ctx.symbols = symbols;
        let result = ctx
            .lookup_class(class_name)
            .and_then(|class| ctx.restore_instance(class));
        self.finish(ctx, result)
    }

    fn finish<'a, T>(&'a self, ctx: ParseContext<'a>, result: Result<T>) -> ParseOutcome<Restored<'a, T>> {
        let ParseContext {
            handles,
            diagnostics,
            ..
        } = ctx;
        ParseOutcome {
            result: result.map(|value| Restored {
                value,
                handles,
                collection: self.collection,
            }),
            diagnostics,
        }
    }
}

struct SaveContents<'a> {
    tag: Tag,
    game_header: GameHeader,
    global_state: Option<GlobalState<'a>>,
    state_files: Vec<StateFile<'a>>,
}

impl<'a> ParseContext<'a> {
    fn restore_save(&mut self) -> Result<SaveContents<'a>> {
        let tag = self.cursor.read_struct::<Tag>().ok_or(Error::ReaderOverflowed)?;
        if tag != SAVE_TAG {
            return Err(Error::SavBadTag(tag));
        }
        let global_size = self.cursor.read_i32();
        let symbol_count = self.cursor.read_i32();
        let symbol_size = self.cursor.read_i32();
        self.cursor.check()?;

        self.read_symbol_table(symbol_size, symbol_count)?;
        let options = self.options;
        self.module = Some(options.server_module.as_str());

        let globals = self.take_region(global_size)?;
        let after = self.replace_cursor(globals);
        let game_header = self.restore_game_header()?;
        debug!(map = %game_header.map_name, "read game header");
        let global_state = self.restore_global_state()?;
        self.cursor = after;

        let mut count = if self.cursor.remaining() >= 4 {
            self.cursor.read_i32()
        } else {
            0
        };
        if count == 0 {
            count = game_header.map_count;
        }
        let count = usize::try_from(count).map_err(|_| Error::BadStateFileCount(count))?;

        let mut state_files = Vec::new();
        for _ in 0..count {
            let name = self
                .cursor
                .read_bytes(STATE_FILE_NAME_SIZE)
                .ok_or(Error::ReaderOverflowed)?;
            let name = self.text(name, "state file name")?;
            let length = self.cursor.read_i32();
            self.cursor.check()?;
            let body = usize::try_from(length)
                .ok()
                .filter(|&n| n <= self.cursor.remaining())
                .ok_or(Error::BadStateFileLength(length))?;

            let body = self.cursor.split(body);
            let after = self.replace_cursor(body);
            let state_file = self.restore_state_file(name)?;
            self.cursor = after;

            state_files.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
            state_files.push(state_file);
        }

        Ok(SaveContents {
            tag,
            game_header,
            global_state,
            state_files,
        })
    }

    fn restore_game_header(&mut self) -> Result<GameHeader> {
        let class = game_header_class();
        let data = self.arena.alloc_zeroed(class.instance_size)?;
        self.restore_fields("GameHeader", &class, data)?;
        for (name, range) in GAME_HEADER_TEXT {
            if let Some(bytes) = data.get(range) {
                self.text(bytes, name)?;
            }
        }
        Ok(GameHeader::from_bytes(data))
    }

    fn restore_global_state(&mut self) -> Result<Option<GlobalState<'a>>> {
        let class = match self.lookup_class("CGlobalState") {
            Ok(class) => class,
            Err(Error::DatamapNotFound(name)) => {
                self.diag(format!("skipping global state: {name} not in schema"))?;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let count_field = self.require_field(class, "m_listCount", FieldKind::Integer)?;
        let state = self.restore_group("GLOBAL", class)?;
        let entities = self.restore_counted("GENT", "globalentity_t", field_i32(state.data, count_field))?;
        Ok(Some(GlobalState { state, entities }))
    }
}
