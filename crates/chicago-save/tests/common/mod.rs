//! Schemas and save streams for integration tests.

#![allow(dead_code)]

use chicago_common::{ByteCursor, ByteWriter, Tag};
use chicago_datamap::{Collection, CollectionBuilder, FieldKind};
use chicago_save::SymbolTable;

pub const OPS_THINK: u64 = 0x10;
pub const OPS_OUTPUT: u64 = 0x20;
pub const OPS_VARIANT: u64 = 0x30;
pub const OPS_ACTORS: u64 = 0x40;
pub const OPS_ACTIVITY: u64 = 0x50;
pub const OPS_UNKNOWN: u64 = 0x99;

pub fn relocate(builder: &CollectionBuilder) -> Collection {
    Collection::relocate(&builder.build()).expect("schema relocates")
}

/// A small game schema covering every class the parser looks up by name.
pub fn game_schema() -> Collection {
    let mut b = CollectionBuilder::new();
    let server = Some("server.dll");
    let client = Some("client.dll");

    let block = b.add_class("SaveRestoreBlockHeader_t", server, None, 40);
    b.add_field(block, "szName", FieldKind::Character, 0, 32);
    b.add_field(block, "locHeader", FieldKind::Integer, 32, 1);
    b.add_field(block, "locBody", FieldKind::Integer, 36, 1);

    let table = b.add_class("entitytable_t", server, None, 28);
    b.add_field(table, "id", FieldKind::Integer, 0, 1);
    b.add_field(table, "edictindex", FieldKind::Integer, 4, 1);
    b.add_field(table, "saveentityindex", FieldKind::Integer, 8, 1);
    b.add_field(table, "location", FieldKind::Integer, 12, 1);
    b.add_field(table, "size", FieldKind::Integer, 16, 1);
    b.add_field(table, "flags", FieldKind::Integer, 20, 1);
    b.add_field(table, "classname", FieldKind::String, 24, 1);

    let header = b.add_class("SAVE_HEADER", server, None, 60);
    b.add_field(header, "saveId", FieldKind::Integer, 0, 1);
    b.add_field(header, "version", FieldKind::Integer, 4, 1);
    b.add_field(header, "skillLevel", FieldKind::Integer, 8, 1);
    b.add_field(header, "connectionCount", FieldKind::Integer, 12, 1);
    b.add_field(header, "lightStyleCount", FieldKind::Integer, 16, 1);
    b.add_field(header, "mapVersion", FieldKind::Integer, 20, 1);
    b.add_field(header, "time", FieldKind::Time, 24, 1);
    b.add_field(header, "mapName", FieldKind::Character, 28, 32);

    let level = b.add_class("levellist_t", server, None, 48);
    b.add_field(level, "mapName", FieldKind::Character, 0, 32);
    b.add_field(level, "landmarkName", FieldKind::Character, 32, 16);

    let light = b.add_class("SAVELIGHTSTYLE", server, None, 8);
    b.add_field(light, "index", FieldKind::Integer, 0, 1);
    b.add_field(light, "style", FieldKind::String, 4, 1);

    let global = b.add_class("CGlobalState", server, None, 4);
    b.add_field(global, "m_listCount", FieldKind::Integer, 0, 1);

    let gent = b.add_class("globalentity_t", server, None, 12);
    b.add_field(gent, "name", FieldKind::String, 0, 1);
    b.add_field(gent, "levelName", FieldKind::String, 4, 1);
    b.add_field(gent, "state", FieldKind::Integer, 8, 1);

    let think = b.add_class("thinkfunc_t", server, None, 8);
    b.add_field(think, "m_iszContext", FieldKind::String, 0, 1);
    b.add_field(think, "m_nNextThinkTick", FieldKind::Tick, 4, 1);

    let entity = b.add_class("CBaseEntity", server, None, 32);
    b.add_field(entity, "m_iName", FieldKind::String, 0, 1);
    b.add_field(entity, "m_iHealth", FieldKind::Integer, 4, 1);
    b.add_field(entity, "m_vecOrigin", FieldKind::Vector, 8, 1);
    b.add_custom(entity, "m_aThinkFunctions", 20, 4, Some(OPS_THINK));
    b.add_custom(entity, "m_OnUser1", 24, 4, Some(OPS_OUTPUT));
    b.add_field(entity, "m_fFlags", FieldKind::Integer, 28, 1);

    let output = b.add_class("CBaseEntityOutput", server, None, 4);
    b.add_custom(output, "m_Value", 0, 4, Some(OPS_VARIANT));

    let action = b.add_class("CEventAction", server, None, 16);
    b.add_field(action, "m_iTarget", FieldKind::String, 0, 1);
    b.add_field(action, "m_iTargetInput", FieldKind::String, 4, 1);
    b.add_field(action, "m_flDelay", FieldKind::Float, 8, 1);
    b.add_field(action, "m_nTimesToFire", FieldKind::Integer, 12, 1);

    let scene = b.add_class("CSceneEntity", server, Some(entity), 36);
    b.add_custom(scene, "m_hActorList", 32, 4, Some(OPS_ACTORS));

    let npc = b.add_class("CAI_BaseNPC", server, Some(entity), 40);
    b.add_custom(npc, "m_IdealActivity", 32, 4, Some(OPS_ACTIVITY));
    b.add_field(npc, "m_NPCState", FieldKind::Integer, 36, 1);

    let citizen = b.add_class("CNPC_Citizen", server, Some(npc), 44);
    b.add_field(citizen, "m_iHead", FieldKind::Integer, 40, 1);

    let relay = b.add_class("CLogicRelay", server, Some(entity), 36);
    b.add_custom(relay, "m_OnTrigger", 32, 4, Some(OPS_OUTPUT));

    let mystery = b.add_class("CMystery", server, Some(entity), 36);
    b.add_custom(mystery, "m_Unknown", 32, 4, Some(OPS_UNKNOWN));

    let ext = b.add_class("AIExtendedSaveHeader_t", server, None, 8);
    b.add_field(ext, "version", FieldKind::Short, 0, 1);
    b.add_field(ext, "flags", FieldKind::Integer, 4, 1);

    let waypoint = b.add_class("AI_Waypoint_t", server, None, 16);
    b.add_field(waypoint, "vecLocation", FieldKind::PositionVector, 0, 1);
    b.add_field(waypoint, "flags", FieldKind::Integer, 12, 1);

    let template = b.add_class("TemplateEntityData_t", server, None, 12);
    b.add_field(template, "iszName", FieldKind::String, 0, 1);
    b.add_field(template, "iMapDataLength", FieldKind::Integer, 4, 1);
    b.add_field(template, "iszMapData", FieldKind::String, 8, 1);

    let queue = b.add_class("CEventQueue", server, None, 4);
    b.add_field(queue, "m_iListCount", FieldKind::Integer, 0, 1);

    let event = b.add_class("EventQueuePrioritizedEvent_t", server, None, 16);
    b.add_field(event, "m_flFireTime", FieldKind::Time, 0, 1);
    b.add_field(event, "m_iTarget", FieldKind::String, 4, 1);
    b.add_field(event, "m_iTargetInput", FieldKind::String, 8, 1);
    b.add_field(event, "m_iOutputID", FieldKind::Integer, 12, 1);

    let decal = b.add_class("decallist_t", client, None, 48);
    b.add_field(decal, "position", FieldKind::Vector, 0, 1);
    b.add_field(decal, "name", FieldKind::Character, 12, 32);
    b.add_field(decal, "entityIndex", FieldKind::Short, 44, 1);

    let music = b.add_class("musicsave_t", client, None, 40);
    b.add_field(music, "songname", FieldKind::Character, 0, 32);
    b.add_field(music, "sampleposition", FieldKind::Integer, 32, 1);
    b.add_field(music, "master_volume", FieldKind::Short, 36, 1);

    relocate(&b)
}

/// Interned symbol names, in table order.
#[derive(Debug, Default, Clone)]
pub struct Symbols {
    names: Vec<String>,
}

impl Symbols {
    pub fn index(&mut self, name: &str) -> i16 {
        let index = match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_owned());
                self.names.len() - 1
            }
        };
        index as i16
    }

    pub fn count(&self) -> i32 {
        self.names.len() as i32
    }

    /// The table as it appears in a stream.
    pub fn bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        for name in &self.names {
            w.write_cstr(name);
        }
        w.into_inner()
    }
}

/// Parse a symbol table out of bytes produced by [`Symbols::bytes`].
pub fn symbol_table(bytes: &[u8], count: i32) -> SymbolTable<'_> {
    SymbolTable::read(ByteCursor::new(bytes), count).expect("symbol table")
}

/// Writer for field groups and records.
#[derive(Debug, Default)]
pub struct Stream {
    pub w: ByteWriter,
    pub symbols: Symbols,
    open: Vec<usize>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue with an existing symbol table.
    pub fn with_symbols(symbols: Symbols) -> Self {
        Self {
            symbols,
            ..Self::default()
        }
    }

    pub fn position(&self) -> usize {
        self.w.position()
    }

    /// Field group header: marker, class symbol, field count.
    pub fn group(&mut self, symbol: &str, count: i32) -> &mut Self {
        let sym = self.symbols.index(symbol);
        self.w.write_i16(4).write_i16(sym).write_i32(count);
        self
    }

    /// A field record with a verbatim body.
    pub fn field(&mut self, name: &str, body: &[u8]) -> &mut Self {
        let sym = self.symbols.index(name);
        self.w
            .write_i16(body.len() as i16)
            .write_i16(sym)
            .write_bytes(body);
        self
    }

    pub fn int(&mut self, name: &str, value: i32) -> &mut Self {
        self.field(name, &value.to_le_bytes())
    }

    pub fn short(&mut self, name: &str, value: i16) -> &mut Self {
        self.field(name, &value.to_le_bytes())
    }

    pub fn float(&mut self, name: &str, value: f32) -> &mut Self {
        self.field(name, &value.to_le_bytes())
    }

    pub fn vector(&mut self, name: &str, v: [f32; 3]) -> &mut Self {
        let mut body = Vec::new();
        for c in v {
            body.extend_from_slice(&c.to_le_bytes());
        }
        self.field(name, &body)
    }

    /// A NUL-terminated string field.
    pub fn string(&mut self, name: &str, value: &str) -> &mut Self {
        let mut body = value.as_bytes().to_vec();
        body.push(0);
        self.field(name, &body)
    }

    /// A NUL-padded character array field.
    pub fn chars(&mut self, name: &str, value: &str, width: usize) -> &mut Self {
        let mut w = ByteWriter::new();
        w.write_padded(value, width);
        self.field(name, w.as_bytes())
    }

    /// Open a record whose length is patched by [`end`](Self::end).
    pub fn begin(&mut self, name: &str) -> &mut Self {
        let at = self.w.reserve_i16();
        let sym = self.symbols.index(name);
        self.w.write_i16(sym);
        self.open.push(at);
        self
    }

    pub fn end(&mut self) -> &mut Self {
        let at = self.open.pop().expect("open record");
        let len = self.w.position() - at - 4;
        self.w.patch_i16(at, len as i16);
        self
    }

    /// Take the bytes written so far, keeping the symbols.
    pub fn take(&mut self) -> Vec<u8> {
        assert!(self.open.is_empty(), "unclosed record");
        std::mem::take(&mut self.w).into_inner()
    }
}

/// A `.hl1` state file body.
pub fn hl1(symbols: &Symbols, headers: &[u8], bodies: &[u8]) -> Vec<u8> {
    let table = symbols.bytes();
    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"VALV", 0x73))
        .write_i32(table.len() as i32)
        .write_i32(symbols.count())
        .write_i32(headers.len() as i32)
        .write_i32(bodies.len() as i32)
        .write_bytes(&table)
        .write_bytes(headers)
        .write_bytes(bodies);
    w.into_inner()
}

/// Sections of a `.hl2` state file.
#[derive(Debug, Default)]
pub struct Hl2<'b> {
    pub headers: &'b [u8],
    pub bodies: &'b [u8],
    pub decals: &'b [u8],
    pub decal_count: i32,
    pub music: &'b [u8],
    pub music_count: i32,
}

/// A `.hl2` state file body with the section header.
pub fn hl2(symbols: &Symbols, parts: &Hl2<'_>) -> Vec<u8> {
    let table = symbols.bytes();
    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"VALV", 0x73))
        .write_u32(0x5454_1234)
        .write_i32(2)
        .write_i32(parts.bodies.len() as i32)
        .write_i32(parts.headers.len() as i32)
        .write_i32(parts.decals.len() as i32)
        .write_i32(parts.music.len() as i32)
        .write_i32(table.len() as i32)
        .write_i32(parts.decal_count)
        .write_i32(parts.music_count)
        .write_i32(symbols.count())
        .write_bytes(&table)
        .write_bytes(parts.headers)
        .write_bytes(parts.bodies)
        .write_bytes(parts.decals)
        .write_bytes(parts.music);
    w.into_inner()
}

/// A headers region: `prefix`, the block count, one table entry per
/// `(name, header, loc_body)` and then every header.
///
/// Header locations are relative to the start of the returned buffer.
pub fn block_set(stream: &mut Stream, blocks: &[(&str, Vec<u8>, i32)], prefix: &[u8]) -> Vec<u8> {
    // Table size is fixed per entry, so header offsets are known up front.
    let mut table = Stream::with_symbols(std::mem::take(&mut stream.symbols));
    table.w.write_i32(blocks.len() as i32);
    let table_start = table.position();
    for (name, _, _) in blocks {
        write_block_entry(&mut table, name, 0, 0);
    }
    let table_len = table.position() - table_start;
    let mut table = Stream::with_symbols(table.symbols);

    table.w.write_bytes(prefix).write_i32(blocks.len() as i32);
    let mut loc_header = prefix.len() + 4 + table_len;
    for (name, header, loc_body) in blocks {
        write_block_entry(&mut table, name, loc_header as i32, *loc_body);
        loc_header += header.len();
    }
    for (_, header, _) in blocks {
        table.w.write_bytes(header);
    }
    let bytes = table.take();
    stream.symbols = table.symbols;
    bytes
}

fn write_block_entry(stream: &mut Stream, name: &str, loc_header: i32, loc_body: i32) {
    stream
        .group("SaveRestoreBlockHeader_t", 3)
        .chars("szName", name, 32)
        .int("locHeader", loc_header)
        .int("locBody", loc_body);
}
