//! State files and complete saves.

mod common;

use chicago_common::{ByteWriter, Tag};
use chicago_datamap::{CollectionBuilder, FieldKind};
use chicago_save::blocks::Block;
use chicago_save::state_file::StateFileKind;
use chicago_save::{Arena, Error, SaveParser, Value};
use common::{block_set, game_schema, hl1, hl2, relocate, Hl2, Stream};

/// A `.hl1` file with an NPC, an empty table slot, an entity of an unknown
/// class and a logic relay, plus templates, an event queue and a block
/// without a handler.
fn sample_hl1(templates_version: i16) -> Vec<u8> {
    let mut s = Stream::new();

    let npc_loc = s.position();
    s.group("AIExtendedSaveHeader_t", 1).short("version", 5);
    s.begin("Conditions");
    let lists: [&[&str]; 4] = [
        &["COND_SEE_PLAYER"],
        &[],
        &[],
        &["COND_HEAR_DANGER", "COND_LIGHT_DAMAGE"],
    ];
    for list in lists {
        for condition in list {
            s.w.write_cstr(condition);
        }
        s.w.write_u8(0);
    }
    s.end();
    s.begin("Navigator");
    s.w.write_i16(1).write_i32(1);
    s.group("uv", 1).begin("elems");
    s.group("AI_Waypoint_t", 1)
        .vector("vecLocation", [16.0, 32.0, 0.0]);
    s.end();
    s.end();
    s.group("CBaseEntity", 2)
        .string("m_iName", "alyx")
        .int("m_iHealth", 80);
    s.group("CAI_BaseNPC", 1).int("m_NPCState", 3);
    s.group("CNPC_Citizen", 1).int("m_iHead", 2);
    let npc_size = s.position() - npc_loc;

    let unknown_loc = s.position();
    s.w.write_i32(0);

    let relay_loc = s.position();
    s.group("CBaseEntity", 1)
        .string("m_iName", "relay1")
        .group("CLogicRelay", 0);
    let relay_size = s.position() - relay_loc;

    let templates_loc = s.position();
    s.w.write_i32(7).write_i16(1);
    s.group("TemplateEntityData_t", 2)
        .string("iszName", "tmpl")
        .int("iMapDataLength", 3);
    s.w.write_cstr("tmpl").write_cstr("{ }");

    let queue_loc = s.position();
    s.group("EventQueue", 1).int("m_iListCount", 1);
    s.group("PEvent", 3)
        .float("m_flFireTime", 1.5)
        .string("m_iTarget", "door")
        .string("m_iTargetInput", "Open");
    let bodies = s.take();

    s.group("Save Header", 3)
        .int("connectionCount", 1)
        .int("lightStyleCount", 1)
        .chars("mapName", "d1_trainstation_01", 32);
    s.group("ADJACENCY", 2)
        .chars("mapName", "d1_trainstation_02", 32)
        .chars("landmarkName", "station", 16);
    s.group("LIGHTSTYLE", 2).int("index", 0).string("style", "mmnmmo");
    let prefix = s.take();

    s.w.write_i32(4);
    s.group("ETABLE", 4)
        .int("id", 0)
        .int("location", npc_loc as i32)
        .int("size", npc_size as i32)
        .string("classname", "CNPC_Citizen");
    s.group("ETABLE", 0);
    s.group("ETABLE", 3)
        .int("location", unknown_loc as i32)
        .int("size", 4)
        .string("classname", "CUnknownEntity");
    s.group("ETABLE", 3)
        .int("location", relay_loc as i32)
        .int("size", relay_size as i32)
        .string("classname", "CLogicRelay");
    let entities = s.take();
    s.w.write_i16(templates_version);
    let templates = s.take();
    s.w.write_i16(1);
    let queue = s.take();

    let headers = block_set(
        &mut s,
        &[
            ("Entities", entities, 0),
            ("Templates", templates, templates_loc as i32),
            ("EventQueue", queue, queue_loc as i32),
            ("AI", Vec::new(), 0),
        ],
        &prefix,
    );
    hl1(&s.symbols, &headers, &bodies)
}

/// A `.hl2` file with an event queue of an unsupported version, one decal
/// and one music entry.
fn sample_hl2() -> Vec<u8> {
    let mut s = Stream::new();
    s.w.write_i16(2);
    let queue = s.take();
    let headers = block_set(&mut s, &[("EventQueue", queue, 0)], &[]);
    s.group("DECALLIST", 3)
        .vector("position", [1.0, 2.0, 3.0])
        .chars("name", "{scorch", 32)
        .short("entityIndex", 4);
    let decals = s.take();
    s.group("MUSICLIST", 2)
        .chars("songname", "song1", 32)
        .int("sampleposition", 100);
    let music = s.take();
    hl2(
        &s.symbols,
        &Hl2 {
            headers: &headers,
            decals: &decals,
            decal_count: 1,
            music: &music,
            music_count: 1,
            ..Hl2::default()
        },
    )
}

fn sample_hl3() -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_i32(2).write_i32(5).write_i32(9);
    w.into_inner()
}

fn sample_save(state_count: Option<i32>, map_count: i32, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut s = Stream::new();
    s.group("GameHeader", 3)
        .chars("mapName", "d1_trainstation_01", 32)
        .chars("comment", "Point Insertion", 80)
        .int("mapCount", map_count);
    s.group("GLOBAL", 1).int("m_listCount", 1);
    s.group("GENT", 3)
        .string("name", "gordon_precriminal")
        .string("levelName", "d1_trainstation_01")
        .int("state", 1);
    let globals = s.take();
    let table = s.symbols.bytes();

    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"JSAV", 0x73))
        .write_i32(globals.len() as i32)
        .write_i32(s.symbols.count())
        .write_i32(table.len() as i32)
        .write_bytes(&table)
        .write_bytes(&globals);
    if let Some(count) = state_count {
        w.write_i32(count);
    }
    for (name, body) in files {
        w.write_padded(name, 260)
            .write_i32(body.len() as i32)
            .write_bytes(body);
    }
    w.into_inner()
}

#[test]
fn test_save_data() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let bytes = sample_hl1(1);
    let arena = Arena::new();
    let outcome = parser.parse_state_file("d1_trainstation_01.hl1", &bytes, &arena);
    assert_eq!(outcome.diagnostics.len(), 2, "{:?}", outcome.diagnostics);
    let restored = outcome.result.unwrap();
    assert_eq!(restored.value.kind(), StateFileKind::SaveData);
    let data = restored.value.save_data().unwrap();

    let header = restored.view(&data.header);
    assert_eq!(header.get_str("mapName"), Some("d1_trainstation_01"));
    assert_eq!(header.get_i32("connectionCount"), Some(1));
    let adjacency = restored.view(&data.adjacency.get(0).unwrap());
    assert_eq!(adjacency.get_str("landmarkName"), Some("station"));
    let light = restored.view(&data.light_styles.get(0).unwrap());
    assert_eq!(light.get_str("style"), Some("mmnmmo"));

    let names: Vec<&str> = data.blocks.blocks.iter().map(Block::name).collect();
    assert_eq!(names, ["Entities", "Templates", "EventQueue", "AI"]);
    assert!(matches!(data.blocks.blocks[3], Block::Unhandled { .. }));

    let entities = data.blocks.entities().unwrap();
    assert_eq!(entities.entities.len(), 4);
    let table = |i: usize| restored.view(&entities.table.get(i).unwrap());
    assert_eq!(table(0).get_i32("id"), Some(0));
    assert_eq!(table(1).get_i32("id"), Some(-1));
    assert_eq!(table(1).get_i32("edictindex"), Some(-1));
    assert!(entities.entities[1].is_none());
    assert!(entities.entities[2].is_none());

    let citizen = entities.entities[0].as_ref().unwrap();
    assert_eq!(citizen.classname, "CNPC_Citizen");
    let view = restored.view(&citizen.instance);
    assert_eq!(view.get_str("m_iName"), Some("alyx"));
    assert_eq!(view.get_i32("m_iHealth"), Some(80));
    assert_eq!(view.get_i32("m_NPCState"), Some(3));
    assert_eq!(view.get_i32("m_iHead"), Some(2));

    let npc = citizen.npc.as_ref().unwrap();
    assert_eq!(npc.version, 5);
    let conditions = npc.conditions.as_ref().unwrap();
    assert_eq!(conditions.conditions, [&b"COND_SEE_PLAYER"[..]]);
    assert!(conditions.custom_interrupts.is_empty());
    assert!(conditions.pre_ignore.is_empty());
    assert_eq!(
        conditions.ignore,
        [&b"COND_HEAR_DANGER"[..], &b"COND_LIGHT_DAMAGE"[..]]
    );
    let navigator = npc.navigator.unwrap();
    assert_eq!(navigator.version, 1);
    let path = navigator.path.unwrap().as_array().unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(
        restored.view(&path.get(0).unwrap()).get("vecLocation"),
        Some(Value::Vector([16.0, 32.0, 0.0]))
    );

    let relay = entities.entities[3].as_ref().unwrap();
    assert!(relay.npc.is_none());
    assert_eq!(restored.view(&relay.instance).get_str("m_iName"), Some("relay1"));
    assert_eq!(entities.restored().count(), 2);

    let templates = data.blocks.templates().unwrap();
    assert_eq!(templates.template_instance, 7);
    assert_eq!(templates.templates.len(), 1);
    let template = &templates.templates[0];
    assert_eq!(template.name, Some(&b"tmpl"[..]));
    assert_eq!(template.map_data, Some(&b"{ }"[..]));
    assert_eq!(restored.view(&template.data).get_i32("iMapDataLength"), Some(3));

    let queue = data.blocks.event_queue().unwrap();
    assert_eq!(restored.view(&queue.queue).get_i32("m_iListCount"), Some(1));
    let event = restored.view(&queue.events.get(0).unwrap());
    assert_eq!(event.get_f32("m_flFireTime"), Some(1.5));
    assert_eq!(event.get_str("m_iTarget"), Some("door"));
}

#[test]
fn test_unsupported_block_version_is_skipped() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let bytes = sample_hl1(2);
    let arena = Arena::new();
    let outcome = parser.parse_state_file("d1_trainstation_01.hl1", &bytes, &arena);
    assert_eq!(outcome.diagnostics.len(), 4, "{:?}", outcome.diagnostics);
    let restored = outcome.result.unwrap();
    let blocks = &restored.value.save_data().unwrap().blocks;
    assert!(matches!(
        &blocks.blocks[1],
        Block::Skipped { name, .. } if name == "Templates"
    ));
    assert!(blocks.templates().is_none());
    assert!(blocks.entities().is_some());
    assert!(blocks.event_queue().is_some());
}

#[test]
fn test_client_state() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let bytes = sample_hl2();
    let arena = Arena::new();
    let outcome = parser.parse_state_file("d1_trainstation_01.hl2", &bytes, &arena);
    assert_eq!(outcome.diagnostics.len(), 2, "{:?}", outcome.diagnostics);
    let restored = outcome.result.unwrap();
    let state = restored.value.client_state().unwrap();

    assert!(matches!(
        &state.blocks.blocks[0],
        Block::Skipped { name, .. } if name == "EventQueue"
    ));
    let decal = restored.view(&state.decals.unwrap().get(0).unwrap());
    assert_eq!(decal.get_str("name"), Some("{scorch"));
    assert_eq!(decal.get_i32("entityIndex"), Some(4));
    let music = restored.view(&state.music.unwrap().get(0).unwrap());
    assert_eq!(music.get_str("songname"), Some("song1"));
    assert_eq!(music.get_i32("sampleposition"), Some(100));
}

#[test]
fn test_legacy_client_state() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);

    let mut s = Stream::new();
    s.w.write_i32(0);
    let headers = s.take();
    s.group("DECALLIST", 1).short("entityIndex", 8);
    let decals = s.take();
    let table = s.symbols.bytes();

    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"VALV", 0x73))
        .write_i32(0)
        .write_i32(headers.len() as i32)
        .write_i32(decals.len() as i32)
        .write_i32(table.len() as i32)
        .write_i32(1)
        .write_i32(s.symbols.count())
        .write_bytes(&table)
        .write_bytes(&headers)
        .write_bytes(&decals);
    let bytes = w.into_inner();

    let arena = Arena::new();
    let outcome = parser.parse_state_file("c.hl2", &bytes, &arena);
    let restored = outcome.result.unwrap();
    let state = restored.value.client_state().unwrap();
    assert!(state.blocks.blocks.is_empty());
    assert!(state.music.is_none());
    let decal = restored.view(&state.decals.unwrap().get(0).unwrap());
    assert_eq!(decal.get_i32("entityIndex"), Some(8));
}

#[test]
fn test_bad_section_header() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"VALV", 0x73))
        .write_u32(0x5454_1234)
        .write_i32(3);
    let bytes = w.into_inner();
    let arena = Arena::new();
    let outcome = parser.parse_state_file("c.hl2", &bytes, &arena);
    assert!(matches!(outcome.result, Err(Error::Hl2BadSectionHeader)));
}

#[test]
fn test_state_file_tags() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"VALX", 0x73)).write_i32(0);
    let bytes = w.into_inner();

    let arena = Arena::new();
    let outcome = parser.parse_state_file("a.hl1", &bytes, &arena);
    assert!(matches!(outcome.result, Err(Error::Hl1BadTag(tag)) if &tag.id == b"VALX"));
    let outcome = parser.parse_state_file("a.hl2", &bytes, &arena);
    assert!(matches!(outcome.result, Err(Error::Hl2BadTag(_))));
    let outcome = parser.parse_state_file("a.hl9", &bytes, &arena);
    assert!(matches!(outcome.result, Err(Error::BadStateFileName(_))));
}

#[test]
fn test_entity_patch() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let bytes = sample_hl3();
    let arena = Arena::new();
    let restored = parser
        .parse_state_file("d1_trainstation_01.hl3", &bytes, &arena)
        .result
        .unwrap();
    assert_eq!(restored.value.entity_patch().unwrap().entities, [5, 9]);

    let mut w = ByteWriter::new();
    w.write_i32(3).write_i32(1);
    let bytes = w.into_inner();
    let outcome = parser.parse_state_file("d1_trainstation_01.hl3", &bytes, &arena);
    assert!(matches!(outcome.result, Err(Error::ReaderOverflowed)));
}

#[test]
fn test_parse_save() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let bytes = sample_save(
        Some(3),
        3,
        &[
            ("d1_trainstation_01.hl1", sample_hl1(1)),
            ("d1_trainstation_01.hl2", sample_hl2()),
            ("d1_trainstation_01.hl3", sample_hl3()),
        ],
    );
    let arena = Arena::new();
    let outcome = parser.parse(&bytes, &arena);
    assert_eq!(outcome.diagnostics.len(), 4, "{:?}", outcome.diagnostics);
    let save = outcome.result.unwrap();

    assert_eq!(save.tag, Tag::new(b"JSAV", 0x73));
    assert_eq!(save.game_header.map_name, "d1_trainstation_01");
    assert_eq!(save.game_header.comment, "Point Insertion");
    assert_eq!(save.game_header.map_count, 3);

    let global = save.global_state.unwrap();
    assert_eq!(save.view(&global.state).get_i32("m_listCount"), Some(1));
    let gent = save.view(&global.entities.get(0).unwrap());
    assert_eq!(gent.get_str("name"), Some("gordon_precriminal"));
    assert_eq!(gent.get_i32("state"), Some(1));

    let kinds: Vec<StateFileKind> = save.state_files.iter().map(|f| f.kind()).collect();
    assert_eq!(
        kinds,
        [
            StateFileKind::SaveData,
            StateFileKind::ClientState,
            StateFileKind::EntityPatch
        ]
    );
    let data = save
        .state_file("D1_TRAINSTATION_01.HL1")
        .and_then(|f| f.save_data())
        .unwrap();
    let citizen = data.blocks.entities().unwrap().restored().next().unwrap();
    assert_eq!(save.view(&citizen.instance).get_str("m_iName"), Some("alyx"));
}

#[test]
fn test_state_file_count_falls_back_to_map_count() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let bytes = sample_save(Some(0), 1, &[("d1_trainstation_01.hl3", sample_hl3())]);
    let arena = Arena::new();
    let save = parser.parse(&bytes, &arena).result.unwrap();
    assert_eq!(save.state_files.len(), 1);
    assert_eq!(save.state_files[0].name, "d1_trainstation_01.hl3");

    let bytes = sample_save(None, 0, &[]);
    let arena = Arena::new();
    let save = parser.parse(&bytes, &arena).result.unwrap();
    assert!(save.state_files.is_empty());
}

#[test]
fn test_non_utf8_names_are_reported() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let mut bytes = sample_save(Some(1), 1, &[("d1_trainstation_01.hl3", sample_hl3())]);
    let at = |bytes: &[u8], needle: &[u8]| {
        bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap()
    };
    let comment = at(&bytes, b"Point");
    bytes[comment + 1] = 0xE9;
    let suffix = at(&bytes, b".hl3");
    bytes[suffix - 1] = 0xE9;

    let arena = Arena::new();
    let outcome = parser.parse(&bytes, &arena);
    let reported = |what: &str| outcome.diagnostics.iter().any(|d| d.starts_with(what));
    assert!(reported("comment"), "{:?}", outcome.diagnostics);
    assert!(reported("state file name"), "{:?}", outcome.diagnostics);

    let save = outcome.result.unwrap();
    assert_eq!(save.game_header.comment, "P\u{FFFD}int Insertion");
    assert_eq!(save.state_files[0].name, "d1_trainstation_0\u{FFFD}.hl3");
    assert_eq!(save.state_files[0].kind(), StateFileKind::EntityPatch);
}

#[test]
fn test_save_errors() {
    let collection = game_schema();
    let parser = SaveParser::new(&collection);
    let arena = Arena::new();

    let mut bytes = sample_save(Some(0), 0, &[]);
    bytes[3] = b'X';
    assert!(matches!(parser.parse(&bytes, &arena).result, Err(Error::SavBadTag(_))));

    let bytes = sample_save(Some(-2), 0, &[]);
    assert!(matches!(
        parser.parse(&bytes, &arena).result,
        Err(Error::BadStateFileCount(-2))
    ));

    let bytes = sample_save(Some(1), 1, &[("notes.txt", sample_hl3())]);
    assert!(matches!(
        parser.parse(&bytes, &arena).result,
        Err(Error::BadStateFileName(ref name)) if name == "notes.txt"
    ));

    let mut bytes = sample_save(Some(1), 1, &[]);
    let mut w = ByteWriter::new();
    w.write_padded("d1_trainstation_01.hl3", 260).write_i32(-1);
    bytes.extend_from_slice(w.as_bytes());
    assert!(matches!(
        parser.parse(&bytes, &arena).result,
        Err(Error::BadStateFileLength(-1))
    ));

    let mut bytes = sample_save(Some(1), 1, &[]);
    let mut w = ByteWriter::new();
    w.write_padded("d1_trainstation_01.hl3", 260).write_i32(64);
    bytes.extend_from_slice(w.as_bytes());
    assert!(matches!(
        parser.parse(&bytes, &arena).result,
        Err(Error::BadStateFileLength(64))
    ));
}

#[test]
fn test_schema_without_global_state() {
    let mut b = CollectionBuilder::new();
    let foo = b.add_class("Foo", None, None, 4);
    b.add_field(foo, "value", FieldKind::Integer, 0, 1);
    let collection = relocate(&b);
    let parser = SaveParser::new(&collection);

    let mut s = Stream::new();
    s.group("GameHeader", 1).chars("mapName", "background01", 32);
    s.group("GLOBAL", 0);
    let globals = s.take();
    let table = s.symbols.bytes();
    let mut w = ByteWriter::new();
    w.write_struct(&Tag::new(b"JSAV", 0x73))
        .write_i32(globals.len() as i32)
        .write_i32(s.symbols.count())
        .write_i32(table.len() as i32)
        .write_bytes(&table)
        .write_bytes(&globals);
    let bytes = w.into_inner();

    let arena = Arena::new();
    let outcome = parser.parse(&bytes, &arena);
    assert_eq!(outcome.diagnostics.len(), 1, "{:?}", outcome.diagnostics);
    let save = outcome.result.unwrap();
    assert!(save.global_state.is_none());
    assert_eq!(save.game_header.map_name, "background01");
    assert!(save.state_files.is_empty());
}
