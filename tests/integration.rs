//! Integration tests: layout compilation, fixed views in both representations,
//! legacy padding, enums and constants, bit-level serialized fields, errors.

use bitlayout::access;
use bitlayout::dump::{format_elements, format_layout};
use std::sync::{Arc, Mutex};

use bitlayout::{
    build_layout, transform, CodecError, CodecFactory, DataDefinition, DdlVersion, ElementAccess, ElementAccessMut,
    Element, EnumType, Representation, StructType, Value,
};

fn header_definition() -> DataDefinition {
    DataDefinition::new(DdlVersion::V4_1).structure(
        StructType::new("Header")
            .aligned(4)
            .element(Element::new("id", "tUInt8"))
            .element(Element::new("value", "tUInt32").aligned(4))
            .element(Element::new("flag", "tBool")),
    )
}

fn shape_definition() -> DataDefinition {
    DataDefinition::new(DdlVersion::V4_1)
        .structure(
            StructType::new("Point")
                .element(Element::new("x", "tInt16"))
                .element(Element::new("y", "tInt16")),
        )
        .structure(
            StructType::new("Shape")
                .element(Element::new("kind", "tUInt8"))
                .element(Element::new("points", "Point").array(3))
                .element(Element::new("tag", "tUInt8")),
        )
}

fn triple_definition(version: DdlVersion) -> DataDefinition {
    DataDefinition::new(version)
        .structure(
            StructType::new("Triple")
                .aligned(4)
                .element(Element::new("a", "tUInt8"))
                .element(Element::new("b", "tUInt8"))
                .element(Element::new("c", "tUInt8")),
        )
        .structure(StructType::new("Outer").element(Element::new("items", "Triple").array(2)))
        .structure(
            StructType::new("Wrap")
                .element(Element::new("t", "Triple"))
                .element(Element::new("x", "tUInt8")),
        )
}

fn message_definition() -> DataDefinition {
    DataDefinition::new(DdlVersion::V4_1)
        .enumeration(
            EnumType::new("Kind", "tUInt8")
                .entry("NONE", 0)
                .entry("PING", 1)
                .entry("PONG", 2)
                .entry("ALIAS_PING", 1),
        )
        .structure(
            StructType::new("Msg")
                .element(Element::new("kind", "Kind").constant("PING"))
                .element(Element::new("code", "tUInt16").constant("PONG")),
        )
}

#[test]
fn test_static_layout_sizes_and_names() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let layout = factory.layout();
    assert_eq!(layout.name(), "Header");
    assert!(!layout.has_dynamic_elements());
    assert!(!layout.has_enums());
    assert_eq!(factory.static_element_count(), 3);
    assert_eq!(factory.static_buffer_size(Representation::Deserialized), 12);
    assert_eq!(factory.static_buffer_size(Representation::Serialized), 6);

    let names: Vec<&str> = layout.fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["id", "value", "flag"]);

    let value = factory.static_element(1).expect("element");
    assert_eq!(value.deserialized.bit_offset, 32);
    assert_eq!(value.deserialized.bit_size, 32);
    assert_eq!(value.serialized.bit_offset, 8);
    assert_eq!(value.serialized.bit_size, 32);
    assert_eq!(
        factory.static_element(3).unwrap_err(),
        CodecError::InvalidIndex { index: 3, count: 3 }
    );
}

#[test]
fn test_deserialized_roundtrip_is_native_copy() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let mut buffer = [0u8; 12];
    {
        let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Deserialized);
        codec.is_valid().expect("valid");
        codec.set_element_value(0, &Value::U8(7)).expect("set id");
        codec.set_element_value(1, &Value::U32(0x1122_3344)).expect("set value");
        codec.set_element_value(2, &Value::Bool(true)).expect("set flag");
    }
    assert_eq!(buffer[0], 7);
    assert_eq!(&buffer[4..8], &0x1122_3344u32.to_ne_bytes());
    assert_eq!(buffer[8], 1);

    let decoder = factory.make_static_decoder_for(&buffer, Representation::Deserialized);
    assert_eq!(decoder.get_element_value(0).expect("id"), Value::U8(7));
    assert_eq!(decoder.get_element_value(1).expect("value"), Value::U32(0x1122_3344));
    assert_eq!(decoder.get_element_value(2).expect("flag"), Value::Bool(true));
}

#[test]
fn test_serialized_roundtrip_is_packed_little_endian() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let mut buffer = [0u8; 6];
    {
        let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
        access::set_value(&mut codec, "id", &Value::U8(9)).expect("set id");
        access::set_value(&mut codec, "value", &Value::U64(0x1122_3344)).expect("set value");
        access::set_value(&mut codec, "flag", &Value::Bool(true)).expect("set flag");
    }
    assert_eq!(buffer, [9, 0x44, 0x33, 0x22, 0x11, 1]);

    let decoder = factory.make_static_decoder_for(&buffer, Representation::Serialized);
    assert_eq!(access::get_value(&decoder, "value").expect("value"), Value::U32(0x1122_3344));
}

#[test]
fn test_raw_access_requires_native_size() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let mut buffer = [0u8; 6];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_element_raw(1, &0x0102_0304u32.to_ne_bytes()).expect("set raw");

    let mut out = [0u8; 4];
    codec.get_element_raw(1, &mut out).expect("get raw");
    assert_eq!(u32::from_ne_bytes(out), 0x0102_0304);

    let mut short = [0u8; 2];
    assert!(matches!(codec.get_element_raw(1, &mut short), Err(CodecError::InvalidArgument(_))));
    assert!(matches!(codec.set_element_raw(1, &[1, 2, 3]), Err(CodecError::InvalidArgument(_))));
}

#[test]
fn test_transform_serialized_to_deserialized() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let wire = [3u8, 0x78, 0x56, 0x34, 0x12, 1];
    let decoder = factory.make_static_decoder_for(&wire, Representation::Serialized);
    let native = transform(&decoder, Representation::Deserialized).expect("transform");
    assert_eq!(native.len(), 12);

    let back = factory.make_static_decoder_for(&native, Representation::Deserialized);
    for index in 0..back.element_count() {
        assert_eq!(
            back.get_element_value(index).expect("native"),
            decoder.get_element_value(index).expect("wire")
        );
    }
    assert_eq!(transform(&back, Representation::Serialized).expect("back"), wire.to_vec());
}

#[test]
fn test_transform_to_short_buffer_fails() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let wire = [0u8; 6];
    let decoder = factory.make_static_decoder_for(&wire, Representation::Serialized);
    let mut target = [0u8; 11];
    let result = bitlayout::transform_to_buffer(&decoder, &mut target, Representation::Deserialized, true);
    assert!(matches!(result, Err(CodecError::InvalidArgument(_))));
}

#[test]
fn test_nested_struct_array_paths() {
    let factory = CodecFactory::new(&shape_definition(), "Shape").expect("compile");
    let names: Vec<&str> = factory.layout().fields().iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        [
            "kind",
            "points[0].x",
            "points[0].y",
            "points[1].x",
            "points[1].y",
            "points[2].x",
            "points[2].y",
            "tag"
        ]
    );
    assert_eq!(factory.static_buffer_size(Representation::Serialized), 14);

    let mut buffer = [0u8; 14];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    access::set_value(&mut codec, "points[1].y", &Value::I16(-5)).expect("set");
    assert_eq!(access::get_value(&codec, "points[1].y").expect("get"), Value::I16(-5));

    assert_eq!(access::find_index(&codec, "tag").expect("tag"), 7);
    assert_eq!(access::find_array_prefix(&codec, "points").expect("array"), 1);
    assert_eq!(access::find_array_end(&codec, "points", 1), Some(7));
    assert_eq!(access::find_struct_prefix(&codec, "points[1]").expect("struct"), 3);
    assert_eq!(access::array_byte_size(&codec, "points").expect("size"), 12);
    assert_eq!(access::array_address(&codec, "points").expect("array").len(), 12);
    assert_eq!(access::struct_address(&codec, "points[1]").expect("struct").len(), 9);
    assert!(matches!(access::find_index(&codec, "points"), Err(CodecError::NotFound(_))));
}

#[test]
fn test_legacy_array_padding() {
    let legacy = CodecFactory::new(&triple_definition(DdlVersion::V2_0), "Outer").expect("compile");
    let current = CodecFactory::new(&triple_definition(DdlVersion::V3_0), "Outer").expect("compile");
    assert_eq!(legacy.static_buffer_size(Representation::Deserialized), 7);
    assert_eq!(current.static_buffer_size(Representation::Deserialized), 8);
    assert_eq!(legacy.static_buffer_size(Representation::Serialized), 6);
    assert_eq!(current.static_buffer_size(Representation::Serialized), 6);

    // second item starts after the padded first one in both versions
    let first_of_second = |f: &CodecFactory| f.static_element(3).expect("items[1].a").deserialized.bit_offset;
    assert_eq!(first_of_second(&legacy), 32);
    assert_eq!(first_of_second(&current), 32);
}

#[test]
fn test_legacy_rule_applies_to_single_struct_elements() {
    let legacy = CodecFactory::new(&triple_definition(DdlVersion::V2_0), "Wrap").expect("compile");
    let current = CodecFactory::new(&triple_definition(DdlVersion::V4_1), "Wrap").expect("compile");
    let x = |f: &CodecFactory| f.static_element(3).expect("x").deserialized.bit_offset;
    assert_eq!(x(&legacy), 24);
    assert_eq!(x(&current), 32);
    assert_eq!(legacy.static_buffer_size(Representation::Deserialized), 4);
    assert_eq!(current.static_buffer_size(Representation::Deserialized), 5);
}

#[test]
fn test_enum_constants_and_names() {
    let factory = CodecFactory::new(&message_definition(), "Msg").expect("compile");
    assert!(factory.layout().has_enums());
    assert!(factory.layout().enums().contains_key("Kind"));

    let mut buffer = [0xffu8; 3];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_constants().expect("constants");
    assert_eq!(access::get_value(&codec, "kind").expect("kind"), Value::U8(1));
    assert_eq!(access::get_value(&codec, "code").expect("code"), Value::U16(2));
    assert_eq!(access::get_value_as_string(&codec, "kind").expect("kind"), "PING");
    assert_eq!(access::get_value_as_string(&codec, "code").expect("code"), "2");

    access::set_value(&mut codec, "kind", &Value::U8(5)).expect("set");
    assert_eq!(access::get_value_as_string(&codec, "kind").expect("kind"), "5");
}

#[test]
fn test_constant_from_enum_used_by_no_element() {
    let definition = DataDefinition::new(DdlVersion::V4_1)
        .enumeration(EnumType::new("Version", "tUInt8").entry("CURRENT", 3))
        .structure(StructType::new("Frame").element(Element::new("version", "tUInt8").constant("CURRENT")));
    let layout = build_layout(&definition, "Frame").expect("compile");
    assert_eq!(layout.fields()[0].constant, Some(Value::U8(3)));
    // no enum table recorded, so constants are not written
    assert!(!layout.has_enums());
}

#[test]
fn test_set_constants_without_enums_is_noop() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let mut buffer = [0xaau8; 6];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_constants().expect("constants");
    assert_eq!(buffer, [0xaa; 6]);
}

#[test]
fn test_serialized_bit_fields_and_byte_order() {
    let definition = DataDefinition::new(DdlVersion::V4_1).structure(
        StructType::new("Bits")
            .element(Element::new("a", "tUInt8").bits(3))
            .element(Element::new("b", "tUInt16").bits(12).big_endian())
            .element(Element::new("c", "tInt8").bits(5))
            .element(Element::new("d", "tUInt16").big_endian()),
    );
    let factory = CodecFactory::new(&definition, "Bits").expect("compile");
    assert_eq!(factory.static_buffer_size(Representation::Serialized), 5);
    assert_eq!(factory.static_buffer_size(Representation::Deserialized), 6);

    let mut buffer = [0u8; 5];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_element_value(0, &Value::U8(5)).expect("a");
    codec.set_element_value(1, &Value::U16(0xabc)).expect("b");
    codec.set_element_value(2, &Value::I8(-3)).expect("c");
    codec.set_element_value(3, &Value::U16(0x1234)).expect("d");

    assert_eq!(codec.get_element_value(0).expect("a"), Value::U8(5));
    assert_eq!(codec.get_element_value(1).expect("b"), Value::U16(0xabc));
    assert_eq!(codec.get_element_value(2).expect("c"), Value::I8(-3));
    assert_eq!(codec.get_element_value(3).expect("d"), Value::U16(0x1234));

    // fields off a byte boundary have no address but stay readable
    assert!(codec.element_address(1).expect("b").is_none());
    assert!(codec.element_address(3).expect("d").is_none());
    assert!(codec.element_address(0).expect("a").is_some());
}

#[test]
fn test_serialized_values_are_masked_to_width() {
    let definition = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("Narrow").element(Element::new("v", "tUInt8").bits(4)));
    let factory = CodecFactory::new(&definition, "Narrow").expect("compile");
    let mut buffer = [0xf0u8; 1];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_element_value(0, &Value::U8(0x3c)).expect("set");
    assert_eq!(codec.get_element_value(0).expect("get"), Value::U8(0x0c));
    assert_eq!(buffer, [0xfc]);
}

#[test]
fn test_big_endian_byte_layout() {
    let definition = DataDefinition::new(DdlVersion::V4_1)
        .structure(
            StructType::new("Word")
                .element(Element::new("pad", "tUInt8"))
                .element(Element::new("word", "tUInt16").big_endian()),
        )
        .structure(StructType::new("Twelve").element(Element::new("v", "tUInt16").bits(12).big_endian()));

    let word = CodecFactory::new(&definition, "Word").expect("compile");
    let mut buffer = [0u8; 3];
    let mut codec = word.make_static_codec_for(&mut buffer, Representation::Serialized);
    access::set_value(&mut codec, "word", &Value::U16(0x1234)).expect("set");
    assert_eq!(buffer, [0, 0x12, 0x34]);

    let twelve = CodecFactory::new(&definition, "Twelve").expect("compile");
    let mut buffer = [0u8; 2];
    let mut codec = twelve.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_element_value(0, &Value::U16(0xabc)).expect("set");
    assert_eq!(buffer, [0xab, 0x0c]);
}

#[test]
fn test_explicit_serialized_positions() {
    let definition = DataDefinition::new(DdlVersion::V4_1).structure(
        StructType::new("Pos")
            .element(Element::new("a", "tUInt8").at(2, 0))
            .element(Element::new("b", "tUInt8").bits(4).at(0, 4)),
    );
    let factory = CodecFactory::new(&definition, "Pos").expect("compile");
    assert_eq!(factory.static_buffer_size(Representation::Serialized), 3);
    assert_eq!(factory.static_buffer_size(Representation::Deserialized), 2);

    let mut buffer = [0u8; 3];
    let mut codec = factory.make_static_codec_for(&mut buffer, Representation::Serialized);
    codec.set_element_value(0, &Value::U8(0x5a)).expect("a");
    codec.set_element_value(1, &Value::U8(0xf)).expect("b");
    assert_eq!(buffer, [0xf0, 0, 0x5a]);
}

#[test]
fn test_short_buffer_is_rejected() {
    let factory = CodecFactory::new(&header_definition(), "Header").expect("compile");
    let buffer = [0u8; 4];
    let decoder = factory.make_static_decoder_for(&buffer, Representation::Serialized);
    assert!(matches!(decoder.is_valid(), Err(CodecError::InvalidArgument(_))));
    assert!(decoder.get_element_value(0).is_ok());
    assert!(matches!(decoder.get_element_value(1), Err(CodecError::InvalidArgument(_))));
    assert!(matches!(
        decoder.get_element_value(5),
        Err(CodecError::InvalidIndex { index: 5, count: 3 })
    ));
}

#[test]
fn test_compile_errors() {
    let unknown_type = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("S").element(Element::new("x", "tUInt7")));
    assert!(matches!(build_layout(&unknown_type, "S"), Err(CodecError::InvalidArgument(_))));
    assert!(matches!(build_layout(&unknown_type, "Missing"), Err(CodecError::NotFound(_))));

    let recursive = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("Node").element(Element::new("next", "Node")));
    assert!(matches!(build_layout(&recursive, "Node"), Err(CodecError::InvalidArgument(_))));

    let zero_array = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("S").element(Element::new("x", "tUInt8").array(0)));
    assert!(matches!(build_layout(&zero_array, "S"), Err(CodecError::InvalidArgument(_))));

    let too_wide = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("S").element(Element::new("x", "tUInt8").bits(9)));
    assert!(matches!(build_layout(&too_wide, "S"), Err(CodecError::InvalidArgument(_))));

    let forward_size = DataDefinition::new(DdlVersion::V4_1).structure(
        StructType::new("S")
            .element(Element::new("items", "tUInt8").dynamic_array("n"))
            .element(Element::new("n", "tUInt8")),
    );
    assert!(matches!(build_layout(&forward_size, "S"), Err(CodecError::InvalidArgument(_))));

    let unknown_constant = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("S").element(Element::new("x", "tUInt8").constant("NOPE")));
    assert!(matches!(build_layout(&unknown_constant, "S"), Err(CodecError::InvalidArgument(_))));

    let duplicate = DataDefinition::new(DdlVersion::V4_1)
        .structure(StructType::new("S"))
        .structure(StructType::new("S"));
    assert!(matches!(build_layout(&duplicate, "S"), Err(CodecError::InvalidArgument(_))));
}

#[test]
fn test_dump_output() {
    let factory = CodecFactory::new(&message_definition(), "Msg").expect("compile");
    let text = format_layout(factory.layout());
    assert!(text.starts_with("struct Msg static 24/24 bits"));
    assert!(text.contains("kind: tUInt8 deser 0+8 ser 0+8 le enum Kind = PING"));
    assert!(text.contains("code: tUInt16 deser 8+16 ser 8+16 le = 2"));

    let buffer = [2u8, 7, 0];
    let decoder = factory.make_static_decoder_for(&buffer, Representation::Serialized);
    assert_eq!(format_elements(&decoder), "kind = PONG\ncode = 7");
}

#[test]
fn test_factories_share_one_layout() {
    let layout = Arc::new(build_layout(&header_definition(), "Header").expect("compile"));
    let first = CodecFactory::from_layout(layout.clone());
    let second = CodecFactory::from_layout(layout.clone());
    assert!(Arc::ptr_eq(first.layout(), second.layout()));
    assert_eq!(Arc::strong_count(&layout), 3);

    let mut buffer = [0u8; 6];
    let mut codec = first.make_static_codec_for(&mut buffer, Representation::Serialized);
    access::set_value(&mut codec, "value", &Value::U32(0xdead_beef)).expect("set");
    let decoder = second.make_static_decoder_for(&buffer, Representation::Serialized);
    assert_eq!(access::get_value(&decoder, "value").expect("get"), Value::U32(0xdead_beef));
}

struct CapturedLog(Mutex<Vec<(log::Level, String)>>);

impl log::Log for CapturedLog {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURED: CapturedLog = CapturedLog(Mutex::new(Vec::new()));

#[test]
fn test_position_after_dynamic_section_is_reported() {
    // only logger of this test binary
    let _ = log::set_logger(&CAPTURED);
    log::set_max_level(log::LevelFilter::Trace);

    let definition = DataDefinition::new(DdlVersion::V4_1).structure(
        StructType::new("Placed")
            .element(Element::new("n", "tUInt8"))
            .element(Element::new("vals", "tUInt8").dynamic_array("n"))
            .element(Element::new("late", "tUInt8").at(0, 0)),
    );
    let layout = build_layout(&definition, "Placed").expect("compile");
    assert!(layout.has_dynamic_elements());

    let lines = CAPTURED.0.lock().expect("log lines");
    assert!(lines
        .iter()
        .any(|(level, text)| *level == log::Level::Warn && text == "Placed.late: serialized position ignored in dynamic section"));
}
