//! Dynamic decoder fuzz target: arbitrary buffers against a layout with nested
//! variable sections. Construction may fail, but must not panic; every element
//! of a view that was built must be readable.
//! Build with: cargo fuzz run dynamic_decoder_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use bitlayout::{CodecFactory, DataDefinition, DdlVersion, ElementAccess, Element, Representation, StructType};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn factory() -> CodecFactory {
    let definition = DataDefinition::new(DdlVersion::V2_0)
        .structure(
            StructType::new("Entry")
                .aligned(4)
                .element(Element::new("count", "tUInt8").bits(5))
                .element(Element::new("data", "tInt16").bits(11).big_endian().dynamic_array("count")),
        )
        .structure(
            StructType::new("Frame")
                .aligned(2)
                .element(Element::new("n", "tUInt8"))
                .element(Element::new("entries", "Entry").aligned(4).dynamic_array("n"))
                .element(Element::new("crc", "tUInt16")),
        );
    CodecFactory::new(&definition, "Frame").expect("fuzz layout compiles")
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let factory = factory();
    for rep in [Representation::Serialized, Representation::Deserialized] {
        if let Ok(decoder) = factory.make_decoder_for(data, rep) {
            for index in 0..decoder.element_count() {
                assert!(decoder.get_element_value(index).is_ok());
            }
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run dynamic_decoder_fuzz");
}
