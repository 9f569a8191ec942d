//! # bitlayout: bit-exact record layouts and codecs
//!
//! Compiles a struct type of a [`DataDefinition`] into a [`Layout`]: the bit
//! position of every field in two representations, and views that read and
//! write those fields in a caller buffer.
//!
//! ## Representations
//!
//! - **Deserialized**: native byte order, every field byte aligned at its
//!   native width, struct and element alignment applied.
//! - **Serialized**: packed wire layout. Fields may start at any bit and take
//!   fewer bits than their type (`bits(n)`), elements may carry an explicit
//!   position, and each field has its own byte order.
//!
//! ## Views
//!
//! | Need | Use |
//! |------|-----|
//! | Read fixed fields | [`StaticDecoder`] |
//! | Read and write fixed fields | [`StaticCodec`] |
//! | Records with arrays sized by another field | [`Decoder`] / [`Codec`] |
//! | Access by path (`items[2].x`) | [`access`] |
//! | Convert a record between representations | [`transform`](transform::transform) |
//!
//! Descriptions below version 3.0 keep their historic array layout: the last
//! struct of an array gets no trailing alignment pad.
//!
//! ## Example
//!
//! ```
//! use bitlayout::{access, CodecFactory, DataDefinition, DdlVersion, Element, Representation, StructType};
//!
//! let definition = DataDefinition::new(DdlVersion::V4_1).structure(
//!     StructType::new("Record")
//!         .element(Element::new("a", "tUInt8"))
//!         .element(Element::new("len", "tUInt8"))
//!         .element(Element::new("items", "tUInt16").dynamic_array("len")),
//! );
//! let factory = CodecFactory::new(&definition, "Record")?;
//! let buffer = [1u8, 3, 0x0a, 0, 0x0b, 0, 0x0c, 0];
//! let decoder = factory.make_decoder_for(&buffer, Representation::Serialized)?;
//! assert_eq!(access::get_value(&decoder, "items[2]")?.as_u64(), Some(12));
//! # Ok::<(), bitlayout::CodecError>(())
//! ```

pub mod access;
pub mod accessor;
pub mod codec;
pub mod compiler;
pub mod description;
pub mod dump;
pub mod dynamic;
pub mod factory;
pub mod layout;
pub mod transform;
pub mod value;

pub use accessor::Accessor;
pub use codec::{CodecError, ElementAccess, ElementAccessMut, StaticCodec, StaticDecoder};
pub use compiler::build_layout;
pub use description::{ArraySize, DataDefinition, DdlVersion, Element, EnumType, StructType};
pub use dynamic::{Codec, Decoder};
pub use factory::CodecFactory;
pub use layout::{ByteOrder, DynamicTemplate, EnumTable, Layout, LayoutField, Offsets, Position, Representation};
pub use transform::{transform, transform_to_buffer};
pub use value::{ScalarType, Value};
