//! Type-description tree consumed by the layout compiler.
//!
//! Parsing description files is someone else's job; callers build a
//! [`DataDefinition`] directly, usually with the small builder methods below.

use crate::codec::CodecError;
use crate::layout::ByteOrder;
use crate::value::ScalarType;
use std::collections::HashMap;

/// Language version of a description. Versions below 3.0 use the legacy
/// array padding rule (no trailing pad after the last struct of an array).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DdlVersion {
    pub major: u32,
    pub minor: u32,
}

impl DdlVersion {
    pub const V2_0: DdlVersion = DdlVersion::new(2, 0);
    pub const V3_0: DdlVersion = DdlVersion::new(3, 0);
    pub const V4_0: DdlVersion = DdlVersion::new(4, 0);
    pub const V4_1: DdlVersion = DdlVersion::new(4, 1);

    pub const fn new(major: u32, minor: u32) -> Self {
        DdlVersion { major, minor }
    }

    pub fn is_legacy(self) -> bool {
        self < DdlVersion::V3_0
    }
}

impl Default for DdlVersion {
    fn default() -> Self {
        DdlVersion::V4_1
    }
}

/// Root of a description: named data types, enums and structs.
#[derive(Debug, Clone, Default)]
pub struct DataDefinition {
    pub version: DdlVersion,
    pub data_types: Vec<DataType>,
    pub enums: Vec<EnumType>,
    pub structs: Vec<StructType>,
}

/// A named alias of a primitive type.
#[derive(Debug, Clone)]
pub struct DataType {
    pub name: String,
    pub scalar: ScalarType,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    /// Name of the underlying data type.
    pub type_name: String,
    pub entries: Vec<EnumEntry>,
}

#[derive(Debug, Clone)]
pub struct EnumEntry {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    /// Alignment in bytes.
    pub alignment: usize,
    pub elements: Vec<Element>,
}

/// Repetition of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArraySize {
    /// Fixed count; a plain field is `Fixed(1)`. `Fixed(0)` is rejected by the compiler.
    Fixed(usize),
    /// Count read at decode time from the named sibling element.
    Dynamic(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub type_name: String,
    pub array_size: ArraySize,
    /// Alignment in bytes of the deserialized position.
    pub alignment: usize,
    /// Explicit serialized position, relative to the enclosing struct.
    pub byte_pos: Option<usize>,
    pub bit_pos: u8,
    /// Explicit serialized width in bits.
    pub num_bits: Option<usize>,
    pub byte_order: ByteOrder,
    /// Constant token, resolved against enum entries.
    pub constant: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            type_name: type_name.into(),
            array_size: ArraySize::Fixed(1),
            alignment: 1,
            byte_pos: None,
            bit_pos: 0,
            num_bits: None,
            byte_order: ByteOrder::LittleEndian,
            constant: None,
        }
    }

    pub fn array(mut self, n: usize) -> Self {
        self.array_size = ArraySize::Fixed(n);
        self
    }

    pub fn dynamic_array(mut self, size_field: impl Into<String>) -> Self {
        self.array_size = ArraySize::Dynamic(size_field.into());
        self
    }

    pub fn aligned(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn at(mut self, byte_pos: usize, bit_pos: u8) -> Self {
        self.byte_pos = Some(byte_pos);
        self.bit_pos = bit_pos;
        self
    }

    pub fn bits(mut self, num_bits: usize) -> Self {
        self.num_bits = Some(num_bits);
        self
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn big_endian(self) -> Self {
        self.byte_order(ByteOrder::BigEndian)
    }

    pub fn constant(mut self, token: impl Into<String>) -> Self {
        self.constant = Some(token.into());
        self
    }
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        StructType { name: name.into(), alignment: 1, elements: Vec::new() }
    }

    pub fn aligned(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }
}

impl EnumType {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        EnumType { name: name.into(), type_name: type_name.into(), entries: Vec::new() }
    }

    pub fn entry(mut self, name: impl Into<String>, value: i64) -> Self {
        self.entries.push(EnumEntry { name: name.into(), value });
        self
    }
}

impl DataDefinition {
    pub fn new(version: DdlVersion) -> Self {
        DataDefinition { version, ..Default::default() }
    }

    pub fn data_type(mut self, name: impl Into<String>, scalar: ScalarType) -> Self {
        self.data_types.push(DataType { name: name.into(), scalar });
        self
    }

    pub fn enumeration(mut self, e: EnumType) -> Self {
        self.enums.push(e);
        self
    }

    pub fn structure(mut self, s: StructType) -> Self {
        self.structs.push(s);
        self
    }
}

/// Definition with by-name indexes, checked for duplicate names.
#[derive(Debug)]
pub struct ResolvedDefinition<'d> {
    pub definition: &'d DataDefinition,
    data_types_by_name: HashMap<&'d str, usize>,
    enums_by_name: HashMap<&'d str, usize>,
    structs_by_name: HashMap<&'d str, usize>,
}

impl<'d> ResolvedDefinition<'d> {
    pub fn resolve(definition: &'d DataDefinition) -> Result<Self, CodecError> {
        let mut data_types_by_name = HashMap::new();
        let mut enums_by_name = HashMap::new();
        let mut structs_by_name = HashMap::new();
        for (i, d) in definition.data_types.iter().enumerate() {
            if data_types_by_name.insert(d.name.as_str(), i).is_some() {
                return Err(CodecError::InvalidArgument(format!("duplicate data type name: {}", d.name)));
            }
        }
        for (i, e) in definition.enums.iter().enumerate() {
            if enums_by_name.insert(e.name.as_str(), i).is_some() {
                return Err(CodecError::InvalidArgument(format!("duplicate enum name: {}", e.name)));
            }
        }
        for (i, s) in definition.structs.iter().enumerate() {
            if structs_by_name.insert(s.name.as_str(), i).is_some() {
                return Err(CodecError::InvalidArgument(format!("duplicate struct name: {}", s.name)));
            }
        }
        Ok(ResolvedDefinition { definition, data_types_by_name, enums_by_name, structs_by_name })
    }

    pub fn version(&self) -> DdlVersion {
        self.definition.version
    }

    /// Scalar type for a name: declared data types first, then built-in names.
    pub fn get_scalar(&self, name: &str) -> Option<ScalarType> {
        self.data_types_by_name
            .get(name)
            .map(|&i| self.definition.data_types[i].scalar)
            .or_else(|| ScalarType::from_name(name))
    }

    pub fn get_enum(&self, name: &str) -> Option<&'d EnumType> {
        self.enums_by_name.get(name).map(|&i| &self.definition.enums[i])
    }

    pub fn get_struct(&self, name: &str) -> Option<&'d StructType> {
        self.structs_by_name.get(name).map(|&i| &self.definition.structs[i])
    }
}
