//! Compiled layout: fixed field table, dynamic templates and enum tables.
//!
//! A [`Layout`] is built once by the [compiler](crate::compiler) and never
//! mutated afterwards; views share it through an `Arc`.

use crate::value::{ScalarType, Value};
use std::collections::BTreeMap;
use std::ops::Add;
use std::sync::Arc;

/// Byte order of a multi-byte field in the serialized representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Which of the two buffer layouts a view works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Native, alignment-padded, byte-aligned in-memory layout.
    Deserialized,
    /// Packed, bit-exact wire layout.
    Serialized,
}

/// Bit position of a field in one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub bit_offset: usize,
    pub bit_size: usize,
}

impl Position {
    pub fn new(bit_offset: usize, bit_size: usize) -> Self {
        Position { bit_offset, bit_size }
    }

    pub fn end(&self) -> usize {
        self.bit_offset + self.bit_size
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bit_offset % 8 == 0
    }
}

/// Running cursor pair, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offsets {
    pub deserialized: usize,
    pub serialized: usize,
}

impl Offsets {
    pub fn new(deserialized: usize, serialized: usize) -> Self {
        Offsets { deserialized, serialized }
    }

    pub fn get(&self, rep: Representation) -> usize {
        match rep {
            Representation::Deserialized => self.deserialized,
            Representation::Serialized => self.serialized,
        }
    }

    /// Move the deserialized cursor up to `alignment` bytes. The serialized side is packed.
    pub fn align_deserialized(&mut self, alignment: usize) {
        self.deserialized = align_bits(self.deserialized, alignment);
    }
}

impl Add for Offsets {
    type Output = Offsets;

    fn add(self, rhs: Offsets) -> Offsets {
        Offsets {
            deserialized: self.deserialized + rhs.deserialized,
            serialized: self.serialized + rhs.serialized,
        }
    }
}

/// Round `bits` up to a multiple of `alignment` bytes.
pub fn align_bits(bits: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return bits;
    }
    let step = alignment * 8;
    bits.div_ceil(step) * step
}

/// Symbolic names of one enum, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumTable {
    pub name: String,
    pub scalar_type: ScalarType,
    pub entries: Vec<(String, Value)>,
}

impl EnumTable {
    pub fn value_of(&self, name: &str) -> Option<Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// First name carrying `value` in declaration order (several names may share one value).
    pub fn name_of(&self, value: &Value) -> Option<&str> {
        let value = value.convert(self.scalar_type);
        self.entries.iter().find(|(_, v)| *v == value).map(|(n, _)| n.as_str())
    }
}

/// Name and type of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub scalar_type: ScalarType,
    pub enum_table: Option<Arc<EnumTable>>,
}

/// One addressable field: descriptor plus its position in both representations.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutField {
    pub descriptor: FieldDescriptor,
    pub deserialized: Position,
    pub serialized: Position,
    pub byte_order: ByteOrder,
    pub constant: Option<Value>,
}

impl LayoutField {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.descriptor.scalar_type
    }

    pub fn enum_table(&self) -> Option<&EnumTable> {
        self.descriptor.enum_table.as_deref()
    }

    pub fn position(&self, rep: Representation) -> Position {
        match rep {
            Representation::Deserialized => self.deserialized,
            Representation::Serialized => self.serialized,
        }
    }

    /// Copy of this template field moved by `by` and renamed.
    pub fn instantiate(&self, by: Offsets, name: String) -> LayoutField {
        LayoutField {
            descriptor: FieldDescriptor { name, ..self.descriptor.clone() },
            deserialized: Position::new(self.deserialized.bit_offset + by.deserialized, self.deserialized.bit_size),
            serialized: Position::new(self.serialized.bit_offset + by.serialized, self.serialized.bit_size),
            byte_order: self.byte_order,
            constant: self.constant,
        }
    }
}

/// One kind of variable section, instantiated 0..N times per buffer.
///
/// An instance occupies `size` bits from its (aligned) start; `fields` are
/// relative to that start and named relative to the instance path (an empty
/// name means the instance itself is the scalar). `children` follow the
/// instance's fixed part and are resolved with the instance path as prefix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicTemplate {
    /// Empty for a pure alignment marker.
    pub name: String,
    /// Alignment in bytes.
    pub alignment: usize,
    /// Sibling holding the repetition count; empty for a single instance.
    pub size_field: String,
    pub size: Offsets,
    pub fields: Vec<LayoutField>,
    pub children: Vec<DynamicTemplate>,
}

impl DynamicTemplate {
    pub fn alignment_marker(alignment: usize) -> Self {
        DynamicTemplate { alignment, ..Default::default() }
    }

    pub fn is_alignment_marker(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_dynamic_array(&self) -> bool {
        !self.size_field.is_empty()
    }
}

/// Compiled, immutable layout of one struct type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layout {
    pub(crate) name: String,
    pub(crate) fields: Vec<LayoutField>,
    pub(crate) dynamic: Vec<DynamicTemplate>,
    pub(crate) enums: BTreeMap<String, Arc<EnumTable>>,
    pub(crate) static_size: Offsets,
}

impl Layout {
    /// Name of the struct type this layout was compiled from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[LayoutField] {
        &self.fields
    }

    pub fn dynamic_templates(&self) -> &[DynamicTemplate] {
        &self.dynamic
    }

    pub fn enums(&self) -> &BTreeMap<String, Arc<EnumTable>> {
        &self.enums
    }

    pub fn has_enums(&self) -> bool {
        !self.enums.is_empty()
    }

    pub fn has_dynamic_elements(&self) -> bool {
        !self.dynamic.is_empty()
    }

    pub fn static_bit_size(&self, rep: Representation) -> usize {
        self.static_size.get(rep)
    }

    pub fn static_byte_size(&self, rep: Representation) -> usize {
        self.static_size.get(rep).div_ceil(8)
    }

    pub(crate) fn static_offsets(&self) -> Offsets {
        self.static_size
    }
}

/// Join a path prefix and a member name with `.`.
pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}.{}", prefix, name),
    }
}
