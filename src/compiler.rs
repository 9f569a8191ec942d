//! Layout compiler: turns one struct type of a [`DataDefinition`] into a [`Layout`].
//!
//! The walk is depth-first with one [`Offsets`] cursor threaded through
//! return values. Fields go into a [`Section`]: first as fixed
//! [`LayoutField`]s, and, from the first dynamic array on, as
//! [`DynamicTemplate`]s (explicit wire positions stop meaning anything once
//! the layout depends on buffer contents).
//!
//! ## Padding
//!
//! Before an element the deserialized cursor moves to the element alignment.
//! After a nested struct it moves to the struct alignment, except for the last
//! struct of a fixed array when the description version is below 3.0: those
//! descriptions were written against a layout without that trailing pad, and
//! their buffers still are.

use crate::codec::CodecError;
use crate::description::{ArraySize, DataDefinition, Element, EnumType, ResolvedDefinition, StructType};
use crate::layout::{join_path, DynamicTemplate, EnumTable, FieldDescriptor, Layout, LayoutField, Offsets, Position};
use crate::value::{ScalarType, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Compile the layout of `struct_name`. No partial layout is returned on failure.
pub fn build_layout(definition: &DataDefinition, struct_name: &str) -> Result<Layout, CodecError> {
    let resolved = ResolvedDefinition::resolve(definition)?;
    let root = resolved
        .get_struct(struct_name)
        .ok_or_else(|| CodecError::NotFound(format!("struct {}", struct_name)))?;
    let mut compiler = Compiler {
        legacy: resolved.version().is_legacy(),
        resolved,
        enums: BTreeMap::new(),
        active: Vec::new(),
    };
    let mut section = Section::default();
    let end = compiler.add_struct(root, "", Offsets::default(), false, &mut section)?;
    let static_size = section.extent(end);
    log::debug!(
        "layout {}: {} fixed fields, {} dynamic templates, static size {} / {} bits",
        root.name,
        section.fields.len(),
        section.templates.len(),
        static_size.deserialized,
        static_size.serialized
    );
    Ok(Layout {
        name: root.name.clone(),
        fields: section.fields,
        dynamic: section.templates,
        enums: compiler.enums,
        static_size,
    })
}

/// Output of one instance scope: the whole record, or one template instance.
#[derive(Default)]
struct Section {
    fields: Vec<LayoutField>,
    templates: Vec<DynamicTemplate>,
    /// Cursor at which the dynamic part began.
    opened_at: Option<Offsets>,
    ignore_positions: bool,
    serialized_end: usize,
}

impl Section {
    fn template_scope() -> Self {
        Section { ignore_positions: true, ..Default::default() }
    }

    fn is_dynamic(&self) -> bool {
        self.opened_at.is_some()
    }

    fn push_field(&mut self, field: LayoutField) {
        self.serialized_end = self.serialized_end.max(field.serialized.end());
        self.fields.push(field);
    }

    /// Size of the fixed part, given the cursor at the end of the walk.
    fn extent(&self, end: Offsets) -> Offsets {
        let at = self.opened_at.unwrap_or(end);
        Offsets::new(at.deserialized, at.serialized.max(self.serialized_end))
    }
}

enum ElementKind<'d> {
    Scalar(ScalarType, Option<Arc<EnumTable>>),
    Struct(&'d StructType),
}

struct Compiler<'d> {
    resolved: ResolvedDefinition<'d>,
    legacy: bool,
    enums: BTreeMap<String, Arc<EnumTable>>,
    /// Structs currently being walked, to reject self-containing types.
    active: Vec<&'d str>,
}

fn indexed_name(base: &str, index: usize, count: usize) -> String {
    if count == 1 {
        base.to_string()
    } else {
        format!("{}[{}]", base, index)
    }
}

fn element_error(owner: &StructType, element: &Element, what: impl std::fmt::Display) -> CodecError {
    CodecError::InvalidArgument(format!("{}.{}: {}", owner.name, element.name, what))
}

impl<'d> Compiler<'d> {
    fn add_struct(
        &mut self,
        ty: &'d StructType,
        prefix: &str,
        start: Offsets,
        last_in_array: bool,
        section: &mut Section,
    ) -> Result<Offsets, CodecError> {
        if self.active.contains(&ty.name.as_str()) {
            return Err(CodecError::InvalidArgument(format!("struct {} contains itself", ty.name)));
        }
        self.active.push(ty.name.as_str());
        let result = self.add_struct_elements(ty, prefix, start, section);
        self.active.pop();
        let mut end = result?;

        let pad = !(self.legacy && last_in_array);
        if section.is_dynamic() {
            if pad && ty.alignment > 1 {
                section.templates.push(DynamicTemplate::alignment_marker(ty.alignment));
            }
        } else if pad {
            end.align_deserialized(ty.alignment);
        }
        Ok(end)
    }

    fn add_struct_elements(
        &mut self,
        ty: &'d StructType,
        prefix: &str,
        start: Offsets,
        section: &mut Section,
    ) -> Result<Offsets, CodecError> {
        let mut cursor = start;
        for element in &ty.elements {
            if section.is_dynamic() {
                self.add_dynamic_element(ty, element, prefix, section)?;
                continue;
            }
            match &element.array_size {
                ArraySize::Dynamic(_) => {
                    log::debug!(
                        "{}.{}: dynamic section opens at bit {} / {}",
                        ty.name,
                        element.name,
                        cursor.deserialized,
                        cursor.serialized
                    );
                    section.opened_at = Some(cursor);
                    self.add_dynamic_element(ty, element, prefix, section)?;
                }
                ArraySize::Fixed(count) => {
                    cursor = self.add_static_element(ty, element, *count, prefix, start.serialized, cursor, section)?;
                }
            }
        }
        Ok(cursor)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_static_element(
        &mut self,
        owner: &'d StructType,
        element: &'d Element,
        count: usize,
        prefix: &str,
        base_serialized: usize,
        mut cursor: Offsets,
        section: &mut Section,
    ) -> Result<Offsets, CodecError> {
        if count == 0 {
            return Err(element_error(owner, element, "dynamic array without size element"));
        }
        let kind = self.resolve(owner, element)?;
        cursor.align_deserialized(element.alignment);
        if let Some(byte_pos) = element.byte_pos {
            if section.ignore_positions {
                log::warn!("{}.{}: serialized position ignored in dynamic section", owner.name, element.name);
            } else {
                cursor.serialized = base_serialized + byte_pos * 8 + element.bit_pos as usize;
            }
        }

        let base_name = join_path(prefix, &element.name);
        for index in 0..count {
            let name = indexed_name(&base_name, index, count);
            let last = index + 1 == count;
            if section.is_dynamic() {
                // an earlier item of this array opened the dynamic section
                let template = self.element_template(owner, element, &kind, name, String::new(), last)?;
                section.templates.push(template);
                continue;
            }
            match &kind {
                ElementKind::Scalar(scalar, table) => {
                    let field = self.scalar_field(owner, element, name, *scalar, table.clone(), cursor)?;
                    cursor = cursor + Offsets::new(field.deserialized.bit_size, field.serialized.bit_size);
                    section.push_field(field);
                }
                ElementKind::Struct(st) => {
                    cursor.align_deserialized(self.instance_alignment(st));
                    cursor = self.add_struct(st, &name, cursor, last, section)?;
                }
            }
        }
        Ok(cursor)
    }

    fn add_dynamic_element(
        &mut self,
        owner: &'d StructType,
        element: &'d Element,
        prefix: &str,
        section: &mut Section,
    ) -> Result<(), CodecError> {
        if element.byte_pos.is_some() {
            log::warn!("{}.{}: serialized position ignored in dynamic section", owner.name, element.name);
        }
        let kind = self.resolve(owner, element)?;
        let name = join_path(prefix, &element.name);
        match &element.array_size {
            ArraySize::Dynamic(size_field) => {
                let declared_before = owner
                    .elements
                    .iter()
                    .take_while(|e| !std::ptr::eq(*e, element))
                    .any(|e| e.name == *size_field);
                if size_field.is_empty() || !declared_before {
                    return Err(element_error(
                        owner,
                        element,
                        format!("array size element '{}' is not declared before the array", size_field),
                    ));
                }
                let template = self.element_template(owner, element, &kind, name, join_path(prefix, size_field), false)?;
                section.templates.push(template);
            }
            ArraySize::Fixed(0) => {
                return Err(element_error(owner, element, "dynamic array without size element"));
            }
            ArraySize::Fixed(count) => {
                for index in 0..*count {
                    let template = self.element_template(
                        owner,
                        element,
                        &kind,
                        indexed_name(&name, index, *count),
                        String::new(),
                        index + 1 == *count,
                    )?;
                    section.templates.push(template);
                }
            }
        }
        Ok(())
    }

    fn element_template(
        &mut self,
        owner: &'d StructType,
        element: &'d Element,
        kind: &ElementKind<'d>,
        name: String,
        size_field: String,
        last_in_array: bool,
    ) -> Result<DynamicTemplate, CodecError> {
        match kind {
            ElementKind::Scalar(scalar, table) => {
                let field = self.scalar_field(owner, element, String::new(), *scalar, table.clone(), Offsets::default())?;
                let size = Offsets::new(field.deserialized.bit_size, field.serialized.bit_size);
                Ok(DynamicTemplate {
                    name,
                    alignment: element.alignment,
                    size_field,
                    size,
                    fields: vec![field],
                    children: Vec::new(),
                })
            }
            ElementKind::Struct(st) => {
                let mut scope = Section::template_scope();
                let end = self.add_struct(st, "", Offsets::default(), last_in_array, &mut scope)?;
                Ok(DynamicTemplate {
                    name,
                    alignment: element.alignment.max(self.instance_alignment(st)),
                    size_field,
                    size: scope.extent(end),
                    fields: scope.fields,
                    children: scope.templates,
                })
            }
        }
    }

    /// Alignment a struct instance starts on: the struct's own and that of
    /// every member, nested structs included. Template offsets are relative
    /// to the instance start, so instances must start there for member
    /// alignment to hold in the buffer.
    fn instance_alignment(&self, ty: &'d StructType) -> usize {
        let mut stack = Vec::new();
        self.instance_alignment_of(ty, &mut stack)
    }

    fn instance_alignment_of(&self, ty: &'d StructType, stack: &mut Vec<&'d str>) -> usize {
        if stack.contains(&ty.name.as_str()) {
            return 1;
        }
        stack.push(ty.name.as_str());
        let mut alignment = ty.alignment.max(1);
        for element in &ty.elements {
            alignment = alignment.max(element.alignment);
            let type_name = element.type_name.as_str();
            if self.resolved.get_scalar(type_name).is_some() || self.resolved.get_enum(type_name).is_some() {
                continue;
            }
            if let Some(nested) = self.resolved.get_struct(type_name) {
                alignment = alignment.max(self.instance_alignment_of(nested, stack));
            }
        }
        stack.pop();
        alignment
    }

    fn scalar_field(
        &mut self,
        owner: &StructType,
        element: &Element,
        name: String,
        scalar: ScalarType,
        enum_table: Option<Arc<EnumTable>>,
        at: Offsets,
    ) -> Result<LayoutField, CodecError> {
        let native = scalar.bit_size();
        let wire = match element.num_bits {
            None => native,
            Some(n) if (1..=native).contains(&n) => n,
            Some(n) => return Err(element_error(owner, element, format!("{} bits do not fit {}", n, scalar))),
        };
        let constant = match &element.constant {
            Some(token) => Some(self.resolve_constant(owner, element, token, scalar)?),
            None => None,
        };
        Ok(LayoutField {
            descriptor: FieldDescriptor { name, scalar_type: scalar, enum_table },
            deserialized: Position::new(at.deserialized, native),
            serialized: Position::new(at.serialized, wire),
            byte_order: element.byte_order,
            constant,
        })
    }

    fn resolve(&mut self, owner: &StructType, element: &Element) -> Result<ElementKind<'d>, CodecError> {
        let type_name = element.type_name.as_str();
        if let Some(scalar) = self.resolved.get_scalar(type_name) {
            return Ok(ElementKind::Scalar(scalar, None));
        }
        if let Some(e) = self.resolved.get_enum(type_name) {
            let table = self.enum_table(e)?;
            return Ok(ElementKind::Scalar(table.scalar_type, Some(table)));
        }
        if let Some(s) = self.resolved.get_struct(type_name) {
            return Ok(ElementKind::Struct(s));
        }
        Err(element_error(owner, element, format!("unknown type {}", type_name)))
    }

    /// Table for an enum; registered on first use, shared afterwards.
    fn enum_table(&mut self, e: &EnumType) -> Result<Arc<EnumTable>, CodecError> {
        if let Some(table) = self.enums.get(&e.name) {
            return Ok(table.clone());
        }
        let scalar = self.resolved.get_scalar(&e.type_name).ok_or_else(|| {
            CodecError::InvalidArgument(format!("enum {}: unsupported underlying type {}", e.name, e.type_name))
        })?;
        let entries = e
            .entries
            .iter()
            .map(|entry| (entry.name.clone(), Value::I64(entry.value).convert(scalar)))
            .collect();
        let table = Arc::new(EnumTable { name: e.name.clone(), scalar_type: scalar, entries });
        log::debug!("enum {} registered with {} entries", e.name, table.entries.len());
        self.enums.insert(e.name.clone(), table.clone());
        Ok(table)
    }

    fn resolve_constant(
        &self,
        owner: &StructType,
        element: &Element,
        token: &str,
        scalar: ScalarType,
    ) -> Result<Value, CodecError> {
        let recorded = self.enums.values().find_map(|table| table.value_of(token));
        let declared = || {
            self.resolved
                .definition
                .enums
                .iter()
                .flat_map(|e| e.entries.iter())
                .find(|entry| entry.name == token)
                .map(|entry| Value::I64(entry.value))
        };
        recorded
            .or_else(declared)
            .map(|v| v.convert(scalar))
            .ok_or_else(|| element_error(owner, element, format!("unknown constant {}", token)))
    }
}
