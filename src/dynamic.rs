//! Dynamic views: the fixed fields of a [`Layout`] plus the fields of its
//! variable sections, materialized once per buffer.
//!
//! Construction walks the layout's [`DynamicTemplate`]s in order. The
//! repetition count of a dynamic array is read from its size element, which
//! must already be known at that point (a fixed field, or a field
//! materialized earlier in the same walk). Every materialized field is
//! checked against the buffer; the first one that does not fit fails the
//! whole construction and no view is returned.
//!
//! The table reflects the buffer contents at construction time. After a
//! [`Codec`] changes a size element, build a new view to see the new shape.

use crate::accessor::Accessor;
use crate::codec::{check_static_size, CodecError, ElementAccess, ElementAccessMut};
use crate::layout::{join_path, DynamicTemplate, Layout, LayoutField, Offsets, Representation};
use std::sync::Arc;

/// Read-only view over one buffer, with variable sections expanded.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    layout: Arc<Layout>,
    buffer: &'a [u8],
    accessor: Accessor,
    dynamic: Vec<LayoutField>,
    end: Offsets,
}

/// Read-write view over one buffer, with variable sections expanded.
#[derive(Debug)]
pub struct Codec<'a> {
    layout: Arc<Layout>,
    buffer: &'a mut [u8],
    accessor: Accessor,
    dynamic: Vec<LayoutField>,
    end: Offsets,
}

impl<'a> Decoder<'a> {
    pub fn new(layout: Arc<Layout>, buffer: &'a [u8], rep: Representation) -> Result<Self, CodecError> {
        let accessor = Accessor::for_representation(rep);
        let (dynamic, end) = materialize(&layout, buffer, accessor)?;
        Ok(Decoder { layout, buffer, accessor, dynamic, end })
    }

    /// Fails when the buffer is smaller than the static size of the view's representation.
    pub fn is_valid(&self) -> Result<(), CodecError> {
        check_static_size(&self.layout, self.accessor.representation(), self.buffer.len())
    }

    /// Fields materialized from the variable sections, in buffer order.
    pub fn dynamic_elements(&self) -> &[LayoutField] {
        &self.dynamic
    }
}

impl<'a> Codec<'a> {
    pub fn new(layout: Arc<Layout>, buffer: &'a mut [u8], rep: Representation) -> Result<Self, CodecError> {
        let accessor = Accessor::for_representation(rep);
        let (dynamic, end) = materialize(&layout, buffer, accessor)?;
        Ok(Codec { layout, buffer, accessor, dynamic, end })
    }

    pub fn is_valid(&self) -> Result<(), CodecError> {
        check_static_size(&self.layout, self.accessor.representation(), self.buffer.len())
    }

    pub fn dynamic_elements(&self) -> &[LayoutField] {
        &self.dynamic
    }
}

fn element_at<'l>(layout: &'l Layout, dynamic: &'l [LayoutField], index: usize) -> Result<&'l LayoutField, CodecError> {
    let fixed = layout.fields();
    if index < fixed.len() {
        return Ok(&fixed[index]);
    }
    dynamic
        .get(index - fixed.len())
        .ok_or(CodecError::InvalidIndex { index, count: fixed.len() + dynamic.len() })
}

impl ElementAccess for Decoder<'_> {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn representation(&self) -> Representation {
        self.accessor.representation()
    }

    fn buffer(&self) -> &[u8] {
        self.buffer
    }

    fn element_count(&self) -> usize {
        self.layout.fields().len() + self.dynamic.len()
    }

    fn element(&self, index: usize) -> Result<&LayoutField, CodecError> {
        element_at(&self.layout, &self.dynamic, index)
    }

    fn buffer_size(&self, rep: Representation) -> usize {
        self.end.get(rep).div_ceil(8)
    }

    fn accessor(&self) -> Accessor {
        self.accessor
    }
}

impl ElementAccess for Codec<'_> {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn representation(&self) -> Representation {
        self.accessor.representation()
    }

    fn buffer(&self) -> &[u8] {
        &*self.buffer
    }

    fn element_count(&self) -> usize {
        self.layout.fields().len() + self.dynamic.len()
    }

    fn element(&self, index: usize) -> Result<&LayoutField, CodecError> {
        element_at(&self.layout, &self.dynamic, index)
    }

    fn buffer_size(&self, rep: Representation) -> usize {
        self.end.get(rep).div_ceil(8)
    }

    fn accessor(&self) -> Accessor {
        self.accessor
    }
}

impl ElementAccessMut for Codec<'_> {
    fn element_with_buffer_mut(&mut self, index: usize) -> Result<(&LayoutField, &mut [u8]), CodecError> {
        let field = element_at(&self.layout, &self.dynamic, index)?;
        Ok((field, &mut *self.buffer))
    }
}

/// Expand the templates of `layout` over `buffer`. Returns the materialized
/// fields and the end cursor of the record.
fn materialize(layout: &Layout, buffer: &[u8], accessor: Accessor) -> Result<(Vec<LayoutField>, Offsets), CodecError> {
    if !layout.has_dynamic_elements() {
        return Ok((Vec::new(), layout.static_offsets()));
    }
    let mut expansion = Expansion { layout, buffer, accessor, fields: Vec::new() };
    let end = expansion.expand(layout.dynamic_templates(), "", layout.static_offsets())?;
    log::debug!(
        "{}: {} dynamic fields materialized, record ends at bit {} / {}",
        layout.name(),
        expansion.fields.len(),
        end.deserialized,
        end.serialized
    );
    Ok((expansion.fields, end))
}

struct Expansion<'v> {
    layout: &'v Layout,
    buffer: &'v [u8],
    accessor: Accessor,
    fields: Vec<LayoutField>,
}

impl Expansion<'_> {
    fn expand(&mut self, templates: &[DynamicTemplate], prefix: &str, mut cursor: Offsets) -> Result<Offsets, CodecError> {
        for template in templates {
            cursor.align_deserialized(template.alignment);
            if template.is_alignment_marker() {
                continue;
            }
            let path = join_path(prefix, &template.name);
            let count = if template.is_dynamic_array() {
                self.array_count(&join_path(prefix, &template.size_field))?
            } else {
                1
            };
            log::trace!("{}: {} instance(s) at bit {} / {}", path, count, cursor.deserialized, cursor.serialized);
            for index in 0..count {
                cursor.align_deserialized(template.alignment);
                let instance = if template.is_dynamic_array() {
                    format!("{}[{}]", path, index)
                } else {
                    path.clone()
                };
                for field in &template.fields {
                    let field = field.instantiate(cursor, join_path(&instance, field.name()));
                    self.check_bounds(&field)?;
                    self.fields.push(field);
                }
                cursor = cursor + template.size;
                cursor = self.expand(&template.children, &instance, cursor)?;
            }
            cursor.align_deserialized(template.alignment);
        }
        Ok(cursor)
    }

    /// Repetition count read from an already known field.
    fn array_count(&self, path: &str) -> Result<usize, CodecError> {
        let field = self
            .layout
            .fields()
            .iter()
            .chain(self.fields.iter())
            .find(|f| f.name() == path)
            .ok_or_else(|| CodecError::InvalidArgument(format!("array size element {} not found", path)))?;
        let value = self.accessor.get_value(field, self.buffer)?;
        let count = value
            .as_u64()
            .ok_or_else(|| CodecError::InvalidArgument(format!("array size element {} holds {}", path, value)))?;
        // more repetitions than bits cannot fit
        let limit = self.buffer.len() as u64 * 8;
        if count > limit {
            return Err(CodecError::InvalidArgument(format!(
                "array size {} from {} exceeds buffer of {} bytes",
                count,
                path,
                self.buffer.len()
            )));
        }
        Ok(count as usize)
    }

    fn check_bounds(&self, field: &LayoutField) -> Result<(), CodecError> {
        let end = field.position(self.accessor.representation()).end();
        if end > self.buffer.len() * 8 {
            return Err(CodecError::InvalidArgument(format!(
                "{} ends at bit {}, beyond buffer of {} bytes",
                field.name(),
                end,
                self.buffer.len()
            )));
        }
        Ok(())
    }
}
