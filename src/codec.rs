//! Fixed-layout views over a buffer: [`StaticDecoder`] (read-only) and
//! [`StaticCodec`] (read-write).
//!
//! Both expose only the fixed fields of a [`Layout`]; the dynamic views in
//! [`crate::dynamic`] add the fields materialized from variable sections.
//! The by-index operations shared by all four views live in the
//! [`ElementAccess`] / [`ElementAccessMut`] traits, which is also what the
//! [path resolver](crate::access) works on.

use crate::accessor::Accessor;
use crate::layout::{Layout, LayoutField, Representation};
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid index {index} (element count {count})")]
    InvalidIndex { index: usize, count: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unexpected: {0}")]
    Unexpected(String),
}

/// Read access to the elements of a view.
pub trait ElementAccess {
    fn layout(&self) -> &Layout;

    fn representation(&self) -> Representation;

    fn buffer(&self) -> &[u8];

    fn element_count(&self) -> usize;

    fn element(&self, index: usize) -> Result<&LayoutField, CodecError>;

    /// Bytes needed for a buffer of `rep` holding this view's elements.
    fn buffer_size(&self, rep: Representation) -> usize;

    fn accessor(&self) -> Accessor {
        Accessor::for_representation(self.representation())
    }

    fn get_element_value(&self, index: usize) -> Result<Value, CodecError> {
        let field = self.element(index)?;
        self.accessor().get_value(field, self.buffer())
    }

    /// Copy the value into `out` (native byte order, exact native size of the field type).
    fn get_element_raw(&self, index: usize, out: &mut [u8]) -> Result<(), CodecError> {
        let field = self.element(index)?;
        self.accessor().get_raw(field, self.buffer(), out)
    }

    /// Bytes of the field inside the buffer, when it starts on a byte boundary and fits.
    fn element_address(&self, index: usize) -> Result<Option<&[u8]>, CodecError> {
        let field = self.element(index)?;
        let buffer = self.buffer();
        Ok(byte_range(field, self.representation(), buffer.len()).map(|(start, end)| &buffer[start..end]))
    }
}

/// Write access to the elements of a view.
pub trait ElementAccessMut: ElementAccess {
    /// The field at `index` together with the writable buffer.
    fn element_with_buffer_mut(&mut self, index: usize) -> Result<(&LayoutField, &mut [u8]), CodecError>;

    fn set_element_value(&mut self, index: usize, value: &Value) -> Result<(), CodecError> {
        let accessor = self.accessor();
        let (field, buffer) = self.element_with_buffer_mut(index)?;
        accessor.set_value(field, buffer, value)
    }

    /// Write native-order bytes of exactly the native size of the field type.
    fn set_element_raw(&mut self, index: usize, value: &[u8]) -> Result<(), CodecError> {
        let accessor = self.accessor();
        let (field, buffer) = self.element_with_buffer_mut(index)?;
        accessor.set_raw(field, buffer, value)
    }

    fn element_address_mut(&mut self, index: usize) -> Result<Option<&mut [u8]>, CodecError> {
        let rep = self.representation();
        let (field, buffer) = self.element_with_buffer_mut(index)?;
        match byte_range(field, rep, buffer.len()) {
            Some((start, end)) => Ok(Some(&mut buffer[start..end])),
            None => Ok(None),
        }
    }

    /// Write every element's constant. Does nothing when the layout has no enums at all.
    fn set_constants(&mut self) -> Result<(), CodecError> {
        if !self.layout().has_enums() {
            return Ok(());
        }
        let accessor = self.accessor();
        for index in 0..self.element_count() {
            let (field, buffer) = self.element_with_buffer_mut(index)?;
            if let Some(constant) = field.constant {
                accessor.set_value(field, buffer, &constant)?;
            }
        }
        Ok(())
    }
}

/// Byte range of a field when it is byte aligned and inside `len` bytes.
pub(crate) fn byte_range(field: &LayoutField, rep: Representation, len: usize) -> Option<(usize, usize)> {
    let pos = field.position(rep);
    if !pos.is_byte_aligned() {
        return None;
    }
    let start = pos.bit_offset / 8;
    let end = start + pos.bit_size.div_ceil(8);
    (end <= len).then_some((start, end))
}

fn static_element(layout: &Layout, index: usize) -> Result<&LayoutField, CodecError> {
    layout.fields().get(index).ok_or(CodecError::InvalidIndex { index, count: layout.fields().len() })
}

pub(crate) fn check_static_size(layout: &Layout, rep: Representation, len: usize) -> Result<(), CodecError> {
    let needed = layout.static_byte_size(rep);
    if len < needed {
        return Err(CodecError::InvalidArgument(format!(
            "buffer of {} bytes is smaller than the static size {} of {}",
            len,
            needed,
            layout.name()
        )));
    }
    Ok(())
}

/// Read-only view of the fixed fields of a layout over one buffer.
#[derive(Debug, Clone)]
pub struct StaticDecoder<'a> {
    layout: Arc<Layout>,
    buffer: &'a [u8],
    accessor: Accessor,
}

impl<'a> StaticDecoder<'a> {
    pub fn new(layout: Arc<Layout>, buffer: &'a [u8], rep: Representation) -> Self {
        StaticDecoder { layout, buffer, accessor: Accessor::for_representation(rep) }
    }

    /// Fails when the buffer is smaller than the static size of the view's representation.
    pub fn is_valid(&self) -> Result<(), CodecError> {
        check_static_size(&self.layout, self.accessor.representation(), self.buffer.len())
    }
}

impl ElementAccess for StaticDecoder<'_> {
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
        self.layout.fields().len()
    }

    fn element(&self, index: usize) -> Result<&LayoutField, CodecError> {
        static_element(&self.layout, index)
    }

    fn buffer_size(&self, rep: Representation) -> usize {
        self.layout.static_byte_size(rep)
    }

    fn accessor(&self) -> Accessor {
        self.accessor
    }
}

/// Read-write view of the fixed fields of a layout over one buffer.
#[derive(Debug)]
pub struct StaticCodec<'a> {
    layout: Arc<Layout>,
    buffer: &'a mut [u8],
    accessor: Accessor,
}

impl<'a> StaticCodec<'a> {
    pub fn new(layout: Arc<Layout>, buffer: &'a mut [u8], rep: Representation) -> Self {
        StaticCodec { layout, buffer, accessor: Accessor::for_representation(rep) }
    }

    pub fn is_valid(&self) -> Result<(), CodecError> {
        check_static_size(&self.layout, self.accessor.representation(), self.buffer.len())
    }
}

impl ElementAccess for StaticCodec<'_> {
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
        self.layout.fields().len()
    }

    fn element(&self, index: usize) -> Result<&LayoutField, CodecError> {
        static_element(&self.layout, index)
    }

    fn buffer_size(&self, rep: Representation) -> usize {
        self.layout.static_byte_size(rep)
    }

    fn accessor(&self) -> Accessor {
        self.accessor
    }
}

impl ElementAccessMut for StaticCodec<'_> {
    fn element_with_buffer_mut(&mut self, index: usize) -> Result<(&LayoutField, &mut [u8]), CodecError> {
        let field = static_element(&self.layout, index)?;
        Ok((field, &mut *self.buffer))
    }
}
