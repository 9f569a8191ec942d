//! By-name access on any view.
//!
//! Element names are full paths: `outer.inner.field`, with `[i]` after array
//! members (`items[2].x`). Lookups are linear over the element table, which
//! is in buffer order, so the elements of one struct or array are contiguous.

use crate::codec::{CodecError, ElementAccess, ElementAccessMut};
use crate::dump::format_value;
use crate::value::Value;

/// Index of the element named exactly `name`.
pub fn find_index<V: ElementAccess + ?Sized>(view: &V, name: &str) -> Result<usize, CodecError> {
    position(view, 0, |n| n == name).ok_or_else(|| CodecError::NotFound(name.to_string()))
}

/// Index of the first element of the struct at `path`.
pub fn find_struct_prefix<V: ElementAccess + ?Sized>(view: &V, path: &str) -> Result<usize, CodecError> {
    let prefix = format!("{}.", path);
    position(view, 0, |n| n.starts_with(&prefix)).ok_or_else(|| CodecError::NotFound(path.to_string()))
}

/// Index of the first element of the array at `path`.
pub fn find_array_prefix<V: ElementAccess + ?Sized>(view: &V, path: &str) -> Result<usize, CodecError> {
    let prefix = format!("{}[", path);
    position(view, 0, |n| n.starts_with(&prefix)).ok_or_else(|| CodecError::NotFound(path.to_string()))
}

/// First index at or after `start` that no longer belongs to the array at
/// `path`. `None` when the array runs to the end of the record.
pub fn find_array_end<V: ElementAccess + ?Sized>(view: &V, path: &str, start: usize) -> Option<usize> {
    let prefix = format!("{}[", path);
    position(view, start, |n| !n.starts_with(&prefix))
}

fn position<V, F>(view: &V, start: usize, mut pred: F) -> Option<usize>
where
    V: ElementAccess + ?Sized,
    F: FnMut(&str) -> bool,
{
    (start..view.element_count()).find(|&i| view.element(i).map(|f| pred(f.name())).unwrap_or(false))
}

pub fn get_value<V: ElementAccess + ?Sized>(view: &V, name: &str) -> Result<Value, CodecError> {
    let index = find_index(view, name)?;
    view.get_element_value(index)
}

pub fn set_value<V: ElementAccessMut + ?Sized>(view: &mut V, name: &str, value: &Value) -> Result<(), CodecError> {
    let index = find_index(view, name)?;
    view.set_element_value(index, value)
}

/// Enum entry name when the element has an enum table with a matching
/// entry, the plain value otherwise.
pub fn get_value_as_string<V: ElementAccess + ?Sized>(view: &V, name: &str) -> Result<String, CodecError> {
    let index = find_index(view, name)?;
    let value = view.get_element_value(index)?;
    Ok(format_value(&value, view.element(index)?.enum_table()))
}

/// Bytes taken by the array at `path` in the view's representation, padding included.
pub fn array_byte_size<V: ElementAccess + ?Sized>(view: &V, path: &str) -> Result<usize, CodecError> {
    let (start, end) = array_range(view, path)?;
    Ok(end - start)
}

/// Slice of the buffer holding the array at `path`.
pub fn array_address<'v, V: ElementAccess + ?Sized>(view: &'v V, path: &str) -> Result<&'v [u8], CodecError> {
    let (start, end) = array_range(view, path)?;
    Ok(&view.buffer()[start..end])
}

/// Buffer from the first byte of the struct at `path` to the end of the buffer.
pub fn struct_address<'v, V: ElementAccess + ?Sized>(view: &'v V, path: &str) -> Result<&'v [u8], CodecError> {
    let index = find_struct_prefix(view, path)?;
    let start = byte_offset(view, index)?;
    view.buffer()
        .get(start..)
        .ok_or_else(|| CodecError::InvalidArgument(format!("struct {} starts past the buffer", path)))
}

fn byte_offset<V: ElementAccess + ?Sized>(view: &V, index: usize) -> Result<usize, CodecError> {
    let field = view.element(index)?;
    let pos = field.position(view.representation());
    if !pos.is_byte_aligned() {
        return Err(CodecError::Unexpected(format!(
            "{} starts at bit {}, not on a byte boundary",
            field.name(),
            pos.bit_offset
        )));
    }
    Ok(pos.bit_offset / 8)
}

/// Byte range from the first array element to the element after the array
/// (or the end of the buffer when the array is last).
fn array_range<V: ElementAccess + ?Sized>(view: &V, path: &str) -> Result<(usize, usize), CodecError> {
    let first = find_array_prefix(view, path)?;
    let start = byte_offset(view, first)?;
    let end = match find_array_end(view, path, first) {
        Some(next) => byte_offset(view, next)?,
        None => view.buffer().len(),
    };
    if end < start || end > view.buffer().len() {
        return Err(CodecError::InvalidArgument(format!(
            "array {} spans bytes {}..{} of a {} byte buffer",
            path,
            start,
            end,
            view.buffer().len()
        )));
    }
    Ok((start, end))
}
