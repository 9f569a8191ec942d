//! Conversion of a whole record between the two representations.

use crate::accessor::Accessor;
use crate::codec::{CodecError, ElementAccess};
use crate::layout::Representation;

/// Copy every element of `view` into `target`, laid out for `rep`.
///
/// `target` must hold at least `view.buffer_size(rep)` bytes. With `zero`
/// the used part is cleared first, so padding ends up as zeros; otherwise
/// bytes between fields keep their previous contents. Returns the number of
/// bytes the record takes in `rep`.
pub fn transform_to_buffer<V: ElementAccess + ?Sized>(
    view: &V,
    target: &mut [u8],
    rep: Representation,
    zero: bool,
) -> Result<usize, CodecError> {
    let size = view.buffer_size(rep);
    if target.len() < size {
        return Err(CodecError::InvalidArgument(format!(
            "target buffer of {} bytes is smaller than {} bytes needed for {}",
            target.len(),
            size,
            view.layout().name()
        )));
    }
    if zero {
        target[..size].fill(0);
    }
    let to = Accessor::for_representation(rep);
    for index in 0..view.element_count() {
        let field = view.element(index)?;
        let value = view.get_element_value(index)?;
        to.set_value(field, target, &value)?;
    }
    log::trace!(
        "{}: {} elements transformed {:?} -> {:?}",
        view.layout().name(),
        view.element_count(),
        view.representation(),
        rep
    );
    Ok(size)
}

/// Zero-filled buffer holding the record of `view` laid out for `rep`.
pub fn transform<V: ElementAccess + ?Sized>(view: &V, rep: Representation) -> Result<Vec<u8>, CodecError> {
    let mut out = vec![0u8; view.buffer_size(rep)];
    transform_to_buffer(view, &mut out, rep, false)?;
    Ok(out)
}
