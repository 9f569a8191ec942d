//! Field accessor strategies: how one field's raw value is read from and
//! written to a byte buffer in each representation.
//!
//! - **Deserialized**: byte-aligned, native width, native byte order. A get
//!   or set is a straight byte-range copy.
//! - **Serialized**: any start bit, any width up to 64 bits. Bits are numbered
//!   LSB-first inside each byte. The window is cut into 8-bit chunks by
//!   address; with little endian the lowest-address chunk is the least
//!   significant, with big endian it is the most significant (when the width
//!   is not a multiple of 8, the last chunk is the short one).
//!
//! The strategy is picked once per view ([`Accessor::for_representation`]).

use crate::codec::CodecError;
use crate::layout::{ByteOrder, LayoutField, Position, Representation};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian, NativeEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Deserialized,
    Serialized,
}

impl Accessor {
    pub fn for_representation(rep: Representation) -> Self {
        match rep {
            Representation::Deserialized => Accessor::Deserialized,
            Representation::Serialized => Accessor::Serialized,
        }
    }

    pub fn representation(self) -> Representation {
        match self {
            Accessor::Deserialized => Representation::Deserialized,
            Accessor::Serialized => Representation::Serialized,
        }
    }

    /// Read the field as a typed value.
    pub fn get_value(self, field: &LayoutField, buffer: &[u8]) -> Result<Value, CodecError> {
        let pos = field.position(self.representation());
        let raw = match self {
            Accessor::Deserialized => read_native(field, pos, buffer)?,
            Accessor::Serialized => read_serialized(field, pos, buffer)?,
        };
        Ok(Value::from_bits(field.scalar_type(), raw, pos.bit_size))
    }

    /// Write a typed value; it is converted to the field's type first.
    pub fn set_value(self, field: &LayoutField, buffer: &mut [u8], value: &Value) -> Result<(), CodecError> {
        let pos = field.position(self.representation());
        let raw = value.convert(field.scalar_type()).to_bits();
        match self {
            Accessor::Deserialized => write_native(field, pos, buffer, raw),
            Accessor::Serialized => write_serialized(field, pos, buffer, raw),
        }
    }

    /// Read the field into `out`, which must be exactly the native size of the field type.
    /// `out` receives the value in native byte order.
    pub fn get_raw(self, field: &LayoutField, buffer: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        let n = check_raw_len(field, out.len())?;
        let raw = self.get_value(field, buffer)?.to_bits();
        NativeEndian::write_uint(out, raw & low_mask(n * 8), n);
        Ok(())
    }

    /// Write native-order bytes of exactly the native size of the field type.
    pub fn set_raw(self, field: &LayoutField, buffer: &mut [u8], value: &[u8]) -> Result<(), CodecError> {
        let n = check_raw_len(field, value.len())?;
        let raw = NativeEndian::read_uint(value, n);
        let typed = Value::from_bits(field.scalar_type(), raw, n * 8);
        self.set_value(field, buffer, &typed)
    }
}

fn check_raw_len(field: &LayoutField, len: usize) -> Result<usize, CodecError> {
    let n = field.scalar_type().byte_size();
    if len != n {
        return Err(CodecError::InvalidArgument(format!(
            "{}: value size {} does not match {} ({} bytes)",
            field.name(),
            len,
            field.scalar_type(),
            n
        )));
    }
    Ok(n)
}

fn check_bounds(field: &LayoutField, pos: Position, buffer: &[u8]) -> Result<(), CodecError> {
    if pos.bit_size == 0 || pos.bit_size > 64 {
        return Err(CodecError::InvalidArgument(format!(
            "{}: unsupported bit size {}",
            field.name(),
            pos.bit_size
        )));
    }
    if pos.end() > buffer.len() * 8 {
        return Err(CodecError::InvalidArgument(format!(
            "{}: bits {}..{} exceed buffer of {} bytes",
            field.name(),
            pos.bit_offset,
            pos.end(),
            buffer.len()
        )));
    }
    Ok(())
}

fn native_window(field: &LayoutField, pos: Position, buffer: &[u8]) -> Result<(usize, usize), CodecError> {
    check_bounds(field, pos, buffer)?;
    if !pos.is_byte_aligned() || pos.bit_size % 8 != 0 {
        return Err(CodecError::Unexpected(format!(
            "{}: deserialized position {}+{} is not byte aligned",
            field.name(),
            pos.bit_offset,
            pos.bit_size
        )));
    }
    Ok((pos.bit_offset / 8, pos.bit_size / 8))
}

fn read_native(field: &LayoutField, pos: Position, buffer: &[u8]) -> Result<u64, CodecError> {
    let (start, n) = native_window(field, pos, buffer)?;
    Ok(NativeEndian::read_uint(&buffer[start..start + n], n))
}

fn write_native(field: &LayoutField, pos: Position, buffer: &mut [u8], raw: u64) -> Result<(), CodecError> {
    let (start, n) = native_window(field, pos, buffer)?;
    NativeEndian::write_uint(&mut buffer[start..start + n], raw & low_mask(n * 8), n);
    Ok(())
}

fn read_serialized(field: &LayoutField, pos: Position, buffer: &[u8]) -> Result<u64, CodecError> {
    check_bounds(field, pos, buffer)?;
    let stored = read_bit_window(buffer, pos.bit_offset, pos.bit_size);
    Ok(match field.byte_order {
        ByteOrder::LittleEndian => stored,
        ByteOrder::BigEndian => stored_to_big_endian(stored, pos.bit_size),
    })
}

fn write_serialized(field: &LayoutField, pos: Position, buffer: &mut [u8], raw: u64) -> Result<(), CodecError> {
    check_bounds(field, pos, buffer)?;
    let raw = raw & low_mask(pos.bit_size);
    let stored = match field.byte_order {
        ByteOrder::LittleEndian => raw,
        ByteOrder::BigEndian => big_endian_to_stored(raw, pos.bit_size),
    };
    write_bit_window(buffer, pos.bit_offset, pos.bit_size, stored);
    Ok(())
}

/// Mask of the low `bits` bits.
pub fn low_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Read `bit_size` bits starting at `bit_offset` (LSB-first numbering).
/// Bit 0 of the result is the first bit of the window. Caller checks bounds.
pub fn read_bit_window(data: &[u8], bit_offset: usize, bit_size: usize) -> u64 {
    let mut out = 0u64;
    let mut done = 0usize;
    let mut pos = bit_offset;
    while done < bit_size {
        let shift = pos % 8;
        let take = (8 - shift).min(bit_size - done);
        let bits = ((data[pos / 8] >> shift) as u64) & low_mask(take);
        out |= bits << done;
        done += take;
        pos += take;
    }
    out
}

/// Write the low `bit_size` bits of `value` at `bit_offset`, leaving all other bits untouched.
pub fn write_bit_window(data: &mut [u8], bit_offset: usize, bit_size: usize, value: u64) {
    let mut done = 0usize;
    let mut pos = bit_offset;
    while done < bit_size {
        let shift = pos % 8;
        let take = (8 - shift).min(bit_size - done);
        let mask = (low_mask(take) as u8) << shift;
        let bits = (((value >> done) & low_mask(take)) as u8) << shift;
        let byte = &mut data[pos / 8];
        *byte = (*byte & !mask) | bits;
        done += take;
        pos += take;
    }
}

/// Chunk widths of a window by address: all 8 except possibly the last.
fn chunk_width(index: usize, chunks: usize, bit_size: usize) -> usize {
    if index + 1 == chunks {
        bit_size - 8 * (chunks - 1)
    } else {
        8
    }
}

fn stored_to_big_endian(stored: u64, bit_size: usize) -> u64 {
    let chunks = bit_size.div_ceil(8);
    if bit_size % 8 == 0 {
        let mut b = [0u8; 8];
        LittleEndian::write_u64(&mut b, stored);
        return BigEndian::read_uint(&b[..chunks], chunks);
    }
    let mut out = 0u64;
    for k in 0..chunks {
        let w = chunk_width(k, chunks, bit_size);
        out = (out << w) | ((stored >> (8 * k)) & low_mask(w));
    }
    out
}

fn big_endian_to_stored(value: u64, bit_size: usize) -> u64 {
    let chunks = bit_size.div_ceil(8);
    if bit_size % 8 == 0 {
        let mut b = [0u8; 8];
        BigEndian::write_uint(&mut b[..chunks], value, chunks);
        return LittleEndian::read_u64(&b);
    }
    let mut out = 0u64;
    let mut remaining = bit_size;
    for k in 0..chunks {
        let w = chunk_width(k, chunks, bit_size);
        remaining -= w;
        out |= ((value >> remaining) & low_mask(w)) << (8 * k);
    }
    out
}
