//! Scalar types and the runtime values moved in and out of fields.

use std::fmt;

/// Primitive kind of a field, with its native (deserialized) width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// Resolve a type name as found in type descriptions.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "tBool" | "bool" => ScalarType::Bool,
            "tChar" | "tInt8" | "int8_t" | "char" => ScalarType::I8,
            "tUInt8" | "uint8_t" => ScalarType::U8,
            "tInt16" | "int16_t" => ScalarType::I16,
            "tUInt16" | "uint16_t" => ScalarType::U16,
            "tInt32" | "int32_t" => ScalarType::I32,
            "tUInt32" | "uint32_t" => ScalarType::U32,
            "tInt64" | "int64_t" => ScalarType::I64,
            "tUInt64" | "uint64_t" => ScalarType::U64,
            "tFloat32" | "float" => ScalarType::F32,
            "tFloat64" | "double" => ScalarType::F64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "tBool",
            ScalarType::I8 => "tInt8",
            ScalarType::U8 => "tUInt8",
            ScalarType::I16 => "tInt16",
            ScalarType::U16 => "tUInt16",
            ScalarType::I32 => "tInt32",
            ScalarType::U32 => "tUInt32",
            ScalarType::I64 => "tInt64",
            ScalarType::U64 => "tUInt64",
            ScalarType::F32 => "tFloat32",
            ScalarType::F64 => "tFloat64",
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    pub fn bit_size(self) -> usize {
        self.byte_size() * 8
    }

    pub fn is_signed(self) -> bool {
        matches!(self, ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed field value (the tagged-union side of get/set).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
}

impl Value {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::Bool(_) => ScalarType::Bool,
            Value::U8(_) => ScalarType::U8,
            Value::U16(_) => ScalarType::U16,
            Value::U32(_) => ScalarType::U32,
            Value::U64(_) => ScalarType::U64,
            Value::I8(_) => ScalarType::I8,
            Value::I16(_) => ScalarType::I16,
            Value::I32(_) => ScalarType::I32,
            Value::I64(_) => ScalarType::I64,
            Value::Float(_) => ScalarType::F32,
            Value::Double(_) => ScalarType::F64,
        }
    }

    /// Unsigned view; `None` for negative or non-integer values.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Bool(x) => Some(*x as u64),
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) => {
                self.as_i64().and_then(|v| u64::try_from(v).ok())
            }
            Value::Float(_) | Value::Double(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(x) => Some(*x as i64),
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => i64::try_from(*x).ok(),
            Value::Float(_) | Value::Double(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(x) => Some(*x),
            _ => None,
        }
    }

    /// Raw bit pattern: integers two's complement in 64 bits, floats via `to_bits`.
    pub fn to_bits(&self) -> u64 {
        match *self {
            Value::Bool(x) => x as u64,
            Value::U8(x) => x as u64,
            Value::U16(x) => x as u64,
            Value::U32(x) => x as u64,
            Value::U64(x) => x,
            Value::I8(x) => x as i64 as u64,
            Value::I16(x) => x as i64 as u64,
            Value::I32(x) => x as i64 as u64,
            Value::I64(x) => x as u64,
            Value::Float(x) => x.to_bits() as u64,
            Value::Double(x) => x.to_bits(),
        }
    }

    /// Rebuild a value of `ty` from the low `bits` of `raw`.
    /// Signed integers narrower than their native width are sign-extended.
    pub fn from_bits(ty: ScalarType, raw: u64, bits: usize) -> Value {
        let signed = if ty.is_signed() && bits > 0 && bits < 64 {
            sign_extend(raw, bits)
        } else {
            raw as i64
        };
        match ty {
            ScalarType::Bool => Value::Bool(raw != 0),
            ScalarType::U8 => Value::U8(raw as u8),
            ScalarType::U16 => Value::U16(raw as u16),
            ScalarType::U32 => Value::U32(raw as u32),
            ScalarType::U64 => Value::U64(raw),
            ScalarType::I8 => Value::I8(signed as i8),
            ScalarType::I16 => Value::I16(signed as i16),
            ScalarType::I32 => Value::I32(signed as i32),
            ScalarType::I64 => Value::I64(signed),
            ScalarType::F32 => Value::Float(f32::from_bits(raw as u32)),
            ScalarType::F64 => Value::Double(f64::from_bits(raw)),
        }
    }

    /// Numeric conversion to another scalar type (`as` semantics).
    pub fn convert(&self, ty: ScalarType) -> Value {
        if self.scalar_type() == ty {
            return *self;
        }
        match *self {
            Value::Float(x) => Value::from_f64(ty, x as f64),
            Value::Double(x) => Value::from_f64(ty, x),
            _ => {
                // every integer and bool fits in i128
                let n: i128 = match *self {
                    Value::U64(x) => x as i128,
                    _ => self.as_i64().unwrap_or(0) as i128,
                };
                match ty {
                    ScalarType::Bool => Value::Bool(n != 0),
                    ScalarType::U8 => Value::U8(n as u8),
                    ScalarType::U16 => Value::U16(n as u16),
                    ScalarType::U32 => Value::U32(n as u32),
                    ScalarType::U64 => Value::U64(n as u64),
                    ScalarType::I8 => Value::I8(n as i8),
                    ScalarType::I16 => Value::I16(n as i16),
                    ScalarType::I32 => Value::I32(n as i32),
                    ScalarType::I64 => Value::I64(n as i64),
                    ScalarType::F32 => Value::Float(n as f32),
                    ScalarType::F64 => Value::Double(n as f64),
                }
            }
        }
    }

    fn from_f64(ty: ScalarType, x: f64) -> Value {
        match ty {
            ScalarType::Bool => Value::Bool(x != 0.0),
            ScalarType::U8 => Value::U8(x as u8),
            ScalarType::U16 => Value::U16(x as u16),
            ScalarType::U32 => Value::U32(x as u32),
            ScalarType::U64 => Value::U64(x as u64),
            ScalarType::I8 => Value::I8(x as i8),
            ScalarType::I16 => Value::I16(x as i16),
            ScalarType::I32 => Value::I32(x as i32),
            ScalarType::I64 => Value::I64(x as i64),
            ScalarType::F32 => Value::Float(x as f32),
            ScalarType::F64 => Value::Double(x),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(x) => write!(f, "{}", x),
            Value::U8(x) => write!(f, "{}", x),
            Value::U16(x) => write!(f, "{}", x),
            Value::U32(x) => write!(f, "{}", x),
            Value::U64(x) => write!(f, "{}", x),
            Value::I8(x) => write!(f, "{}", x),
            Value::I16(x) => write!(f, "{}", x),
            Value::I32(x) => write!(f, "{}", x),
            Value::I64(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
        }
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_narrow_values() {
        assert_eq!(sign_extend(0b111, 3), -1);
        assert_eq!(sign_extend(0b011, 3), 3);
        assert_eq!(sign_extend(0xff, 8), -1);
    }

    #[test]
    fn from_bits_sign_extends_signed_only() {
        assert_eq!(Value::from_bits(ScalarType::I16, 0xfff, 12), Value::I16(-1));
        assert_eq!(Value::from_bits(ScalarType::U16, 0xfff, 12), Value::U16(0xfff));
    }

    #[test]
    fn convert_between_kinds() {
        assert_eq!(Value::U64(300).convert(ScalarType::U8), Value::U8(44));
        assert_eq!(Value::Double(2.75).convert(ScalarType::I32), Value::I32(2));
        assert_eq!(Value::I8(-1).convert(ScalarType::I64), Value::I64(-1));
        assert_eq!(Value::U8(1).convert(ScalarType::Bool), Value::Bool(true));
    }
}
