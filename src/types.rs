//! Core data types: element kinds, byte order and type-erased values

use crate::error::{ArrayError, Result};
use bytes::Bytes;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element kinds an array or record member can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Boolean, one byte per element in record layouts
    Boolean = 0,
    /// Signed 8-bit integer (unsigned when the array is tagged so)
    Byte = 1,
    /// 8-bit character, used for fixed-width text
    Char = 2,
    /// Signed 16-bit integer
    Short = 3,
    /// Signed 32-bit integer
    Int = 4,
    /// Signed 64-bit integer
    Long = 5,
    /// 32-bit floating point
    Float = 6,
    /// 64-bit floating point
    Double = 7,
    /// Variable-length text; a 4-byte string heap index in record layouts
    String = 8,
    /// Nested record, laid out by its own schema
    Structure = 9,
    /// Uninterpreted bytes
    Opaque = 10,
}

impl DataType {
    /// Size in bytes of one element of this kind in a record layout.
    ///
    /// Structure and Opaque sizes are defined by their schema, so this
    /// returns 0 for them.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Boolean | DataType::Byte | DataType::Char => 1,
            DataType::Short => 2,
            DataType::Int | DataType::Float | DataType::String => 4,
            DataType::Long | DataType::Double => 8,
            DataType::Structure | DataType::Opaque => 0,
        }
    }

    /// Check if this kind converts to and from numbers
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_float()
    }

    /// Check if this is an integer kind
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Char | DataType::Short | DataType::Int | DataType::Long
        )
    }

    /// Check if this is a floating point kind
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// Kinds whose arrays cannot be subset into views
    pub fn is_variable_length(&self) -> bool {
        matches!(self, DataType::Opaque | DataType::Structure)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::Byte => "byte",
            DataType::Char => "char",
            DataType::Short => "short",
            DataType::Int => "int",
            DataType::Long => "long",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "String",
            DataType::Structure => "Structure",
            DataType::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Byte order of multi-byte values in a binary buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// Byte order of the running platform
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }
}

/// Numeric payload of a [`Value`] after widening
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Numeric {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Numeric {
    /// Convert with `as` semantics: truncation on narrowing, saturation from floats.
    pub(crate) fn cast<T>(self) -> T
    where
        T: Copy + 'static,
        i64: AsPrimitive<T>,
        u64: AsPrimitive<T>,
        f64: AsPrimitive<T>,
    {
        match self {
            Numeric::Signed(v) => v.as_(),
            Numeric::Unsigned(v) => v.as_(),
            Numeric::Float(v) => v.as_(),
        }
    }
}

/// A single element of any kind, used where the static element type is unknown
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Byte(i8),
    Char(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Opaque(Bytes),
}

impl Value {
    /// Kind of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Byte(_) => DataType::Byte,
            Value::Char(_) => DataType::Char,
            Value::Short(_) => DataType::Short,
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Opaque(_) => DataType::Opaque,
        }
    }

    /// Widen an integral or floating value. `unsigned` reinterprets the
    /// integer bits as unsigned before widening.
    pub(crate) fn numeric(&self, unsigned: bool) -> Option<Numeric> {
        let n = match *self {
            Value::Byte(v) if unsigned => Numeric::Unsigned(v as u8 as u64),
            Value::Byte(v) => Numeric::Signed(v as i64),
            Value::Char(v) => Numeric::Unsigned(v as u64),
            Value::Short(v) if unsigned => Numeric::Unsigned(v as u16 as u64),
            Value::Short(v) => Numeric::Signed(v as i64),
            Value::Int(v) if unsigned => Numeric::Unsigned(v as u32 as u64),
            Value::Int(v) => Numeric::Signed(v as i64),
            Value::Long(v) if unsigned => Numeric::Unsigned(v as u64),
            Value::Long(v) => Numeric::Signed(v),
            Value::Float(v) => Numeric::Float(v as f64),
            Value::Double(v) => Numeric::Float(v),
            Value::Boolean(_) | Value::String(_) | Value::Opaque(_) => return None,
        };
        Some(n)
    }

    /// Widen to `f64`, honoring the unsigned interpretation of integer kinds
    pub fn to_f64(&self, unsigned: bool) -> Result<f64> {
        self.numeric(unsigned)
            .map(Numeric::cast::<f64>)
            .ok_or_else(|| forbidden(self.data_type(), DataType::Double))
    }

    /// Widen to `i64`, honoring the unsigned interpretation of integer kinds
    pub fn to_i64(&self, unsigned: bool) -> Result<i64> {
        self.numeric(unsigned)
            .map(Numeric::cast::<i64>)
            .ok_or_else(|| forbidden(self.data_type(), DataType::Long))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

pub(crate) fn forbidden(from: DataType, to: DataType) -> ArrayError {
    ArrayError::argument(format!("cannot convert {} to {}", from, to))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", *v as char),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Opaque(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}
