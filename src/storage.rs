//! Backing buffers and the element trait binding Rust types to [`DataType`]

use crate::error::{ArrayError, Result};
use crate::types::{forbidden, DataType, Value};
use bytes::Bytes;

/// Flat backing buffer of an [`crate::Array`], one variant per element kind
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    Boolean(Vec<bool>),
    Byte(Vec<i8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    Opaque(Vec<Bytes>),
}

/// Apply `$body` to the vector inside any variant
macro_rules! with_storage {
    ($storage:expr, $v:ident => $body:expr) => {
        match $storage {
            Storage::Boolean($v) => $body,
            Storage::Byte($v) => $body,
            Storage::Char($v) => $body,
            Storage::Short($v) => $body,
            Storage::Int($v) => $body,
            Storage::Long($v) => $body,
            Storage::Float($v) => $body,
            Storage::Double($v) => $body,
            Storage::String($v) => $body,
            Storage::Opaque($v) => $body,
        }
    };
}

/// Build a new storage of the same variant from `$body`
macro_rules! map_storage {
    ($storage:expr, $v:ident => $body:expr) => {
        match $storage {
            Storage::Boolean($v) => Storage::Boolean($body),
            Storage::Byte($v) => Storage::Byte($body),
            Storage::Char($v) => Storage::Char($body),
            Storage::Short($v) => Storage::Short($body),
            Storage::Int($v) => Storage::Int($body),
            Storage::Long($v) => Storage::Long($body),
            Storage::Float($v) => Storage::Float($body),
            Storage::Double($v) => Storage::Double($body),
            Storage::String($v) => Storage::String($body),
            Storage::Opaque($v) => Storage::Opaque($body),
        }
    };
}

impl Storage {
    /// Zero-initialised storage of `len` elements
    pub fn zeroed(kind: DataType, len: usize) -> Result<Self> {
        let storage = match kind {
            DataType::Boolean => Storage::Boolean(vec![false; len]),
            DataType::Byte => Storage::Byte(vec![0; len]),
            DataType::Char => Storage::Char(vec![0; len]),
            DataType::Short => Storage::Short(vec![0; len]),
            DataType::Int => Storage::Int(vec![0; len]),
            DataType::Long => Storage::Long(vec![0; len]),
            DataType::Float => Storage::Float(vec![0.0; len]),
            DataType::Double => Storage::Double(vec![0.0; len]),
            DataType::String => Storage::String(vec![String::new(); len]),
            DataType::Opaque => Storage::Opaque(vec![Bytes::new(); len]),
            DataType::Structure => {
                return Err(ArrayError::unsupported(
                    "structure arrays are decoded from record buffers, not allocated",
                ))
            }
        };
        Ok(storage)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Storage::Boolean(_) => DataType::Boolean,
            Storage::Byte(_) => DataType::Byte,
            Storage::Char(_) => DataType::Char,
            Storage::Short(_) => DataType::Short,
            Storage::Int(_) => DataType::Int,
            Storage::Long(_) => DataType::Long,
            Storage::Float(_) => DataType::Float,
            Storage::Double(_) => DataType::Double,
            Storage::String(_) => DataType::String,
            Storage::Opaque(_) => DataType::Opaque,
        }
    }

    pub fn len(&self) -> usize {
        with_storage!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a raw buffer offset
    pub fn get(&self, offset: usize) -> Result<Value> {
        let len = self.len();
        let oob = || {
            ArrayError::out_of_range(format!("offset {} in buffer of {} elements", offset, len))
        };
        let value = match self {
            Storage::Boolean(v) => Value::Boolean(*v.get(offset).ok_or_else(oob)?),
            Storage::Byte(v) => Value::Byte(*v.get(offset).ok_or_else(oob)?),
            Storage::Char(v) => Value::Char(*v.get(offset).ok_or_else(oob)?),
            Storage::Short(v) => Value::Short(*v.get(offset).ok_or_else(oob)?),
            Storage::Int(v) => Value::Int(*v.get(offset).ok_or_else(oob)?),
            Storage::Long(v) => Value::Long(*v.get(offset).ok_or_else(oob)?),
            Storage::Float(v) => Value::Float(*v.get(offset).ok_or_else(oob)?),
            Storage::Double(v) => Value::Double(*v.get(offset).ok_or_else(oob)?),
            Storage::String(v) => Value::String(v.get(offset).ok_or_else(oob)?.clone()),
            Storage::Opaque(v) => Value::Opaque(v.get(offset).ok_or_else(oob)?.clone()),
        };
        Ok(value)
    }

    /// Store `value` at a raw buffer offset, converting it to this buffer's kind
    pub fn set(&mut self, offset: usize, value: &Value, unsigned: bool) -> Result<()> {
        let len = self.len();
        if offset >= len {
            return Err(ArrayError::out_of_range(format!(
                "offset {} in buffer of {} elements",
                offset, len
            )));
        }
        with_storage!(self, v => {
            v[offset] = Element::from_value(value, unsigned)?;
        });
        Ok(())
    }

    /// Copy the elements at `offsets`, in order, into a new buffer of the same kind
    pub fn gather(&self, offsets: impl Iterator<Item = usize>) -> Result<Storage> {
        let len = self.len();
        let check = |o: usize| {
            if o < len {
                Ok(o)
            } else {
                Err(ArrayError::out_of_range(format!(
                    "offset {} in buffer of {} elements",
                    o, len
                )))
            }
        };
        Ok(map_storage!(self, v => offsets
            .map(|o| check(o).map(|o| v[o].clone()))
            .collect::<Result<Vec<_>>>()?))
    }
}

/// Rust element types that back one [`DataType`].
///
/// Typed accessors on [`crate::Array`] are written once against this trait;
/// reading a `T` from an array of another kind converts through [`Value`].
pub trait Element: Clone + Send + Sync + 'static {
    /// Kind whose storage holds `Self` directly
    const DATA_TYPE: DataType;

    /// Wrap a vector as storage of kind [`Element::DATA_TYPE`]
    fn into_storage(values: Vec<Self>) -> Storage;

    /// Borrow the storage as `[Self]` when it has this element kind
    fn slice(storage: &Storage) -> Option<&[Self]>;

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]>;

    /// Convert a value of any kind into `Self`
    fn from_value(value: &Value, unsigned: bool) -> Result<Self>;

    fn into_value(self) -> Value;
}

macro_rules! numeric_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_storage(values: Vec<Self>) -> Storage {
                Storage::$variant(values)
            }

            fn slice(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }

            fn from_value(value: &Value, unsigned: bool) -> Result<Self> {
                value
                    .numeric(unsigned)
                    .map(|n| n.cast::<$ty>())
                    .ok_or_else(|| forbidden(value.data_type(), DataType::$variant))
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

numeric_element!(i8, Byte);
numeric_element!(u8, Char);
numeric_element!(i16, Short);
numeric_element!(i32, Int);
numeric_element!(i64, Long);
numeric_element!(f32, Float);
numeric_element!(f64, Double);

impl Element for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn into_storage(values: Vec<Self>) -> Storage {
        Storage::Boolean(values)
    }

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::Boolean(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::Boolean(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn from_value(value: &Value, _unsigned: bool) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| forbidden(value.data_type(), DataType::Boolean))
    }

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }
}

impl Element for String {
    const DATA_TYPE: DataType = DataType::String;

    fn into_storage(values: Vec<Self>) -> Storage {
        Storage::String(values)
    }

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::String(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::String(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn from_value(value: &Value, _unsigned: bool) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Char(c) => Ok((*c as char).to_string()),
            other => Err(forbidden(other.data_type(), DataType::String)),
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl Element for Bytes {
    const DATA_TYPE: DataType = DataType::Opaque;

    fn into_storage(values: Vec<Self>) -> Storage {
        Storage::Opaque(values)
    }

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::Opaque(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::Opaque(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn from_value(value: &Value, _unsigned: bool) -> Result<Self> {
        match value {
            Value::Opaque(b) => Ok(b.clone()),
            other => Err(forbidden(other.data_type(), DataType::Opaque)),
        }
    }

    fn into_value(self) -> Value {
        Value::Opaque(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let s = Storage::zeroed(DataType::Int, 4).unwrap();
        assert_eq!(s, Storage::Int(vec![0; 4]));
        assert_eq!(s.data_type(), DataType::Int);
        assert!(Storage::zeroed(DataType::Structure, 1).is_err());
    }

    #[test]
    fn test_get_set_converts() {
        let mut s = Storage::zeroed(DataType::Short, 3).unwrap();
        s.set(1, &Value::Double(12.9), false).unwrap();
        assert_eq!(s.get(1).unwrap(), Value::Short(12));
        assert!(s.set(3, &Value::Short(1), false).is_err());
        assert!(s.set(0, &Value::Boolean(true), false).is_err());
        assert!(s.get(3).is_err());
    }

    #[test]
    fn test_gather() {
        let s = Storage::String(vec!["a".into(), "b".into(), "c".into()]);
        let g = s.gather([2, 0].into_iter()).unwrap();
        assert_eq!(g, Storage::String(vec!["c".into(), "a".into()]));
        assert!(s.gather([5].into_iter()).is_err());
    }

    #[test]
    fn test_element_slices() {
        let s = f64::into_storage(vec![1.0, 2.0]);
        assert_eq!(f64::slice(&s), Some(&[1.0, 2.0][..]));
        assert!(f32::slice(&s).is_none());
        assert_eq!(
            u8::from_value(&Value::Byte(-1), true).unwrap(),
            255
        );
        assert_eq!(String::from_value(&Value::Char(b'x'), false).unwrap(), "x");
    }
}
