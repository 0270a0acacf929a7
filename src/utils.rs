//! Utility functions shared by the array engine and the record decoder

use crate::array::Array;
use crate::error::{ArrayError, Result};
use crate::storage::Storage;
use crate::types::{ByteOrder, DataType};
use bytes::Bytes;

/// Number of elements in an array of `shape`, failing on overflow
pub fn checked_size(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, &len| {
        acc.checked_mul(len).ok_or_else(|| {
            ArrayError::argument(format!("shape {:?} overflows the addressable range", shape))
        })
    })
}

/// Row-major strides for a dense array of `shape`, last dimension fastest
pub fn canonical_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![1isize; shape.len()];
    for dim in (0..shape.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * shape[dim + 1] as isize;
    }
    strides
}

/// Borrow exactly `N` bytes starting at `offset`
pub(crate) fn read_bytes<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            ArrayError::out_of_range(format!(
                "read of {} bytes at offset {} exceeds buffer of {} bytes",
                N,
                offset,
                buf.len()
            ))
        })
}

macro_rules! decode_fn {
    ($name:ident, $ty:ty, $n:literal) => {
        pub(crate) fn $name(buf: &[u8], offset: usize, order: ByteOrder) -> Result<$ty> {
            let raw = read_bytes::<$n>(buf, offset)?;
            Ok(match order {
                ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
            })
        }
    };
}

decode_fn!(decode_i16, i16, 2);
decode_fn!(decode_i32, i32, 4);
decode_fn!(decode_i64, i64, 8);
decode_fn!(decode_f32, f32, 4);
decode_fn!(decode_f64, f64, 8);

/// Decode `count` consecutive elements of `kind` starting at `offset`.
///
/// String and Structure kinds are not stored inline and are rejected here.
pub fn decode_storage(
    buf: &[u8],
    offset: usize,
    kind: DataType,
    count: usize,
    order: ByteOrder,
) -> Result<Storage> {
    let width = kind.size_in_bytes();
    let needed = count
        .checked_mul(width)
        .and_then(|n| n.checked_add(offset))
        .ok_or_else(|| ArrayError::argument("decode extent overflows"))?;
    if needed > buf.len() {
        return Err(ArrayError::out_of_range(format!(
            "decoding {} x {} at offset {} needs {} bytes, buffer has {}",
            count,
            kind,
            offset,
            needed,
            buf.len()
        )));
    }

    macro_rules! decode_all {
        ($variant:ident, $f:ident) => {
            Storage::$variant(
                (0..count)
                    .map(|i| $f(buf, offset + i * width, order))
                    .collect::<Result<Vec<_>>>()?,
            )
        };
    }

    let storage = match kind {
        DataType::Boolean => Storage::Boolean(buf[offset..needed].iter().map(|&b| b != 0).collect()),
        DataType::Byte => Storage::Byte(buf[offset..needed].iter().map(|&b| b as i8).collect()),
        DataType::Char => Storage::Char(buf[offset..needed].to_vec()),
        DataType::Short => decode_all!(Short, decode_i16),
        DataType::Int => decode_all!(Int, decode_i32),
        DataType::Long => decode_all!(Long, decode_i64),
        DataType::Float => decode_all!(Float, decode_f32),
        DataType::Double => decode_all!(Double, decode_f64),
        DataType::String | DataType::Structure | DataType::Opaque => {
            return Err(ArrayError::unsupported(format!(
                "{} elements have no fixed inline encoding",
                kind
            )))
        }
    };
    Ok(storage)
}

/// Decode a dense row-major blob of `Π shape` elements into an [`Array`]
pub fn decode_array(
    buf: &[u8],
    offset: usize,
    kind: DataType,
    shape: &[usize],
    order: ByteOrder,
) -> Result<Array> {
    let storage = decode_storage(buf, offset, kind, checked_size(shape)?, order)?;
    Array::factory_with_storage(shape, storage)
}

/// Encode a primitive storage vector as dense bytes in `order`
pub fn encode_storage(storage: &Storage, order: ByteOrder) -> Result<Bytes> {
    macro_rules! encode_all {
        ($values:expr) => {{
            let mut out = Vec::with_capacity(std::mem::size_of_val($values.as_slice()));
            for v in $values {
                match order {
                    ByteOrder::BigEndian => out.extend_from_slice(&v.to_be_bytes()),
                    ByteOrder::LittleEndian => out.extend_from_slice(&v.to_le_bytes()),
                }
            }
            out
        }};
    }

    let bytes = match storage {
        Storage::Boolean(v) => v.iter().map(|&b| b as u8).collect(),
        Storage::Byte(v) => v.iter().map(|&b| b as u8).collect(),
        Storage::Char(v) => v.clone(),
        Storage::Short(v) => encode_all!(v),
        Storage::Int(v) => encode_all!(v),
        Storage::Long(v) => encode_all!(v),
        Storage::Float(v) => encode_all!(v),
        Storage::Double(v) => encode_all!(v),
        Storage::String(_) | Storage::Opaque(_) => {
            return Err(ArrayError::unsupported(format!(
                "{} elements have no fixed inline encoding",
                storage.data_type()
            )))
        }
    };
    Ok(Bytes::from(bytes))
}

/// Text stored in a fixed-width CHAR field: bytes up to the first NUL
pub(crate) fn text_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
