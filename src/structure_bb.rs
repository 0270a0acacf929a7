//! ArrayStructureBB - an array of fixed-size records decoded straight out of
//! a byte buffer.
//!
//! The field at `(record, member)` lives at
//! `base_offset + record * structure_size + member.byte_offset`.
//! Nested record members are exposed as further `ArrayStructureBB` views over
//! the same [`Bytes`] buffer, shifted to the sub-record, so nothing is copied.
//!
//! Byte order is resolved per read (member override, else the array's
//! order) and passed down to the decoder; the shared buffer carries no
//! order state, so concurrent decodes of differently ordered members are
//! safe.

use crate::array::Array;
use crate::error::{ArrayError, Result};
use crate::storage::{Element, Storage};
use crate::structure::{Member, StructureMembers};
use crate::types::{ByteOrder, DataType, Value};
use crate::utils::{self, checked_size, decode_array, decode_storage, text_until_nul};
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;

/// Array of records backed by a byte buffer
#[derive(Debug, Clone)]
pub struct ArrayStructureBB {
    members: Arc<StructureMembers>,
    shape: Vec<usize>,
    record_count: usize,
    buffer: Bytes,
    base_offset: usize,
    structure_size: usize,
    byte_order: ByteOrder,
    heap: Arc<RwLock<Vec<String>>>,
}

impl ArrayStructureBB {
    /// Decode `Π shape` records of `members` starting at `base_offset`.
    ///
    /// The schema must have its record size set, and the buffer must hold
    /// every record.
    pub fn new(
        members: StructureMembers,
        shape: &[usize],
        buffer: Bytes,
        base_offset: usize,
    ) -> Result<Self> {
        let structure_size = members.validate()?;
        Self::build(
            Arc::new(members),
            shape,
            buffer,
            base_offset,
            structure_size,
            ByteOrder::default(),
            Arc::new(RwLock::new(Vec::new())),
        )
    }

    fn build(
        members: Arc<StructureMembers>,
        shape: &[usize],
        buffer: Bytes,
        base_offset: usize,
        structure_size: usize,
        byte_order: ByteOrder,
        heap: Arc<RwLock<Vec<String>>>,
    ) -> Result<Self> {
        let record_count = checked_size(shape)?;
        let end = record_count
            .checked_mul(structure_size)
            .and_then(|n| n.checked_add(base_offset))
            .ok_or_else(|| ArrayError::argument("record extent overflows"))?;
        if end > buffer.len() {
            return Err(ArrayError::argument(format!(
                "{} records of {} bytes at offset {} need {} bytes, buffer has {}",
                record_count,
                structure_size,
                base_offset,
                end,
                buffer.len()
            )));
        }
        Ok(Self {
            members,
            shape: shape.to_vec(),
            record_count,
            buffer,
            base_offset,
            structure_size,
            byte_order,
            heap,
        })
    }

    /// Default byte order for members without an override
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn members(&self) -> &StructureMembers {
        &self.members
    }

    /// Look up a member of this array's schema by name
    pub fn member(&self, name: &str) -> Result<&Member> {
        self.members.member(name)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn structure_size(&self) -> usize {
        self.structure_size
    }

    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    /// The whole backing buffer
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// The bytes of one record, sharing the backing buffer
    pub fn record_bytes(&self, record: usize) -> Result<Bytes> {
        let start = self.record_start(record)?;
        Ok(self.buffer.slice(start..start + self.structure_size))
    }

    fn record_start(&self, record: usize) -> Result<usize> {
        if record >= self.record_count {
            return Err(ArrayError::out_of_range(format!(
                "record {} of {}",
                record, self.record_count
            )));
        }
        Ok(self.base_offset + record * self.structure_size)
    }

    /// Buffer position of a member within a record
    pub fn field_offset(&self, record: usize, member: &Member) -> Result<usize> {
        let end = member
            .byte_offset
            .checked_add(member.byte_extent()?)
            .ok_or_else(|| {
                ArrayError::argument(format!("member '{}' offset overflows", member.name))
            })?;
        if end > self.structure_size {
            return Err(ArrayError::argument(format!(
                "member '{}' extends past the {}-byte record",
                member.name, self.structure_size
            )));
        }
        Ok(self.record_start(record)? + member.byte_offset)
    }

    fn order(&self, member: &Member) -> ByteOrder {
        member.byte_order.unwrap_or(self.byte_order)
    }

    fn expect_kind(member: &Member, kind: DataType) -> Result<()> {
        if member.data_type != kind {
            return Err(ArrayError::argument(format!(
                "member '{}' is {}, not {}",
                member.name, member.data_type, kind
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // String heap

    /// Append a string and return its heap index. The heap never shrinks.
    pub fn add_string_to_heap(&self, s: impl Into<String>) -> usize {
        let mut heap = self.heap.write();
        heap.push(s.into());
        heap.len() - 1
    }

    pub fn heap_len(&self) -> usize {
        self.heap.read().len()
    }

    fn heap_string(&self, index: i32) -> Result<String> {
        let heap = self.heap.read();
        usize::try_from(index)
            .ok()
            .and_then(|i| heap.get(i).cloned())
            .ok_or_else(|| {
                ArrayError::out_of_range(format!(
                    "string heap index {} of {}",
                    index,
                    heap.len()
                ))
            })
    }

    // ------------------------------------------------------------------
    // Scalar getters

    fn scalar<T: Element>(&self, record: usize, member: &Member) -> Result<T> {
        Self::expect_kind(member, T::DATA_TYPE)?;
        let offset = self.field_offset(record, member)?;
        let storage = decode_storage(&self.buffer, offset, T::DATA_TYPE, 1, self.order(member))?;
        T::slice(&storage)
            .and_then(|s| s.first().cloned())
            .ok_or_else(|| ArrayError::argument(format!("member '{}' is empty", member.name)))
    }

    pub fn get_scalar_f64(&self, record: usize, member: &Member) -> Result<f64> {
        Self::expect_kind(member, DataType::Double)?;
        utils::decode_f64(&self.buffer, self.field_offset(record, member)?, self.order(member))
    }

    pub fn get_scalar_f32(&self, record: usize, member: &Member) -> Result<f32> {
        Self::expect_kind(member, DataType::Float)?;
        utils::decode_f32(&self.buffer, self.field_offset(record, member)?, self.order(member))
    }

    pub fn get_scalar_i64(&self, record: usize, member: &Member) -> Result<i64> {
        Self::expect_kind(member, DataType::Long)?;
        utils::decode_i64(&self.buffer, self.field_offset(record, member)?, self.order(member))
    }

    pub fn get_scalar_i32(&self, record: usize, member: &Member) -> Result<i32> {
        Self::expect_kind(member, DataType::Int)?;
        utils::decode_i32(&self.buffer, self.field_offset(record, member)?, self.order(member))
    }

    pub fn get_scalar_i16(&self, record: usize, member: &Member) -> Result<i16> {
        Self::expect_kind(member, DataType::Short)?;
        utils::decode_i16(&self.buffer, self.field_offset(record, member)?, self.order(member))
    }

    pub fn get_scalar_i8(&self, record: usize, member: &Member) -> Result<i8> {
        self.scalar(record, member)
    }

    pub fn get_scalar_char(&self, record: usize, member: &Member) -> Result<u8> {
        self.scalar(record, member)
    }

    pub fn get_scalar_bool(&self, record: usize, member: &Member) -> Result<bool> {
        self.scalar(record, member)
    }

    /// First element of any numeric member, widened to `f64`
    pub fn convert_scalar_f64(&self, record: usize, member: &Member) -> Result<f64> {
        self.first_value(record, member)?.to_f64(false)
    }

    /// First element of any integral member, widened to `i64`
    pub fn convert_scalar_i64(&self, record: usize, member: &Member) -> Result<i64> {
        self.first_value(record, member)?.to_i64(false)
    }

    fn first_value(&self, record: usize, member: &Member) -> Result<Value> {
        if !member.data_type.is_numeric() {
            return Err(ArrayError::argument(format!(
                "member '{}' of kind {} is not numeric",
                member.name, member.data_type
            )));
        }
        let offset = self.field_offset(record, member)?;
        decode_storage(&self.buffer, offset, member.data_type, 1, self.order(member))?.get(0)
    }

    /// Text of a CHAR member (up to its first NUL) or a STRING member (via
    /// the string heap)
    pub fn get_scalar_string(&self, record: usize, member: &Member) -> Result<String> {
        let offset = self.field_offset(record, member)?;
        match member.data_type {
            DataType::Char => {
                let extent = member.byte_extent()?;
                Ok(text_until_nul(&self.buffer[offset..offset + extent]))
            }
            DataType::String => {
                let index = utils::decode_i32(&self.buffer, offset, self.order(member))?;
                self.heap_string(index)
            }
            other => Err(ArrayError::argument(format!(
                "member '{}' is {}, not text",
                member.name, other
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Array getters

    fn decode_member(&self, record: usize, member: &Member) -> Result<Storage> {
        let offset = self.field_offset(record, member)?;
        decode_storage(
            &self.buffer,
            offset,
            member.data_type,
            member.size()?,
            self.order(member),
        )
    }

    /// All elements of a member in one record, as a vector of `T`.
    ///
    /// `T` must match the member's kind.
    pub fn get_java_array<T: Element>(&self, record: usize, member: &Member) -> Result<Vec<T>> {
        Self::expect_kind(member, T::DATA_TYPE)?;
        let storage = self.decode_member(record, member)?;
        T::slice(&storage)
            .map(<[T]>::to_vec)
            .ok_or_else(|| ArrayError::argument(format!("member '{}' kind mismatch", member.name)))
    }

    pub fn get_java_array_f64(&self, record: usize, member: &Member) -> Result<Vec<f64>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_f32(&self, record: usize, member: &Member) -> Result<Vec<f32>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_i64(&self, record: usize, member: &Member) -> Result<Vec<i64>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_i32(&self, record: usize, member: &Member) -> Result<Vec<i32>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_i16(&self, record: usize, member: &Member) -> Result<Vec<i16>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_i8(&self, record: usize, member: &Member) -> Result<Vec<i8>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_char(&self, record: usize, member: &Member) -> Result<Vec<u8>> {
        self.get_java_array(record, member)
    }

    pub fn get_java_array_bool(&self, record: usize, member: &Member) -> Result<Vec<bool>> {
        self.get_java_array(record, member)
    }

    /// Texts of a CHAR or STRING member.
    ///
    /// A CHAR member's last dimension is the string length, so shape
    /// `[3, 8]` yields three strings; a STRING member yields one string per
    /// element.
    pub fn get_array_string(&self, record: usize, member: &Member) -> Result<Vec<String>> {
        let offset = self.field_offset(record, member)?;
        match member.data_type {
            DataType::Char => {
                let width = member.shape.last().copied().unwrap_or(1);
                let extent = member.byte_extent()?;
                if width == 0 {
                    return Ok(Vec::new());
                }
                Ok(self.buffer[offset..offset + extent]
                    .chunks(width)
                    .map(text_until_nul)
                    .collect())
            }
            DataType::String => {
                let order = self.order(member);
                (0..member.size()?)
                    .map(|i| self.heap_string(utils::decode_i32(&self.buffer, offset + 4 * i, order)?))
                    .collect()
            }
            other => Err(ArrayError::argument(format!(
                "member '{}' is {}, not text",
                member.name, other
            ))),
        }
    }

    /// A member's elements in one record as an [`Array`] of the member's shape.
    ///
    /// Opaque members come back as a rank-0 array holding a zero-copy slice
    /// of the buffer.
    pub fn get_array(&self, record: usize, member: &Member) -> Result<Array> {
        match member.data_type {
            DataType::Structure => Err(ArrayError::unsupported(format!(
                "member '{}' is a structure; use get_array_structure",
                member.name
            ))),
            DataType::String => {
                let strings = self.get_array_string(record, member)?;
                Array::from_vec(&member.shape, strings)
            }
            DataType::Opaque => {
                let offset = self.field_offset(record, member)?;
                let extent = member.byte_extent()?;
                Ok(Array::scalar(self.buffer.slice(offset..offset + extent)))
            }
            kind => {
                let offset = self.field_offset(record, member)?;
                decode_array(&self.buffer, offset, kind, &member.shape, self.order(member))
            }
        }
    }

    // ------------------------------------------------------------------
    // Nested records

    /// View of the nested records of a structure member, over the same buffer
    pub fn get_array_structure(&self, record: usize, member: &Member) -> Result<ArrayStructureBB> {
        Self::expect_kind(member, DataType::Structure)?;
        let nested = member.nested()?;
        let structure_size = nested.validate()?;
        let offset = self.field_offset(record, member)?;
        Self::build(
            Arc::new(nested.clone()),
            &member.shape,
            self.buffer.clone(),
            offset,
            structure_size,
            self.order(member),
            Arc::clone(&self.heap),
        )
    }

    /// The single nested record of a scalar structure member
    pub fn get_scalar_structure(&self, record: usize, member: &Member) -> Result<StructureData> {
        self.get_array_structure(record, member)?.get_structure(0)
    }

    /// View of one record with name-based member access
    pub fn get_structure(&self, record: usize) -> Result<StructureData> {
        self.record_start(record)?;
        Ok(StructureData {
            array: self.clone(),
            record,
        })
    }
}

/// One record of an [`ArrayStructureBB`]
#[derive(Debug, Clone)]
pub struct StructureData {
    array: ArrayStructureBB,
    record: usize,
}

impl StructureData {
    pub fn record(&self) -> usize {
        self.record
    }

    pub fn members(&self) -> &StructureMembers {
        self.array.members()
    }

    pub fn get_scalar_f64(&self, name: &str) -> Result<f64> {
        self.array.get_scalar_f64(self.record, self.array.member(name)?)
    }

    pub fn get_scalar_f32(&self, name: &str) -> Result<f32> {
        self.array.get_scalar_f32(self.record, self.array.member(name)?)
    }

    pub fn get_scalar_i64(&self, name: &str) -> Result<i64> {
        self.array.get_scalar_i64(self.record, self.array.member(name)?)
    }

    pub fn get_scalar_i32(&self, name: &str) -> Result<i32> {
        self.array.get_scalar_i32(self.record, self.array.member(name)?)
    }

    pub fn get_scalar_i16(&self, name: &str) -> Result<i16> {
        self.array.get_scalar_i16(self.record, self.array.member(name)?)
    }

    pub fn convert_scalar_f64(&self, name: &str) -> Result<f64> {
        self.array.convert_scalar_f64(self.record, self.array.member(name)?)
    }

    pub fn get_scalar_string(&self, name: &str) -> Result<String> {
        self.array.get_scalar_string(self.record, self.array.member(name)?)
    }

    pub fn get_array(&self, name: &str) -> Result<Array> {
        self.array.get_array(self.record, self.array.member(name)?)
    }

    pub fn get_scalar_structure(&self, name: &str) -> Result<StructureData> {
        self.array.get_scalar_structure(self.record, self.array.member(name)?)
    }

    pub fn get_array_structure(&self, name: &str) -> Result<ArrayStructureBB> {
        self.array.get_array_structure(self.record, self.array.member(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_doubles() -> StructureMembers {
        StructureMembers::new("pair")
            .with_member(Member::new("a", DataType::Double, &[]))
            .with_member(Member::new("b", DataType::Double, &[]).with_offset(8))
            .with_structure_size(16)
            .unwrap()
    }

    fn pair_buffer(records: usize) -> Bytes {
        let mut buf = Vec::new();
        for i in 0..records {
            buf.extend_from_slice(&(i as f64).to_be_bytes());
            buf.extend_from_slice(&(i as f64 * 10.0).to_be_bytes());
        }
        Bytes::from(buf)
    }

    #[test]
    fn test_record_positions() {
        let asbb = ArrayStructureBB::new(two_doubles(), &[3], pair_buffer(3), 0).unwrap();
        let b = asbb.member("b").unwrap().clone();
        assert_eq!(asbb.field_offset(2, &b).unwrap(), 2 * 16 + 8);
        assert_eq!(asbb.get_scalar_f64(2, &b).unwrap(), 20.0);
        let a = asbb.member("a").unwrap();
        assert_eq!(asbb.get_scalar_f64(1, a).unwrap(), 1.0);
        assert!(matches!(
            asbb.get_scalar_f64(3, a),
            Err(ArrayError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_buffer_too_small() {
        let err = ArrayStructureBB::new(two_doubles(), &[4], pair_buffer(3), 0).unwrap_err();
        assert!(matches!(err, ArrayError::Argument(_)));
        let unsized_schema =
            StructureMembers::new("s").with_member(Member::new("a", DataType::Int, &[]));
        assert!(ArrayStructureBB::new(unsized_schema, &[1], pair_buffer(1), 0).is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let asbb = ArrayStructureBB::new(two_doubles(), &[1], pair_buffer(1), 0).unwrap();
        let a = asbb.member("a").unwrap();
        assert!(matches!(
            asbb.get_scalar_f32(0, a),
            Err(ArrayError::Argument(_))
        ));
        assert!(asbb.get_java_array_i32(0, a).is_err());
        assert_eq!(asbb.convert_scalar_f64(0, a).unwrap(), 0.0);
    }

    #[test]
    fn test_char_member_stops_at_nul() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("name", DataType::Char, &[5]))
            .with_structure_size(5)
            .unwrap();
        let asbb = ArrayStructureBB::new(schema, &[1], Bytes::from_static(b"ab\0\0\0"), 0).unwrap();
        let name = asbb.member("name").unwrap();
        assert_eq!(asbb.get_scalar_string(0, name).unwrap(), "ab");
        assert_eq!(asbb.get_java_array_char(0, name).unwrap(), b"ab\0\0\0".to_vec());
    }

    #[test]
    fn test_char_matrix_strings() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("tags", DataType::Char, &[2, 3]))
            .with_structure_size(6)
            .unwrap();
        let asbb = ArrayStructureBB::new(schema, &[1], Bytes::from_static(b"ab\0xyz"), 0).unwrap();
        let tags = asbb.member("tags").unwrap();
        assert_eq!(asbb.get_array_string(0, tags).unwrap(), vec!["ab", "xyz"]);
    }

    #[test]
    fn test_string_heap() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("label", DataType::String, &[]))
            .with_member(Member::new("alts", DataType::String, &[2]).with_offset(4))
            .with_structure_size(12)
            .unwrap();
        let mut buf = Vec::new();
        for idx in [1i32, 0, 2] {
            buf.extend_from_slice(&idx.to_be_bytes());
        }
        let asbb = ArrayStructureBB::new(schema, &[1], Bytes::from(buf), 0).unwrap();
        assert_eq!(asbb.add_string_to_heap("zero"), 0);
        assert_eq!(asbb.add_string_to_heap("one"), 1);
        assert_eq!(asbb.add_string_to_heap("two"), 2);
        assert_eq!(asbb.heap_len(), 3);

        let label = asbb.member("label").unwrap();
        assert_eq!(asbb.get_scalar_string(0, label).unwrap(), "one");
        let alts = asbb.member("alts").unwrap();
        assert_eq!(asbb.get_array_string(0, alts).unwrap(), vec!["zero", "two"]);
        let arr = asbb.get_array(0, alts).unwrap();
        assert_eq!(arr.get_string(&[1]).unwrap(), "two");
    }

    #[test]
    fn test_dangling_heap_index() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("label", DataType::String, &[]))
            .with_structure_size(4)
            .unwrap();
        let asbb =
            ArrayStructureBB::new(schema, &[1], Bytes::from(7i32.to_be_bytes().to_vec()), 0).unwrap();
        let label = asbb.member("label").unwrap();
        assert!(matches!(
            asbb.get_scalar_string(0, label),
            Err(ArrayError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_byte_order_override() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("be", DataType::Int, &[]))
            .with_member(
                Member::new("le", DataType::Int, &[])
                    .with_offset(4)
                    .with_byte_order(ByteOrder::LittleEndian),
            )
            .with_structure_size(8)
            .unwrap();
        let mut buf = 258i32.to_be_bytes().to_vec();
        buf.extend_from_slice(&258i32.to_le_bytes());
        let asbb = ArrayStructureBB::new(schema, &[1], Bytes::from(buf), 0).unwrap();
        let be = asbb.member("be").unwrap();
        let le = asbb.member("le").unwrap();
        assert_eq!(asbb.get_scalar_i32(0, be).unwrap(), 258);
        assert_eq!(asbb.get_scalar_i32(0, le).unwrap(), 258);
        // reading the override does not change later reads of other members
        assert_eq!(asbb.get_scalar_i32(0, be).unwrap(), 258);
        assert_eq!(asbb.byte_order(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_primitive_arrays() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("v", DataType::Short, &[2, 2]))
            .with_structure_size(8)
            .unwrap();
        let mut buf = Vec::new();
        for v in [1i16, -2, 3, -4] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let asbb = ArrayStructureBB::new(schema, &[1], Bytes::from(buf), 0)
            .unwrap()
            .with_byte_order(ByteOrder::LittleEndian);
        let v = asbb.member("v").unwrap();
        assert_eq!(asbb.get_java_array_i16(0, v).unwrap(), vec![1, -2, 3, -4]);
        let arr = asbb.get_array(0, v).unwrap();
        assert_eq!(arr.shape(), &[2, 2]);
        assert_eq!(arr.get_i16(&[1, 0]).unwrap(), 3);
    }

    #[test]
    fn test_nested_structure_view() {
        let inner = StructureMembers::new("inner")
            .with_member(Member::new("x", DataType::Int, &[]))
            .with_structure_size(4)
            .unwrap();
        let outer = StructureMembers::new("outer")
            .with_member(Member::new("id", DataType::Short, &[]))
            .with_member(Member::structure("pts", inner, &[2]).with_offset(2))
            .with_structure_size(10)
            .unwrap();
        let mut buf = Vec::new();
        for rec in 0..2i32 {
            buf.extend_from_slice(&(rec as i16).to_be_bytes());
            buf.extend_from_slice(&(rec * 100 + 1).to_be_bytes());
            buf.extend_from_slice(&(rec * 100 + 2).to_be_bytes());
        }
        let asbb = ArrayStructureBB::new(outer, &[2], Bytes::from(buf), 0).unwrap();
        let pts_member = asbb.member("pts").unwrap();
        let pts = asbb.get_array_structure(1, pts_member).unwrap();
        assert_eq!(pts.record_count(), 2);
        assert_eq!(pts.base_offset(), 12);
        assert_eq!(pts.buffer().as_ptr(), asbb.buffer().as_ptr());
        let x = pts.member("x").unwrap();
        assert_eq!(pts.get_scalar_i32(1, x).unwrap(), 102);

        let rec = asbb.get_structure(0).unwrap();
        assert_eq!(rec.get_scalar_i16("id").unwrap(), 0);
        let nested = rec.get_array_structure("pts").unwrap();
        assert_eq!(nested.get_structure(0).unwrap().get_scalar_i32("x").unwrap(), 1);
        assert!(asbb.get_array(0, pts_member).is_err());
    }

    #[test]
    fn test_nested_views_share_heap() {
        let inner = StructureMembers::new("inner")
            .with_member(Member::new("s", DataType::String, &[]))
            .with_structure_size(4)
            .unwrap();
        let outer = StructureMembers::new("outer")
            .with_member(Member::structure("in", inner, &[]))
            .with_structure_size(4)
            .unwrap();
        let asbb =
            ArrayStructureBB::new(outer, &[1], Bytes::from(0i32.to_be_bytes().to_vec()), 0).unwrap();
        asbb.add_string_to_heap("shared");
        let rec = asbb.get_structure(0).unwrap();
        let inner = rec.get_scalar_structure("in").unwrap();
        assert_eq!(inner.get_scalar_string("s").unwrap(), "shared");
    }

    #[test]
    fn test_opaque_member_is_zero_copy() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("blob", DataType::Opaque, &[3]).with_offset(1))
            .with_structure_size(4)
            .unwrap();
        let asbb = ArrayStructureBB::new(schema, &[1], Bytes::from_static(b"\x09abc"), 0).unwrap();
        let blob = asbb.member("blob").unwrap();
        let arr = asbb.get_array(0, blob).unwrap();
        assert_eq!(arr.rank(), 0);
        assert_eq!(
            arr.get_value(&[]).unwrap(),
            Value::Opaque(Bytes::from_static(b"abc"))
        );
        assert_eq!(asbb.record_bytes(0).unwrap().len(), 4);
    }

    #[test]
    fn test_member_offset_overflow_is_an_error() {
        let asbb = ArrayStructureBB::new(two_doubles(), &[1], pair_buffer(1), 0).unwrap();
        let far = Member::new("far", DataType::Int, &[]).with_offset(usize::MAX);
        assert!(matches!(
            asbb.get_scalar_i32(0, &far),
            Err(ArrayError::Argument(_))
        ));
        let huge = Member::new("huge", DataType::Double, &[usize::MAX, 2]);
        assert!(matches!(
            asbb.get_java_array_f64(0, &huge),
            Err(ArrayError::Argument(_))
        ));
        assert!(asbb.get_array(0, &huge).is_err());
        assert!(!huge.is_scalar());
    }

    #[test]
    fn test_nested_member_byte_order() {
        let inner = StructureMembers::new("inner")
            .with_member(Member::new("v", DataType::Int, &[]))
            .with_member(
                Member::new("w", DataType::Int, &[])
                    .with_offset(4)
                    .with_byte_order(ByteOrder::BigEndian),
            )
            .with_structure_size(8)
            .unwrap();
        let outer = StructureMembers::new("outer")
            .with_member(
                Member::structure("le", inner, &[]).with_byte_order(ByteOrder::LittleEndian),
            )
            .with_structure_size(8)
            .unwrap();
        let mut buf = 7i32.to_le_bytes().to_vec();
        buf.extend_from_slice(&9i32.to_be_bytes());
        let asbb = ArrayStructureBB::new(outer, &[1], Bytes::from(buf), 0).unwrap();
        let nested = asbb.get_structure(0).unwrap().get_scalar_structure("le").unwrap();
        assert_eq!(nested.get_scalar_i32("v").unwrap(), 7);
        assert_eq!(nested.get_scalar_i32("w").unwrap(), 9);
    }

    #[test]
    fn test_concurrent_mixed_order_decoding() {
        let schema = StructureMembers::new("s")
            .with_member(Member::new("be", DataType::Long, &[]))
            .with_member(
                Member::new("le", DataType::Long, &[])
                    .with_offset(8)
                    .with_byte_order(ByteOrder::LittleEndian),
            )
            .with_structure_size(16)
            .unwrap();
        let mut buf = Vec::new();
        for i in 0..64i64 {
            buf.extend_from_slice(&i.to_be_bytes());
            buf.extend_from_slice(&(-i).to_le_bytes());
        }
        let asbb = ArrayStructureBB::new(schema, &[64], Bytes::from(buf), 0).unwrap();
        std::thread::scope(|scope| {
            for name in ["be", "le"] {
                let asbb = &asbb;
                scope.spawn(move || {
                    let m = asbb.member(name).unwrap();
                    for _ in 0..50 {
                        for r in 0..64 {
                            let v = asbb.get_scalar_i64(r, m).unwrap();
                            let expected = if name == "be" { r as i64 } else { -(r as i64) };
                            assert_eq!(v, expected);
                        }
                    }
                });
            }
        });
    }
}
