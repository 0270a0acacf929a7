//! Array - a typed, strided view over a shared flat buffer.
//!
//! An [`Array`] pairs a backing [`Storage`] with an [`IndexCalculator`].
//! View operations (`section`, `slice`, `transpose`, `permute`, `flip`,
//! `reduce`) derive a new calculator and share the buffer, so a write
//! through any view is visible through every other view of the same
//! buffer. Materializing operations (`copy`, `reshape`, `to_vec`,
//! `to_ndarray`) allocate dense storage in canonical order.
//!
//! Cloning an `Array` clones the view, not the data.

use crate::error::{ArrayError, Result};
use crate::index::IndexCalculator;
use crate::iterator::IndexIterator;
use crate::section::Section;
use crate::storage::{Element, Storage};
use crate::types::{DataType, Value};
use crate::utils::checked_size;
use ndarray::{ArrayD, IxDyn};
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;

/// Typed multidimensional array view
#[derive(Debug, Clone)]
pub struct Array {
    data_type: DataType,
    index: IndexCalculator,
    storage: Arc<RwLock<Storage>>,
    unsigned: bool,
}

impl Array {
    /// Allocate a zero-filled array of `kind` and `shape`
    pub fn factory(kind: DataType, shape: &[usize]) -> Result<Self> {
        let index = IndexCalculator::factory(shape)?;
        let storage = Storage::zeroed(kind, index.size())?;
        Ok(Self::wrap(index, storage))
    }

    /// Wrap existing storage, which must hold exactly `Π shape` elements
    pub fn factory_with_storage(shape: &[usize], storage: Storage) -> Result<Self> {
        let size = checked_size(shape)?;
        if storage.len() != size {
            return Err(ArrayError::argument(format!(
                "storage length {} != shape {:?} size {}",
                storage.len(),
                shape,
                size
            )));
        }
        Ok(Self::wrap(IndexCalculator::factory(shape)?, storage))
    }

    /// Wrap a vector of elements of any supported Rust type
    pub fn from_vec<T: Element>(shape: &[usize], values: Vec<T>) -> Result<Self> {
        Self::factory_with_storage(shape, T::into_storage(values))
    }

    /// Rank-0 array holding one element
    pub fn scalar<T: Element>(value: T) -> Self {
        Self::wrap(
            IndexCalculator::scalar(),
            T::into_storage(vec![value]),
        )
    }

    /// Build an array of `kind` from type-erased values, converting each one
    pub fn make_from(kind: DataType, shape: &[usize], values: &[Value]) -> Result<Self> {
        let array = Self::factory(kind, shape)?;
        if values.len() != array.size() {
            return Err(ArrayError::argument(format!(
                "{} values for shape {:?}",
                values.len(),
                shape
            )));
        }
        {
            let mut storage = array.storage.write();
            for (offset, value) in values.iter().enumerate() {
                storage.set(offset, value, false)?;
            }
        }
        Ok(array)
    }

    /// Copy an `ndarray` array, in its logical order
    pub fn from_ndarray<T: Element>(source: &ArrayD<T>) -> Result<Self> {
        Self::from_vec(source.shape(), source.iter().cloned().collect())
    }

    fn wrap(index: IndexCalculator, storage: Storage) -> Self {
        Self {
            data_type: storage.data_type(),
            index,
            storage: Arc::new(RwLock::new(storage)),
            unsigned: false,
        }
    }

    // Same buffer, new calculator
    fn view(&self, index: IndexCalculator) -> Self {
        Self {
            data_type: self.data_type,
            index,
            storage: Arc::clone(&self.storage),
            unsigned: self.unsigned,
        }
    }

    /// Tag integer elements as unsigned. Only affects widening conversions.
    pub fn with_unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned && self.data_type.is_integral();
        self
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn rank(&self) -> usize {
        self.index.rank()
    }

    pub fn shape(&self) -> &[usize] {
        self.index.shape()
    }

    /// Number of elements in this view
    pub fn size(&self) -> usize {
        self.index.size()
    }

    pub fn index_calculator(&self) -> &IndexCalculator {
        &self.index
    }

    /// Read access to the whole backing buffer, shared with every view.
    ///
    /// The guard holds a read lock on that buffer. Writing through this or
    /// any other view on the same thread while the guard is alive
    /// deadlocks, so drop it before calling a setter.
    pub fn storage(&self) -> RwLockReadGuard<'_, Storage> {
        self.storage.read()
    }

    /// Check if both arrays are views of the same buffer
    pub fn shares_storage(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Fresh canonical-order iterator; take a new one for every pass
    pub fn index_iterator(&self) -> IndexIterator<'_> {
        IndexIterator::new(self)
    }

    // ------------------------------------------------------------------
    // Element access

    /// Element at a raw buffer offset
    pub fn get_value_at(&self, offset: usize) -> Result<Value> {
        self.storage.read().get(offset)
    }

    /// Store at a raw buffer offset, converting to this array's kind
    pub fn set_value_at(&self, offset: usize, value: &Value) -> Result<()> {
        self.storage.write().set(offset, value, false)
    }

    pub fn get_value(&self, index: &[usize]) -> Result<Value> {
        self.get_value_at(self.index.offset(index)?)
    }

    pub fn set_value(&self, index: &[usize], value: &Value) -> Result<()> {
        self.set_value_at(self.index.offset(index)?, value)
    }

    /// Read the element at a raw buffer offset as `T`, converting if the
    /// array holds another kind
    pub fn get_at<T: Element>(&self, offset: usize) -> Result<T> {
        let storage = self.storage.read();
        if let Some(values) = T::slice(&storage) {
            return values.get(offset).cloned().ok_or_else(|| {
                ArrayError::out_of_range(format!(
                    "offset {} in buffer of {} elements",
                    offset,
                    values.len()
                ))
            });
        }
        T::from_value(&storage.get(offset)?, self.unsigned)
    }

    /// Write `value` at a raw buffer offset, converting if the array holds
    /// another kind
    pub fn set_at<T: Element>(&self, offset: usize, value: T) -> Result<()> {
        let mut storage = self.storage.write();
        if let Some(values) = T::slice_mut(&mut storage) {
            let len = values.len();
            let slot = values.get_mut(offset).ok_or_else(|| {
                ArrayError::out_of_range(format!(
                    "offset {} in buffer of {} elements",
                    offset, len
                ))
            })?;
            *slot = value;
            return Ok(());
        }
        storage.set(offset, &value.into_value(), false)
    }

    /// Bounds-checked read by multi-index
    pub fn get<T: Element>(&self, index: &[usize]) -> Result<T> {
        self.get_at(self.index.offset(index)?)
    }

    /// Bounds-checked write by multi-index
    pub fn set<T: Element>(&self, index: &[usize], value: T) -> Result<()> {
        self.set_at(self.index.offset(index)?, value)
    }

    // ------------------------------------------------------------------
    // Views

    fn check_subsettable(&self) -> Result<()> {
        if self.data_type.is_variable_length() {
            return Err(ArrayError::unsupported(format!(
                "cannot subset an array of {} elements",
                self.data_type
            )));
        }
        Ok(())
    }

    /// Subset view; dimensions whose range has length 1 are dropped
    pub fn section(&self, section: &Section) -> Result<Array> {
        self.check_subsettable()?;
        Ok(self.view(self.index.section(section)?))
    }

    /// Subset view keeping every dimension
    pub fn section_no_reduce(&self, section: &Section) -> Result<Array> {
        self.check_subsettable()?;
        Ok(self.view(self.index.section_no_reduce(section)?))
    }

    /// View with dimension `dim` fixed at `value`; rank drops by one
    pub fn slice(&self, dim: usize, value: usize) -> Result<Array> {
        self.check_subsettable()?;
        Ok(self.view(self.index.slice(dim, value)?))
    }

    pub fn transpose(&self, d1: usize, d2: usize) -> Result<Array> {
        Ok(self.view(self.index.transpose(d1, d2)?))
    }

    pub fn permute(&self, perm: &[usize]) -> Result<Array> {
        Ok(self.view(self.index.permute(perm)?))
    }

    /// View traversing dimension `dim` backwards
    pub fn flip(&self, dim: usize) -> Result<Array> {
        Ok(self.view(self.index.flip(dim)?))
    }

    /// View without unit-length dimensions
    pub fn reduce(&self) -> Result<Array> {
        Ok(self.view(self.index.reduce()?))
    }

    pub fn reduce_dim(&self, dim: usize) -> Result<Array> {
        Ok(self.view(self.index.reduce_dim(dim)?))
    }

    // ------------------------------------------------------------------
    // Materializing operations

    fn gather(&self) -> Result<Storage> {
        self.storage.read().gather(self.index.offsets())
    }

    /// Dense copy in canonical order
    pub fn copy(&self) -> Result<Array> {
        let copied = Self::wrap(IndexCalculator::factory(self.shape())?, self.gather()?);
        Ok(copied.with_unsigned(self.unsigned))
    }

    fn check_reshape(&self, shape: &[usize]) -> Result<()> {
        let size = checked_size(shape)?;
        if size != self.size() {
            return Err(ArrayError::invalid_range(format!(
                "cannot reshape {} elements into {:?}",
                self.size(),
                shape
            )));
        }
        Ok(())
    }

    /// Dense copy with a new shape of the same size
    pub fn reshape(&self, shape: &[usize]) -> Result<Array> {
        self.check_reshape(shape)?;
        let copied = Self::wrap(IndexCalculator::factory(shape)?, self.gather()?);
        Ok(copied.with_unsigned(self.unsigned))
    }

    /// View with a new shape over the same buffer.
    ///
    /// Only possible when this view is already dense in canonical order.
    pub fn reshape_no_copy(&self, shape: &[usize]) -> Result<Array> {
        self.check_reshape(shape)?;
        if !self.index.is_fast_iterator() {
            return Err(ArrayError::unsupported(
                "reshape without copy needs a contiguous canonical layout; use reshape",
            ));
        }
        let dense = IndexCalculator::factory(shape)?;
        let index = IndexCalculator::with_strides(shape, dense.stride(), self.index.origin())?;
        Ok(self.view(index))
    }

    /// Elements in canonical order as a new vector of `T`, converting as needed
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.size() == 0 {
            return Ok(Vec::new());
        }
        let storage = self.storage.read();
        if let Some(values) = T::slice(&storage) {
            if self.index.is_fast_iterator() {
                let start = self.index.origin() as usize;
                return Ok(values[start..start + self.size()].to_vec());
            }
            return Ok(self.index.offsets().map(|o| values[o].clone()).collect());
        }
        self.index
            .offsets()
            .map(|o| T::from_value(&storage.get(o)?, self.unsigned))
            .collect()
    }

    /// Copy the elements in canonical order into `target`, converting as needed
    pub fn copy_into<T: Element>(&self, target: &mut [T]) -> Result<()> {
        if target.len() != self.size() {
            return Err(ArrayError::argument(format!(
                "target holds {} elements, array has {}",
                target.len(),
                self.size()
            )));
        }
        let storage = self.storage.read();
        for (slot, offset) in target.iter_mut().zip(self.index.offsets()) {
            *slot = T::from_value(&storage.get(offset)?, self.unsigned)?;
        }
        Ok(())
    }

    /// Copy into an `ndarray` array of the same shape
    pub fn to_ndarray<T: Element>(&self) -> Result<ArrayD<T>> {
        ArrayD::from_shape_vec(IxDyn(self.shape()), self.to_vec()?)
            .map_err(|e| ArrayError::argument(e.to_string()))
    }

    /// Copy `len` elements, in canonical order, from position `src_pos` of
    /// `src` to position `dst_pos` of `dst`
    pub fn arraycopy(
        src: &Array,
        src_pos: usize,
        dst: &Array,
        dst_pos: usize,
        len: usize,
    ) -> Result<()> {
        let fits = |a: &Array, pos: usize| pos.checked_add(len).is_some_and(|end| end <= a.size());
        if !fits(src, src_pos) || !fits(dst, dst_pos) {
            return Err(ArrayError::out_of_range(format!(
                "copy of {} elements from {} of {} to {} of {}",
                len,
                src_pos,
                src.size(),
                dst_pos,
                dst.size()
            )));
        }
        let from = src.index.offsets().skip(src_pos).take(len);
        let to = dst.index.offsets().skip(dst_pos);
        // Values are staged first so overlapping views of one buffer copy cleanly
        let staged = {
            let storage = src.storage.read();
            from.map(|o| storage.get(o)).collect::<Result<Vec<_>>>()?
        };
        let mut storage = dst.storage.write();
        for (value, offset) in staged.iter().zip(to) {
            storage.set(offset, value, src.unsigned)?;
        }
        Ok(())
    }
}

macro_rules! typed_accessors {
    ($(($get:ident, $get_at:ident, $set:ident, $set_at:ident, $ty:ty)),* $(,)?) => {
        /// Typed shorthands for [`Array::get`], [`Array::get_at`],
        /// [`Array::set`] and [`Array::set_at`]
        impl Array {
            $(
                pub fn $get(&self, index: &[usize]) -> Result<$ty> {
                    self.get(index)
                }

                pub fn $get_at(&self, offset: usize) -> Result<$ty> {
                    self.get_at(offset)
                }

                pub fn $set(&self, index: &[usize], value: $ty) -> Result<()> {
                    self.set(index, value)
                }

                pub fn $set_at(&self, offset: usize, value: $ty) -> Result<()> {
                    self.set_at(offset, value)
                }
            )*
        }
    };
}

typed_accessors!(
    (get_bool, get_bool_at, set_bool, set_bool_at, bool),
    (get_i8, get_i8_at, set_i8, set_i8_at, i8),
    (get_char, get_char_at, set_char, set_char_at, u8),
    (get_i16, get_i16_at, set_i16, set_i16_at, i16),
    (get_i32, get_i32_at, set_i32, set_i32_at, i32),
    (get_i64, get_i64_at, set_i64, set_i64_at, i64),
    (get_f32, get_f32_at, set_f32, set_f32_at, f32),
    (get_f64, get_f64_at, set_f64, set_f64_at, f64),
    (get_string, get_string_at, set_string, set_string_at, String),
);

/// Content equality: same kind, same shape, same elements in canonical order
impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.data_type != other.data_type || self.shape() != other.shape() {
            return false;
        }
        self.index_iterator().eq(other.index_iterator())
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = self.rank();
        if rank == 0 {
            return match self.index_iterator().next() {
                Some(v) => write!(f, "{}", v),
                None => Ok(()),
            };
        }
        let shape = self.shape();
        let mut counter = vec![0usize; rank];
        let mut values = self.index_iterator();

        f.write_str(&"{".repeat(rank))?;
        if self.size() == 0 {
            return f.write_str(&"}".repeat(rank));
        }
        loop {
            if let Some(v) = values.next() {
                write!(f, "{}", v)?;
            }
            // advance the odometer, closing and reopening braces on carry
            let mut d = rank;
            while d > 0 {
                d -= 1;
                counter[d] += 1;
                if counter[d] < shape[d] {
                    break;
                }
                counter[d] = 0;
                f.write_str("}")?;
                if d == 0 {
                    return Ok(());
                }
            }
            f.write_str(", ")?;
            let opened = counter[d + 1..].len();
            f.write_str(&"{".repeat(opened))?;
        }
    }
}
