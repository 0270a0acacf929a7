//! Canonical-order traversal of an array view.
//!
//! Iterators are one-shot: take a fresh one from [`Array::index_iterator`]
//! for every pass. Each call returns an independent iterator, so several
//! threads may traverse the same array at once as long as nobody writes.

use crate::array::Array;
use crate::error::{ArrayError, Result};
use crate::index::IndexCalculator;
use crate::storage::Element;
use crate::types::Value;

#[derive(Debug, Clone)]
enum Cursor {
    /// Dense layout: one increment per step
    Fast { next: usize },
    /// General layout: per-dimension counters, last dimension fastest
    Odometer {
        stride: Vec<isize>,
        counter: Vec<usize>,
        offset: isize,
    },
}

/// Buffer offsets of every element of a view, in canonical order
#[derive(Debug, Clone)]
pub struct OffsetIter {
    cursor: Cursor,
    shape: Vec<usize>,
    size: usize,
    position: usize,
}

impl OffsetIter {
    pub(crate) fn fast(origin: usize, size: usize) -> Self {
        Self {
            cursor: Cursor::Fast { next: origin },
            shape: vec![size],
            size,
            position: 0,
        }
    }

    pub(crate) fn odometer(calc: &IndexCalculator) -> Self {
        Self {
            cursor: Cursor::Odometer {
                stride: calc.stride().to_vec(),
                counter: vec![0; calc.rank()],
                offset: calc.origin(),
            },
            shape: calc.shape().to_vec(),
            size: calc.size(),
            position: 0,
        }
    }

    /// True when this iterator walks the buffer linearly
    pub fn is_fast(&self) -> bool {
        matches!(self.cursor, Cursor::Fast { .. })
    }

    /// Number of elements already produced
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Iterator for OffsetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.position >= self.size {
            return None;
        }
        self.position += 1;
        match &mut self.cursor {
            Cursor::Fast { next } => {
                let offset = *next;
                *next += 1;
                Some(offset)
            }
            Cursor::Odometer {
                stride,
                counter,
                offset,
            } => {
                let current = *offset as usize;
                for d in (0..counter.len()).rev() {
                    counter[d] += 1;
                    *offset += stride[d];
                    if counter[d] < self.shape[d] {
                        break;
                    }
                    *offset -= stride[d] * self.shape[d] as isize;
                    counter[d] = 0;
                }
                Some(current)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.size - self.position;
        (left, Some(left))
    }
}

impl ExactSizeIterator for OffsetIter {}

/// Lazy, one-shot, canonical-order iterator over the elements of an [`Array`].
///
/// The typed `*_next` accessors advance the iterator and must only be called
/// after [`IndexIterator::has_next`] returned true; past the end they fail
/// with `IndexOutOfRange`.
pub struct IndexIterator<'a> {
    array: &'a Array,
    offsets: OffsetIter,
    current: Option<usize>,
}

impl<'a> IndexIterator<'a> {
    pub(crate) fn new(array: &'a Array) -> Self {
        Self {
            array,
            offsets: array.index_calculator().offsets(),
            current: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.offsets.position() < self.offsets.size
    }

    /// Advance and return the buffer offset of the next element
    pub fn next_offset(&mut self) -> Option<usize> {
        self.current = self.offsets.next();
        self.current
    }

    /// Multi-index of the element most recently returned
    pub fn current_counter(&self) -> Option<Vec<usize>> {
        self.current?;
        Some(
            self.array
                .index_calculator()
                .counter_of(self.offsets.position() - 1),
        )
    }

    fn advance(&mut self) -> Result<usize> {
        self.next_offset()
            .ok_or_else(|| ArrayError::out_of_range("iterator is exhausted"))
    }

    fn current_offset(&self) -> Result<usize> {
        self.current
            .ok_or_else(|| ArrayError::out_of_range("iterator has no current element"))
    }

    pub fn get_value_next(&mut self) -> Result<Value> {
        let offset = self.advance()?;
        self.array.get_value_at(offset)
    }

    /// Advance and read the element as `T`, converting if needed
    pub fn get_next<T: Element>(&mut self) -> Result<T> {
        let offset = self.advance()?;
        self.array.get_at(offset)
    }

    pub fn get_f64_next(&mut self) -> Result<f64> {
        self.get_next()
    }

    pub fn get_i64_next(&mut self) -> Result<i64> {
        self.get_next()
    }

    pub fn get_i32_next(&mut self) -> Result<i32> {
        self.get_next()
    }

    /// Advance and overwrite the next element
    pub fn set_value_next(&mut self, value: &Value) -> Result<()> {
        let offset = self.advance()?;
        self.array.set_value_at(offset, value)
    }

    pub fn set_next<T: Element>(&mut self, value: T) -> Result<()> {
        let offset = self.advance()?;
        self.array.set_at(offset, value)
    }

    pub fn set_f64_next(&mut self, value: f64) -> Result<()> {
        self.set_next(value)
    }

    /// Read the element most recently returned
    pub fn get_value_current(&self) -> Result<Value> {
        self.array.get_value_at(self.current_offset()?)
    }

    /// Overwrite the element most recently returned
    pub fn set_value_current(&self, value: &Value) -> Result<()> {
        self.array.set_value_at(self.current_offset()?, value)
    }
}

impl Iterator for IndexIterator<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let offset = self.next_offset()?;
        self.array.get_value_at(offset).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.offsets.size_hint()
    }
}

impl ExactSizeIterator for IndexIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn arange(shape: &[usize]) -> Array {
        let n: usize = shape.iter().product();
        Array::from_vec(shape, (0..n as i32).collect()).unwrap()
    }

    #[test]
    fn test_fast_path() {
        let calc = IndexCalculator::factory(&[2, 3]).unwrap();
        let it = calc.offsets();
        assert!(it.is_fast());
        assert_eq!(it.collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_odometer_path() {
        let calc = IndexCalculator::factory(&[2, 3]).unwrap().transpose(0, 1).unwrap();
        let it = calc.offsets();
        assert!(!it.is_fast());
        assert_eq!(it.len(), 6);
        assert_eq!(it.collect::<Vec<_>>(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_empty_and_scalar() {
        let empty = IndexCalculator::factory(&[3, 0]).unwrap();
        assert_eq!(empty.offsets().count(), 0);
        let scalar = IndexCalculator::factory(&[]).unwrap();
        assert_eq!(scalar.offsets().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_typed_next_and_exhaustion() {
        let a = arange(&[2, 2]);
        let mut it = a.index_iterator();
        let mut sum = 0.0;
        while it.has_next() {
            sum += it.get_f64_next().unwrap();
        }
        assert_eq!(sum, 6.0);
        assert!(matches!(
            it.get_f64_next(),
            Err(ArrayError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_current_counter() {
        let a = arange(&[2, 3]);
        let mut it = a.index_iterator();
        assert!(it.current_counter().is_none());
        it.next_offset();
        it.next_offset();
        it.next_offset();
        it.next_offset();
        assert_eq!(it.current_counter(), Some(vec![1, 0]));
        assert_eq!(it.get_value_current().unwrap(), Value::Int(3));
    }

    #[test]
    fn test_set_through_iterator() {
        let a = Array::factory(DataType::Double, &[3]).unwrap();
        let mut it = a.index_iterator();
        let mut v = 0.5;
        while it.has_next() {
            it.set_f64_next(v).unwrap();
            v += 1.0;
        }
        assert_eq!(a.to_vec::<f64>().unwrap(), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_independent_iterators() {
        let a = arange(&[4]);
        let mut first = a.index_iterator();
        first.next();
        let second: Vec<_> = a.index_iterator().collect();
        assert_eq!(second.len(), 4);
        assert_eq!(first.count(), 3);
    }
}
