//! Range - an immutable arithmetic sequence of indices along one dimension

use crate::error::{ArrayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Arithmetic sequence `first, first + stride, ..., first + (n - 1) * stride`.
///
/// All empty ranges compare equal, regardless of `first` and `stride`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr")]
pub struct Range {
    first: usize,
    n: usize,
    stride: usize,
}

/// Unchecked serialized form, validated into a [`Range`]
#[derive(Deserialize)]
struct RangeRepr {
    first: usize,
    n: usize,
    stride: usize,
}

impl TryFrom<RangeRepr> for Range {
    type Error = ArrayError;

    fn try_from(repr: RangeRepr) -> Result<Self> {
        if repr.stride < 1 {
            return Err(ArrayError::invalid_range(format!(
                "stride ({}) must be >= 1",
                repr.stride
            )));
        }
        let last = repr
            .n
            .saturating_sub(1)
            .checked_mul(repr.stride)
            .and_then(|span| span.checked_add(repr.first));
        if !matches!(last, Some(last) if last <= isize::MAX as usize) {
            return Err(ArrayError::invalid_range(format!(
                "range of {} elements from {} by {} overflows",
                repr.n, repr.first, repr.stride
            )));
        }
        Ok(Range {
            first: repr.first,
            n: repr.n,
            stride: repr.stride,
        })
    }
}

impl Range {
    /// The empty range
    pub const EMPTY: Range = Range {
        first: 0,
        n: 0,
        stride: 1,
    };

    /// Create the range `first..=last` with unit stride
    pub fn new(first: usize, last: usize) -> Result<Self> {
        Self::with_stride(first, last, 1)
    }

    /// Create the range `first..=last` stepping by `stride`.
    ///
    /// `last` need not be reachable; the range ends at the largest element
    /// not exceeding it.
    pub fn with_stride(first: usize, last: usize, stride: usize) -> Result<Self> {
        if last < first {
            return Err(ArrayError::invalid_range(format!(
                "last ({}) must be >= first ({})",
                last, first
            )));
        }
        if stride < 1 {
            return Err(ArrayError::invalid_range("stride must be >= 1"));
        }
        Ok(Self {
            first,
            n: (last - first) / stride + 1,
            stride,
        })
    }

    /// Create the range `0..len`, or [`Range::EMPTY`] when `len == 0`
    pub fn from_len(len: usize) -> Self {
        Self {
            first: 0,
            n: len,
            stride: 1,
        }
    }

    /// Signed-input constructor, rejecting negative bounds
    pub fn from_signed(first: i64, last: i64, stride: i64) -> Result<Self> {
        if first < 0 {
            return Err(ArrayError::invalid_range(format!(
                "first ({}) must be >= 0",
                first
            )));
        }
        if stride < 1 {
            return Err(ArrayError::invalid_range(format!(
                "stride ({}) must be >= 1",
                stride
            )));
        }
        if last < first {
            return Err(ArrayError::invalid_range(format!(
                "last ({}) must be >= first ({})",
                last, first
            )));
        }
        Self::with_stride(first as usize, last as usize, stride as usize)
    }

    pub fn first(&self) -> usize {
        self.first
    }

    /// Last element; equal to `first` for an empty range
    pub fn last(&self) -> usize {
        self.first + self.n.saturating_sub(1) * self.stride
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn length(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The `i`th element of the range
    pub fn element(&self, i: usize) -> Result<usize> {
        if i >= self.n {
            return Err(ArrayError::out_of_range(format!(
                "element {} of range with length {}",
                i, self.n
            )));
        }
        Ok(self.first + i * self.stride)
    }

    /// Position of `elem` in this range, the inverse of [`Range::element`]
    pub fn index(&self, elem: usize) -> Result<usize> {
        if !self.contains(elem) {
            return Err(ArrayError::invalid_range(format!(
                "element {} not in range {}",
                elem, self
            )));
        }
        Ok((elem - self.first) / self.stride)
    }

    /// Check if `i` is one of the elements
    pub fn contains(&self, i: usize) -> bool {
        if self.is_empty() || i < self.first || i > self.last() {
            return false;
        }
        self.stride == 1 || (i - self.first) % self.stride == 0
    }

    /// Range whose `k`th element is `self.element(other.element(k))`.
    ///
    /// Used to chain a section taken on an already sectioned dimension.
    pub fn compose(&self, other: &Range) -> Result<Range> {
        if self.is_empty() || other.is_empty() {
            return Ok(Range::EMPTY);
        }
        let first = self
            .element(other.first())
            .map_err(|_| compose_error(self, other))?;
        let last = self
            .element(other.last())
            .map_err(|_| compose_error(self, other))?;
        Range::with_stride(first, last, self.stride * other.stride())
    }

    /// Set intersection of two ranges.
    ///
    /// At most one operand may have a stride greater than one.
    pub fn intersect(&self, other: &Range) -> Result<Range> {
        if self.is_empty() || other.is_empty() {
            return Ok(Range::EMPTY);
        }
        let last = self.last().min(other.last());
        let stride = self.stride * other.stride;

        let first = if stride == 1 {
            self.first.max(other.first)
        } else if self.stride == 1 {
            first_aligned(other, self.first)
        } else if other.stride == 1 {
            first_aligned(self, other.first)
        } else {
            return Err(ArrayError::unsupported(format!(
                "intersection of {} and {}: both ranges have a stride",
                self, other
            )));
        };

        if first > last {
            return Ok(Range::EMPTY);
        }
        Range::with_stride(first, last, stride)
    }

    /// Check if the two ranges share any element
    pub fn intersects(&self, other: &Range) -> Result<bool> {
        Ok(!self.intersect(other)?.is_empty())
    }

    /// Move the origin to `origin`: every element `e` becomes `e - origin`
    pub fn shift_origin(&self, origin: isize) -> Result<Range> {
        if self.is_empty() {
            return Ok(Range::EMPTY);
        }
        let first = self.first as isize - origin;
        if first < 0 {
            return Err(ArrayError::invalid_range(format!(
                "shifting {} by {} gives a negative first element",
                self, origin
            )));
        }
        Ok(Range {
            first: first as usize,
            n: self.n,
            stride: self.stride,
        })
    }

    /// Iterate over the elements. A fresh iterator starts from `first` every time.
    pub fn iter(&self) -> RangeIter {
        RangeIter {
            next: self.first,
            remaining: self.n,
            stride: self.stride,
        }
    }
}

// First element of `strided` that is >= `min`.
fn first_aligned(strided: &Range, min: usize) -> usize {
    if strided.first >= min {
        return strided.first;
    }
    let steps = (min - strided.first).div_ceil(strided.stride);
    strided.first + steps * strided.stride
}

fn compose_error(outer: &Range, inner: &Range) -> ArrayError {
    ArrayError::invalid_range(format!("{} does not fit inside {}", inner, outer))
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() && other.is_empty();
        }
        self.first == other.first && self.n == other.n && self.stride == other.stride
    }
}

impl Eq for Range {}

impl Hash for Range {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_empty() {
            0usize.hash(state);
        } else {
            self.first.hash(state);
            self.n.hash(state);
            self.stride.hash(state);
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EMPTY");
        }
        if self.stride == 1 {
            write!(f, "{}:{}", self.first, self.last())
        } else {
            write!(f, "{}:{}:{}", self.first, self.last(), self.stride)
        }
    }
}

/// Iterator over the elements of a [`Range`]
#[derive(Debug, Clone)]
pub struct RangeIter {
    next: usize,
    remaining: usize,
    stride: usize,
}

impl Iterator for RangeIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.next;
        self.next += self.stride;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RangeIter {}

impl IntoIterator for &Range {
    type Item = usize;
    type IntoIter = RangeIter;

    fn into_iter(self) -> RangeIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unit_stride() {
        let r = Range::new(0, 9).unwrap();
        assert_eq!(r.length(), 10);
        assert_eq!(r.iter().collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_strided() {
        let r = Range::with_stride(0, 9, 2).unwrap();
        assert_eq!(r.length(), 5);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![0, 2, 4, 6, 8]);
        assert_eq!(r.last(), 8);
    }

    #[test]
    fn test_single_element() {
        let r = Range::new(2, 2).unwrap();
        assert_eq!(r.length(), 1);
        assert_eq!(r.element(0).unwrap(), 2);
        assert!(r.element(1).is_err());
    }

    #[test]
    fn test_invalid_construction() {
        assert!(Range::from_signed(-1, 3, 1).is_err());
        assert!(Range::new(5, 4).is_err());
        assert!(Range::with_stride(0, 4, 0).is_err());
        assert!(matches!(
            Range::from_signed(0, 3, 0),
            Err(ArrayError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_contains_and_index() {
        let r = Range::with_stride(3, 15, 4).unwrap();
        assert!(r.contains(7));
        assert!(!r.contains(8));
        assert!(!r.contains(19));
        assert_eq!(r.index(11).unwrap(), 2);
        assert!(r.index(12).is_err());
    }

    #[test]
    fn test_compose() {
        let outer = Range::with_stride(10, 28, 2).unwrap(); // 10,12,...,28
        let inner = Range::with_stride(1, 7, 3).unwrap(); // 1,4,7
        let c = outer.compose(&inner).unwrap();
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![12, 18, 24]);
        assert_eq!(c.stride(), 6);

        let too_far = Range::new(0, 10).unwrap();
        assert!(outer.compose(&too_far).is_err());
    }

    #[test]
    fn test_intersect() {
        let a = Range::new(0, 10).unwrap();
        let b = Range::with_stride(3, 20, 4).unwrap(); // 3,7,11,...
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![3, 7]);

        let c = Range::new(5, 20).unwrap();
        let i = c.intersect(&b).unwrap();
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![7, 11, 15, 19]);

        let disjoint = Range::new(30, 40).unwrap();
        assert!(a.intersect(&disjoint).unwrap().is_empty());
        assert!(!a.intersects(&disjoint).unwrap());

        let d = Range::with_stride(0, 20, 2).unwrap();
        assert!(matches!(d.intersect(&b), Err(ArrayError::Unsupported(_))));
    }

    #[test]
    fn test_empty_equality() {
        let a = Range::EMPTY;
        let b = Range::from_len(0);
        let c = Range::with_stride(4, 9, 3).unwrap().intersect(&Range::new(20, 21).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(c);
        assert_eq!(set.len(), 1);
        assert_ne!(a, Range::from_len(1));
    }

    #[test]
    fn test_shift_origin() {
        let r = Range::with_stride(10, 20, 5).unwrap();
        let s = r.shift_origin(10).unwrap();
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 5, 10]);
        assert!(r.shift_origin(11).is_err());
        assert_eq!(r.shift_origin(-2).unwrap().first(), 12);
    }

    #[test]
    fn test_iterator_restartable() {
        let r = Range::with_stride(1, 5, 2).unwrap();
        let first: Vec<_> = r.iter().collect();
        let second: Vec<_> = (&r).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(r.iter().len(), 3);
    }

    #[test]
    fn test_deserialize_validates() {
        let r: Range = serde_json::from_str(r#"{"first":2,"n":3,"stride":4}"#).unwrap();
        assert_eq!(r.last(), 10);
        assert_eq!(r.index(6).unwrap(), 1);

        let zero_stride = Range::try_from(RangeRepr {
            first: 0,
            n: 3,
            stride: 0,
        });
        assert!(matches!(zero_stride, Err(ArrayError::InvalidRange(_))));
        let overflow = Range::try_from(RangeRepr {
            first: 0,
            n: usize::MAX,
            stride: 2,
        });
        assert!(matches!(overflow, Err(ArrayError::InvalidRange(_))));

        let err = serde_json::from_str::<Range>(r#"{"first":0,"n":3,"stride":0}"#).unwrap_err();
        assert!(err.to_string().contains("stride"));
        let section = serde_json::from_str::<crate::section::Section>(
            r#"{"ranges":[{"first":1,"n":18446744073709551615,"stride":2}]}"#,
        );
        assert!(section.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Range::new(0, 9).unwrap().to_string(), "0:9");
        assert_eq!(Range::with_stride(0, 9, 2).unwrap().to_string(), "0:8:2");
        assert_eq!(Range::EMPTY.to_string(), "EMPTY");
    }
}
