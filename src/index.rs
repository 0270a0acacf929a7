//! Index calculator - maps multi-indices onto offsets in a flat backing buffer.
//!
//! A calculator is the triple `(shape, stride, origin)`. The offset of a
//! multi-index `i` is `origin + Σ i[d] * stride[d]`, with strides counted in
//! buffer elements. Every view operation (section, slice, transpose, permute,
//! flip, reduce) derives a new calculator in O(rank) and leaves the buffer
//! untouched, so any chain of views composes into a single calculator.

use crate::error::{ArrayError, Result};
use crate::iterator::OffsetIter;
use crate::range::Range;
use crate::section::Section;
use crate::utils::{canonical_strides, checked_size};

/// Immutable `(shape, stride, origin)` mapping for one array view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexCalculator {
    shape: Vec<usize>,
    stride: Vec<isize>,
    origin: isize,
    size: usize,
    fast: bool,
}

impl IndexCalculator {
    /// Dense row-major calculator for `shape`, origin 0
    pub fn factory(shape: &[usize]) -> Result<Self> {
        Self::build(shape.to_vec(), canonical_strides(shape), 0)
    }

    /// Rank-0 calculator addressing the single element at offset 0
    pub fn scalar() -> Self {
        Self {
            shape: Vec::new(),
            stride: Vec::new(),
            origin: 0,
            size: 1,
            fast: true,
        }
    }

    /// Calculator with explicit strides and origin
    pub fn with_strides(shape: &[usize], stride: &[isize], origin: isize) -> Result<Self> {
        if shape.len() != stride.len() {
            return Err(ArrayError::argument(format!(
                "shape rank {} != stride rank {}",
                shape.len(),
                stride.len()
            )));
        }
        if origin < 0 {
            return Err(ArrayError::argument(format!("negative origin {}", origin)));
        }
        Self::build(shape.to_vec(), stride.to_vec(), origin)
    }

    fn build(shape: Vec<usize>, stride: Vec<isize>, origin: isize) -> Result<Self> {
        let size = checked_size(&shape)?;
        let mut calc = Self {
            shape,
            stride,
            origin,
            size,
            fast: false,
        };
        calc.fast = calc.is_canonical();
        Ok(calc)
    }

    // Strides equal the dense row-major layout, ignoring unit dimensions
    fn is_canonical(&self) -> bool {
        let mut expected = 1isize;
        for d in (0..self.rank()).rev() {
            if self.shape[d] != 1 && self.stride[d] != expected {
                return false;
            }
            expected *= self.shape[d] as isize;
        }
        true
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn stride(&self) -> &[isize] {
        &self.stride
    }

    pub fn origin(&self) -> isize {
        self.origin
    }

    /// Number of elements addressed
    pub fn size(&self) -> usize {
        self.size
    }

    /// True when elements are contiguous in canonical order starting at the origin
    pub fn is_fast_iterator(&self) -> bool {
        self.fast
    }

    /// Buffer offset of a multi-index, bounds-checked
    pub fn offset(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(ArrayError::out_of_range(format!(
                "index rank {} != array rank {}",
                index.len(),
                self.rank()
            )));
        }
        for (d, (&i, &len)) in index.iter().zip(&self.shape).enumerate() {
            if i >= len {
                return Err(ArrayError::out_of_range(format!(
                    "index {} >= {} in dimension {}",
                    i, len, d
                )));
            }
        }
        Ok(self.offset_unchecked(index))
    }

    /// Buffer offset of an index already known to be in bounds
    pub(crate) fn offset_unchecked(&self, index: &[usize]) -> usize {
        let offset = index
            .iter()
            .zip(&self.stride)
            .fold(self.origin, |acc, (&i, &s)| acc + i as isize * s);
        offset as usize
    }

    /// Smallest and largest offsets addressed, or `None` for an empty view
    pub fn offset_span(&self) -> Option<(isize, isize)> {
        if self.size == 0 {
            return None;
        }
        let (mut lo, mut hi) = (self.origin, self.origin);
        for (&len, &s) in self.shape.iter().zip(&self.stride) {
            let reach = (len as isize - 1) * s;
            if reach < 0 {
                lo += reach;
            } else {
                hi += reach;
            }
        }
        Some((lo, hi))
    }

    /// Check every addressed offset lies inside a buffer of `len` elements
    pub fn check_buffer(&self, len: usize) -> Result<()> {
        match self.offset_span() {
            Some((lo, _)) if lo < 0 => Err(ArrayError::argument(format!(
                "view reaches negative offset {}",
                lo
            ))),
            Some((_, hi)) if hi as usize >= len => Err(ArrayError::argument(format!(
                "view reaches offset {} in a buffer of {} elements",
                hi, len
            ))),
            _ => Ok(()),
        }
    }

    /// Canonical-order multi-index of the `n`th element
    pub fn counter_of(&self, mut n: usize) -> Vec<usize> {
        let mut counter = vec![0; self.rank()];
        for d in (0..self.rank()).rev() {
            let len = self.shape[d].max(1);
            counter[d] = n % len;
            n /= len;
        }
        counter
    }

    fn compose(&self, section: &Section) -> Result<(Self, Vec<bool>)> {
        if section.rank() != self.rank() {
            return Err(ArrayError::invalid_range(format!(
                "section rank {} != array rank {}",
                section.rank(),
                self.rank()
            )));
        }
        let mut shape = Vec::with_capacity(self.rank());
        let mut stride = Vec::with_capacity(self.rank());
        let mut origin = self.origin;
        let mut unit = Vec::with_capacity(self.rank());

        for d in 0..self.rank() {
            let range = match section.range(d) {
                Some(r) => *r,
                None => Range::from_len(self.shape[d]),
            };
            if !range.is_empty() && range.last() >= self.shape[d] {
                return Err(ArrayError::invalid_range(format!(
                    "range {} exceeds dimension {} of length {}",
                    range, d, self.shape[d]
                )));
            }
            if !range.is_empty() {
                origin += range.first() as isize * self.stride[d];
            }
            shape.push(range.length());
            stride.push(self.stride[d] * range.stride() as isize);
            unit.push(range.length() == 1);
        }
        Ok((Self::build(shape, stride, origin)?, unit))
    }

    /// Subset every dimension, keeping dimensions of extent 1
    pub fn section_no_reduce(&self, section: &Section) -> Result<Self> {
        Ok(self.compose(section)?.0)
    }

    /// Subset every dimension, dropping those whose resulting range has length 1
    pub fn section(&self, section: &Section) -> Result<Self> {
        let (calc, unit) = self.compose(section)?;
        let keep: Vec<usize> = (0..calc.rank()).filter(|&d| !unit[d]).collect();
        calc.select_dims(&keep)
    }

    // New calculator keeping only `dims`, in the given order
    fn select_dims(&self, dims: &[usize]) -> Result<Self> {
        Self::build(
            dims.iter().map(|&d| self.shape[d]).collect(),
            dims.iter().map(|&d| self.stride[d]).collect(),
            self.origin,
        )
    }

    fn check_dim(&self, dim: usize) -> Result<()> {
        if dim >= self.rank() {
            return Err(ArrayError::argument(format!(
                "dimension {} not in array of rank {}",
                dim,
                self.rank()
            )));
        }
        Ok(())
    }

    /// Fix dimension `dim` at `value` and drop it
    pub fn slice(&self, dim: usize, value: usize) -> Result<Self> {
        self.check_dim(dim)?;
        if value >= self.shape[dim] {
            return Err(ArrayError::invalid_range(format!(
                "slice value {} >= {} in dimension {}",
                value, self.shape[dim], dim
            )));
        }
        let keep: Vec<usize> = (0..self.rank()).filter(|&d| d != dim).collect();
        let mut calc = self.select_dims(&keep)?;
        calc.origin += value as isize * self.stride[dim];
        Ok(calc)
    }

    /// Swap two dimensions
    pub fn transpose(&self, d1: usize, d2: usize) -> Result<Self> {
        self.check_dim(d1)?;
        self.check_dim(d2)?;
        let mut dims: Vec<usize> = (0..self.rank()).collect();
        dims.swap(d1, d2);
        self.select_dims(&dims)
    }

    /// Reorder dimensions: new dimension `i` is old dimension `perm[i]`
    pub fn permute(&self, perm: &[usize]) -> Result<Self> {
        if perm.len() != self.rank() {
            return Err(ArrayError::unsupported(format!(
                "permutation {:?} has wrong rank for array of rank {}",
                perm,
                self.rank()
            )));
        }
        let mut seen = vec![false; self.rank()];
        for &p in perm {
            if p >= self.rank() || seen[p] {
                return Err(ArrayError::unsupported(format!(
                    "{:?} is not a permutation of 0..{}",
                    perm,
                    self.rank()
                )));
            }
            seen[p] = true;
        }
        self.select_dims(perm)
    }

    /// Reverse the traversal order of one dimension
    pub fn flip(&self, dim: usize) -> Result<Self> {
        self.check_dim(dim)?;
        let shape = self.shape.clone();
        let mut stride = self.stride.clone();
        let mut origin = self.origin;
        if shape[dim] > 0 {
            origin += stride[dim] * (shape[dim] as isize - 1);
        }
        stride[dim] = -stride[dim];
        Self::build(shape, stride, origin)
    }

    /// Drop every dimension of extent 1
    pub fn reduce(&self) -> Result<Self> {
        let keep: Vec<usize> = (0..self.rank()).filter(|&d| self.shape[d] != 1).collect();
        if keep.len() == self.rank() {
            return Ok(self.clone());
        }
        self.select_dims(&keep)
    }

    /// Drop dimension `dim`, which must have extent 1
    pub fn reduce_dim(&self, dim: usize) -> Result<Self> {
        self.check_dim(dim)?;
        if self.shape[dim] != 1 {
            return Err(ArrayError::argument(format!(
                "dimension {} has length {}, not 1",
                dim, self.shape[dim]
            )));
        }
        let keep: Vec<usize> = (0..self.rank()).filter(|&d| d != dim).collect();
        self.select_dims(&keep)
    }

    /// Offsets of every element in canonical order.
    ///
    /// Uses a linear walk when the layout is dense, else an odometer.
    pub fn offsets(&self) -> OffsetIter {
        if self.fast {
            OffsetIter::fast(self.origin as usize, self.size)
        } else {
            OffsetIter::odometer(self)
        }
    }
}
