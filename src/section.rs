//! Section - one [`Range`] per dimension, selecting a rectangular sub-array

use crate::error::{ArrayError, Result};
use crate::range::Range;
use crate::utils::checked_size;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered list of ranges, one per dimension.
///
/// A `None` entry stands for the entire dimension and is resolved against a
/// shape by [`Section::fill`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Section {
    ranges: Vec<Option<Range>>,
}

impl Section {
    pub fn new(ranges: Vec<Option<Range>>) -> Self {
        Self { ranges }
    }

    /// Section with every range given explicitly
    pub fn from_ranges(ranges: Vec<Range>) -> Self {
        Self {
            ranges: ranges.into_iter().map(Some).collect(),
        }
    }

    /// Section covering the whole of an array with this shape
    pub fn from_shape(shape: &[usize]) -> Self {
        Self::from_ranges(shape.iter().map(|&len| Range::from_len(len)).collect())
    }

    /// Section from origin and size, unit stride
    pub fn from_origin_size(origin: &[usize], size: &[usize]) -> Result<Self> {
        if origin.len() != size.len() {
            return Err(ArrayError::invalid_range(format!(
                "origin rank {} != size rank {}",
                origin.len(),
                size.len()
            )));
        }
        let ranges = origin
            .iter()
            .zip(size)
            .map(|(&o, &n)| {
                if n == 0 {
                    Ok(Range::EMPTY)
                } else {
                    Range::new(o, o + n - 1)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_ranges(ranges))
    }

    /// Append one dimension
    pub fn with_range(mut self, range: Option<Range>) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Option<Range>] {
        &self.ranges
    }

    pub fn range(&self, dim: usize) -> Option<&Range> {
        self.ranges.get(dim).and_then(|r| r.as_ref())
    }

    /// Check if every dimension has an explicit range
    pub fn is_complete(&self) -> bool {
        self.ranges.iter().all(Option::is_some)
    }

    /// Resolve placeholders against `shape`, appending whole dimensions when
    /// the section has fewer ranges than `shape` has dimensions.
    pub fn fill(&self, shape: &[usize]) -> Result<Section> {
        if self.rank() > shape.len() {
            return Err(ArrayError::invalid_range(format!(
                "section rank {} > array rank {}",
                self.rank(),
                shape.len()
            )));
        }
        let ranges = shape
            .iter()
            .enumerate()
            .map(|(dim, &len)| match self.range(dim) {
                Some(r) => *r,
                None => Range::from_len(len),
            })
            .collect();
        Ok(Section::from_ranges(ranges))
    }

    /// Validate that every range fits inside `shape`
    pub fn check_in_range(&self, shape: &[usize]) -> Result<()> {
        if self.rank() != shape.len() {
            return Err(ArrayError::invalid_range(format!(
                "section rank {} != array rank {}",
                self.rank(),
                shape.len()
            )));
        }
        for (dim, (range, &len)) in self.ranges.iter().zip(shape).enumerate() {
            if let Some(r) = range {
                if !r.is_empty() && r.last() >= len {
                    return Err(ArrayError::invalid_range(format!(
                        "range {} exceeds dimension {} of length {}",
                        r, dim, len
                    )));
                }
            }
        }
        Ok(())
    }

    fn complete_ranges(&self) -> Result<Vec<Range>> {
        self.ranges
            .iter()
            .enumerate()
            .map(|(dim, r)| {
                r.ok_or_else(|| {
                    ArrayError::invalid_range(format!("dimension {} has no range", dim))
                })
            })
            .collect()
    }

    /// Lengths of the ranges. Fails if any dimension is a placeholder.
    pub fn shape(&self) -> Result<Vec<usize>> {
        Ok(self.complete_ranges()?.iter().map(Range::length).collect())
    }

    /// First element of each range
    pub fn origin(&self) -> Result<Vec<usize>> {
        Ok(self.complete_ranges()?.iter().map(Range::first).collect())
    }

    /// Stride of each range
    pub fn stride(&self) -> Result<Vec<usize>> {
        Ok(self.complete_ranges()?.iter().map(Range::stride).collect())
    }

    /// Number of elements selected
    pub fn size(&self) -> Result<usize> {
        checked_size(&self.shape()?)
    }

    /// Take `other` relative to this section, dimension by dimension
    pub fn compose(&self, other: &Section) -> Result<Section> {
        if other.rank() != self.rank() {
            return Err(ArrayError::invalid_range(format!(
                "cannot compose sections of rank {} and {}",
                self.rank(),
                other.rank()
            )));
        }
        let ranges = self
            .ranges
            .iter()
            .zip(&other.ranges)
            .map(|(base, sub)| match (base, sub) {
                (Some(b), Some(s)) => b.compose(s).map(Some),
                (Some(b), None) => Ok(Some(*b)),
                (None, s) => Ok(*s),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Section::new(ranges))
    }

    /// Dimension-wise intersection of two complete sections
    pub fn intersect(&self, other: &Section) -> Result<Section> {
        if other.rank() != self.rank() {
            return Err(ArrayError::invalid_range(format!(
                "cannot intersect sections of rank {} and {}",
                self.rank(),
                other.rank()
            )));
        }
        let a = self.complete_ranges()?;
        let b = other.complete_ranges()?;
        let ranges = a
            .iter()
            .zip(&b)
            .map(|(x, y)| x.intersect(y))
            .collect::<Result<Vec<_>>>()?;
        Ok(Section::from_ranges(ranges))
    }

    /// Check if `index` is selected by this section
    pub fn contains(&self, index: &[usize]) -> bool {
        index.len() == self.rank()
            && self
                .ranges
                .iter()
                .zip(index)
                .all(|(r, &i)| r.map_or(true, |r| r.contains(i)))
    }

    /// Iterate, in canonical order, over the flat offsets this section
    /// selects inside a dense array of `full_shape`.
    pub fn offsets(&self, full_shape: &[usize]) -> Result<SectionOffsets> {
        let filled = self.fill(full_shape)?;
        filled.check_in_range(full_shape)?;
        let ranges = filled.complete_ranges()?;

        let mut dense_stride = vec![1usize; full_shape.len()];
        for dim in (0..full_shape.len().saturating_sub(1)).rev() {
            dense_stride[dim] = dense_stride[dim + 1] * full_shape[dim + 1];
        }
        let remaining = checked_size(&ranges.iter().map(Range::length).collect::<Vec<_>>())?;

        Ok(SectionOffsets {
            counter: vec![0; ranges.len()],
            ranges,
            dense_stride,
            remaining,
        })
    }
}

/// Iterator returned by [`Section::offsets`]
#[derive(Debug, Clone)]
pub struct SectionOffsets {
    ranges: Vec<Range>,
    dense_stride: Vec<usize>,
    counter: Vec<usize>,
    remaining: usize,
}

impl Iterator for SectionOffsets {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let offset = self
            .ranges
            .iter()
            .zip(&self.counter)
            .zip(&self.dense_stride)
            .map(|((r, &c), &s)| (r.first() + c * r.stride()) * s)
            .sum();

        self.remaining -= 1;
        for dim in (0..self.counter.len()).rev() {
            self.counter[dim] += 1;
            if self.counter[dim] < self.ranges[dim].length() {
                break;
            }
            self.counter[dim] = 0;
        }
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for SectionOffsets {}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match r {
                Some(r) => write!(f, "{}", r)?,
                None => f.write_str(":")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Section {
    type Err = ArrayError;

    /// Parse `"0:9:2,:,3"`: `first[:last[:stride]]` per dimension, `:` for a whole dimension
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('(').trim_end_matches(')');
        if s.is_empty() {
            return Ok(Section::default());
        }
        let ranges = s
            .split(',')
            .map(|part| parse_range(part.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Section::new(ranges))
    }
}

fn parse_range(part: &str) -> Result<Option<Range>> {
    if part == ":" {
        return Ok(None);
    }
    let parse = |t: &str| -> Result<i64> {
        t.trim()
            .parse::<i64>()
            .map_err(|_| ArrayError::invalid_range(format!("bad range syntax '{}'", part)))
    };
    let fields: Vec<&str> = part.split(':').collect();
    let range = match fields.as_slice() {
        [single] => {
            let v = parse(single)?;
            Range::from_signed(v, v, 1)?
        }
        [first, last] => Range::from_signed(parse(first)?, parse(last)?, 1)?,
        [first, last, stride] => Range::from_signed(parse(first)?, parse(last)?, parse(stride)?)?,
        _ => {
            return Err(ArrayError::invalid_range(format!(
                "bad range syntax '{}'",
                part
            )))
        }
    };
    Ok(Some(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape() {
        let s = Section::from_shape(&[3, 4]);
        assert_eq!(s.shape().unwrap(), vec![3, 4]);
        assert_eq!(s.size().unwrap(), 12);
        assert_eq!(s.origin().unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_fill_placeholders() {
        let s = Section::new(vec![None, Some(Range::new(1, 2).unwrap())]);
        assert!(!s.is_complete());
        assert!(s.shape().is_err());
        let full = s.fill(&[5, 4, 3]).unwrap();
        assert_eq!(full.shape().unwrap(), vec![5, 2, 3]);
        assert!(s.fill(&[5]).is_err());
    }

    #[test]
    fn test_parse_and_display() {
        let s: Section = "0:9:2, :, 3".parse().unwrap();
        assert_eq!(s.rank(), 3);
        assert_eq!(s.range(0).unwrap().length(), 5);
        assert!(s.range(1).is_none());
        assert_eq!(s.range(2).unwrap().first(), 3);
        assert_eq!(s.to_string(), "0:8:2,:,3:3");

        assert!("1:x".parse::<Section>().is_err());
        assert!("-1:3".parse::<Section>().is_err());
        assert!("3:1".parse::<Section>().is_err());
    }

    #[test]
    fn test_check_in_range() {
        let s: Section = "0:4,2".parse().unwrap();
        assert!(s.check_in_range(&[5, 3]).is_ok());
        assert!(s.check_in_range(&[4, 3]).is_err());
        assert!(s.check_in_range(&[5]).is_err());
    }

    #[test]
    fn test_compose_and_intersect() {
        let base: Section = "10:19,0:9:3".parse().unwrap();
        let sub: Section = "2:4,1".parse().unwrap();
        let c = base.compose(&sub).unwrap();
        assert_eq!(c.origin().unwrap(), vec![12, 3]);
        assert_eq!(c.shape().unwrap(), vec![3, 1]);

        let a: Section = "0:9,0:9".parse().unwrap();
        let b: Section = "5:20,3:4".parse().unwrap();
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.to_string(), "5:9,3:4");
    }

    #[test]
    fn test_contains() {
        let s: Section = "0:9:2,:".parse().unwrap();
        assert!(s.contains(&[4, 100]));
        assert!(!s.contains(&[5, 0]));
        assert!(!s.contains(&[4]));
    }

    #[test]
    fn test_offsets() {
        let s: Section = "1:2,0:3:2".parse().unwrap();
        let offsets: Vec<_> = s.offsets(&[3, 4]).unwrap().collect();
        assert_eq!(offsets, vec![4, 6, 8, 10]);
        assert_eq!(Section::default().offsets(&[2, 2]).unwrap().count(), 4);
    }

    #[test]
    fn test_serde_round_trip() {
        let s: Section = "0:3,:".parse().unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: Section = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
