//! multiarray - strided multidimensional arrays and binary record decoding
//!
//! A small engine for typed N-dimensional arrays stored as one flat buffer
//! addressed through shape, strides and an origin offset.
//!
//! # Features
//!
//! - Zero-copy views: section, slice, transpose, permute, flip, reduce
//! - Canonical-order iteration with a linear fast path
//! - Dense copies, reshapes and `ndarray` interop
//! - Fixed-size binary records decoded in place from a shared byte buffer,
//!   with per-member byte order and nested records
//! - Async data sources reading dense variables from memory or disk
//!
//! # Example
//!
//! ```rust,ignore
//! use multiarray::{Array, Section};
//!
//! let a = Array::from_vec(&[3, 4], (0..12).collect::<Vec<i32>>())?;
//! let column = a.section(&"0:2,1".parse::<Section>()?)?;
//! assert_eq!(column.to_vec::<i32>()?, vec![1, 5, 9]);
//!
//! // Views share storage with their parent
//! column.set_i32(&[0], 100)?;
//! assert_eq!(a.get_i32(&[0, 1])?, 100);
//! ```

pub mod array;
pub mod error;
pub mod index;
pub mod io;
pub mod iterator;
pub mod range;
pub mod section;
pub mod storage;
pub mod structure;
pub mod structure_bb;
pub mod types;
pub mod utils;

// Re-exports
pub use array::Array;
pub use error::{ArrayError, Result};
pub use index::IndexCalculator;
pub use io::{DataSource, FileSource, MemorySource, SourceKind, VariableDescriptor};
pub use iterator::{IndexIterator, OffsetIter};
pub use range::Range;
pub use section::Section;
pub use storage::{Element, Storage};
pub use structure::{Member, StructureMembers};
pub use structure_bb::{ArrayStructureBB, StructureData};
pub use types::{ByteOrder, DataType, Value};

/// Version of the multiarray crate
pub const MULTIARRAY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!MULTIARRAY_VERSION.is_empty());
    }

    #[test]
    fn test_readme_example() {
        let a = Array::from_vec(&[3, 4], (0..12).collect::<Vec<i32>>()).unwrap();
        let column = a.section(&"0:2,1".parse::<Section>().unwrap()).unwrap();
        assert_eq!(column.to_vec::<i32>().unwrap(), vec![1, 5, 9]);
        column.set_i32(&[0], 100).unwrap();
        assert_eq!(a.get_i32(&[0, 1]).unwrap(), 100);
    }
}
