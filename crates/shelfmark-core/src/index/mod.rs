//! In-memory search indexes.
//!
//! Both indexes are built once from persisted artifacts and never mutated
//! afterwards. [`vector::VectorIndex`] does an exhaustive cosine scan;
//! [`keyword::KeywordIndex`] scores BM25 over a whitespace/word tokenizer.

pub mod keyword;
pub mod vector;

pub use keyword::{tokenize, KeywordIndex};
pub use vector::VectorIndex;

use crate::error::SearchError;

/// Checks a vector length against the index dimension.
pub(crate) fn validate_dimension(expected: usize, actual: usize) -> Result<(), SearchError> {
    if expected != actual {
        return Err(SearchError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
