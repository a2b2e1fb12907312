//! Result type aliases for rowcache.

use crate::RowCacheError;

/// A specialized `Result` type for rowcache operations.
pub type RowCacheResult<T> = Result<T, RowCacheError>;
