//! Unified error types for all layers of the library.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for rowcache operations.
///
/// Covers key building, payload validation, backend access, and
/// configuration errors with a single enum so that callers handle one type
/// across the whole caching surface.
#[derive(Error, Debug)]
pub enum RowCacheError {
    /// A rendered cache key exceeded the maximum length.
    #[error("Cache key exceeds {max} characters: {key}")]
    KeyTooLong { key: String, max: usize },

    /// A required call argument was absent.
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// A payload violated the shape contract of the targeted key.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend/connectivity failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error (bad settings, unknown group).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON encode/decode failure for a stored value.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RowCacheError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::KeyTooLong { .. } => "KEY_TOO_LONG",
            Self::MissingArgument(_) => "MISSING_ARGUMENT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a key-too-long error.
    #[must_use]
    pub fn key_too_long<T: Into<String>>(key: T, max: usize) -> Self {
        Self::KeyTooLong {
            key: key.into(),
            max,
        }
    }

    /// Creates a missing-argument error.
    #[must_use]
    pub fn missing_argument<T: Into<String>>(name: T) -> Self {
        Self::MissingArgument(name.into())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a cache/backend error.
    #[must_use]
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Checks if this error means the backend is unreachable or broken.
    ///
    /// Readers are expected to treat an unavailable cache as a miss and fall
    /// back to the source of truth.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Cache(_))
    }
}

impl From<serde_json::Error> for RowCacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
