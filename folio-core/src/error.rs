//! Error types for FOLIO operations

use std::time::Duration;
use thiserror::Error;

/// Speculative preload errors.
///
/// None of these ever reach a caller of the synchronous resolvers. They exist
/// so background paths can report what went wrong to the log before
/// swallowing it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreloadError {
    #[error("Operation timed out after {after:?}")]
    Timeout { after: Duration },

    /// An id lookup in the sorted sequence missed. Logged, then turned into
    /// `None` or a no-op.
    #[error("Nothing found for key {key}")]
    NotFound { key: String },

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

impl PreloadError {
    /// Returns true if this is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidCacheKey { key: String, reason: String },
}

/// Master error type for all FOLIO errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FolioError {
    #[error("Preload error: {0}")]
    Preload(#[from] PreloadError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias for FOLIO operations.
pub type FolioResult<T> = Result<T, FolioError>;

// =============================================================================
// TESTS
// =============================================================================
