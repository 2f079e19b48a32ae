//! FOLIO Core - Entity, Error and Configuration Types
//!
//! Pure data structures shared by the preloader and its collaborators.
//! This crate contains no scheduling or caching logic.

pub mod config;
pub mod entity;
pub mod error;

pub use config::{
    PreloadConfig, SchedulerMode, DEFAULT_MAX_IMAGE_HANDLES, DEFAULT_NEXT_MAX, DEFAULT_TIMEOUT,
    DEFAULT_TTL,
};
pub use entity::{derive_version, sorted_by_recency, Article, Entity, Origin, Timestamp};
pub use error::{ConfigError, FolioError, FolioResult, PreloadError, ValidationError};

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
