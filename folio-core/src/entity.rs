//! Content entities and their version signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A content item that can be listed, cached and preloaded.
///
/// # Implementation Requirements
///
/// - `id()` must be unique within one sorted sequence
/// - `updated_at()` / `published_at()` feed [`derive_version`]; return `None`
///   when the item has no such timestamp
/// - Implementations must be `Clone + Send + Sync + 'static` so they can be
///   captured by background work
pub trait Entity: Clone + Send + Sync + 'static {
    /// Unique identifier of this item.
    fn id(&self) -> &str;

    /// Cover image URL, if any.
    fn cover(&self) -> Option<&str>;

    /// Last modification time.
    fn updated_at(&self) -> Option<Timestamp>;

    /// Publication time.
    fn published_at(&self) -> Option<Timestamp>;

    /// Version signal used for staleness comparison.
    fn version(&self) -> i64 {
        derive_version(self.updated_at(), self.published_at())
    }
}

/// Derive the version of a value from its own timestamps.
///
/// Precedence: updated time beats published time beats zero. The result is
/// milliseconds since the Unix epoch; zero means "no version".
pub fn derive_version(updated_at: Option<Timestamp>, published_at: Option<Timestamp>) -> i64 {
    updated_at
        .or(published_at)
        .map(|ts| ts.timestamp_millis())
        .unwrap_or(0)
}

/// Order entities the way the content store exposes them: most recently
/// published first. Items without a publish time sort last; ties keep their
/// input order.
pub fn sorted_by_recency<E: Entity>(mut entities: Vec<E>) -> Vec<E> {
    entities.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
    entities
}

/// Where an article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Original,
    Repost,
    Translation,
}

/// An article as held by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub read_mins: u32,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default)]
    pub published_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl Article {
    /// Create an article with only the identity fields set.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            tags: Vec::new(),
            cover: None,
            read_mins: 0,
            origin: Origin::default(),
            published_at: None,
            updated_at: None,
        }
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn with_published_at(mut self, at: Timestamp) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_updated_at(mut self, at: Timestamp) -> Self {
        self.updated_at = Some(at);
        self
    }
}

impl Entity for Article {
    fn id(&self) -> &str {
        &self.id
    }

    fn cover(&self) -> Option<&str> {
        self.cover.as_deref().filter(|c| !c.is_empty())
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn published_at(&self) -> Option<Timestamp> {
        self.published_at
    }
}
