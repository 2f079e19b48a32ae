//! Cache entries and the values they hold.

use folio_core::{Entity, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// A value that carries its own version signal.
///
/// Zero means "unversioned": such values are never considered a fresher
/// replacement for anything.
pub trait Versioned {
    fn version(&self) -> i64;
}

/// What the preloader stores: either one page of the listing or one entity.
///
/// Both are shared behind `Arc` so a cache hit is a pointer copy.
#[derive(Debug)]
pub enum CachedValue<E> {
    Page(Arc<[E]>),
    Post(Arc<E>),
}

impl<E> Clone for CachedValue<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Page(page) => Self::Page(Arc::clone(page)),
            Self::Post(post) => Self::Post(Arc::clone(post)),
        }
    }
}

impl<E: Entity> CachedValue<E> {
    pub fn post(entity: E) -> Self {
        Self::Post(Arc::new(entity))
    }

    pub fn page(entities: Vec<E>) -> Self {
        Self::Page(entities.into())
    }

    pub fn as_page(&self) -> Option<&Arc<[E]>> {
        match self {
            Self::Page(page) => Some(page),
            Self::Post(_) => None,
        }
    }

    pub fn as_post(&self) -> Option<&Arc<E>> {
        match self {
            Self::Post(post) => Some(post),
            Self::Page(_) => None,
        }
    }
}

impl<E: Entity> Versioned for CachedValue<E> {
    fn version(&self) -> i64 {
        match self {
            // A slice has no timestamps of its own.
            Self::Page(_) => 0,
            Self::Post(post) => post.version(),
        }
    }
}

/// A stored value plus the bookkeeping the store needs.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    stored_at: Timestamp,
    version: i64,
}

impl<V: Versioned> CacheEntry<V> {
    /// Wrap a value stored at `stored_at`, deriving its version.
    pub fn new(value: V, stored_at: Timestamp) -> Self {
        let version = value.version();
        Self {
            value,
            stored_at,
            version,
        }
    }
}

impl<V> CacheEntry<V> {
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn stored_at(&self) -> Timestamp {
        self.stored_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Age of the entry at `now`. Entries from the future have age zero.
    pub fn age(&self, now: Timestamp) -> Duration {
        (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// An entry is expired once its age strictly exceeds `ttl`.
    pub fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use folio_core::Article;

    #[test]
    fn test_entry_derives_version_from_post() {
        let published = Utc.with_ymd_and_hms(2025, 12, 8, 10, 0, 0).unwrap();
        let value = CachedValue::post(Article::new("a", "A").with_published_at(published));
        let entry = CacheEntry::new(value, Utc::now());
        assert_eq!(entry.version(), published.timestamp_millis());
    }

    #[test]
    fn test_page_is_unversioned() {
        let published = Utc.with_ymd_and_hms(2025, 12, 8, 10, 0, 0).unwrap();
        let value = CachedValue::page(vec![Article::new("a", "A").with_published_at(published)]);
        assert_eq!(value.version(), 0);
        assert!(value.as_page().is_some());
        assert!(value.as_post().is_none());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let stored = Utc::now();
        let entry = CacheEntry::new(CachedValue::page(Vec::<Article>::new()), stored);
        let ttl = Duration::from_millis(1000);

        assert!(!entry.is_expired(stored + chrono::Duration::milliseconds(1000), ttl));
        assert!(entry.is_expired(stored + chrono::Duration::milliseconds(1001), ttl));
        assert!(!entry.is_expired(stored - chrono::Duration::milliseconds(50), ttl));
    }
}
