//! Data cache for page slices and single entities.
//!
//! Entries live for a fixed TTL measured from their last write. Reads past
//! the TTL drop the entry and report a miss. Besides expiry, an entry can be
//! replaced when a collaborator pushes a value whose derived version differs
//! from the stored one (see [`CacheStore::update_if_stale`]).
//!
//! # Example
//!
//! ```ignore
//! let store = CacheStore::new(Duration::from_secs(300));
//! store.set(CacheKey::post("hello-vue3"), CachedValue::post(article));
//!
//! // Pushed by the edit flow; lands only if the version moved.
//! store.update_if_stale(&CacheKey::post("hello-vue3"), CachedValue::post(edited));
//! ```

pub mod entry;
pub mod key;
pub mod store;

pub use entry::{CacheEntry, CachedValue, Versioned};
pub use key::CacheKey;
pub use store::{CacheStats, CacheStore};
