//! Prefetched image bookkeeping.
//!
//! The image store is a separate key space from the data cache. Records are
//! keyed by URL and never expire on their own: a fresh `Ok` record only
//! suppresses repeat prefetches. The one owned resource here is the local
//! handle produced by a fallback binary fetch; those are bounded and can be
//! released explicitly.

pub mod fetcher;

#[cfg(feature = "http")]
pub use fetcher::HttpImageFetcher;
pub use fetcher::{ImageFetcher, NoopImageFetcher};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use folio_core::Timestamp;
use tracing::debug;
use uuid::Uuid;

/// Outcome of the last prefetch attempt for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageStatus {
    Ok,
    Err,
}

/// Owned local copy of an image's bytes, addressable by a private URI.
///
/// Cloning shares the bytes. They are freed when the last clone is dropped,
/// which for handles held by the store means on release or eviction.
#[derive(Clone)]
pub struct ImageHandle {
    id: Uuid,
    bytes: Arc<[u8]>,
}

impl ImageHandle {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Local URI a view can use instead of the network URL.
    pub fn uri(&self) -> String {
        format!("blob:folio/{}", self.id)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of the latest prefetch for one URL.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub status: ImageStatus,
    pub fetched_at: Timestamp,
    /// Present only when the fallback fetch produced local bytes.
    pub handle: Option<ImageHandle>,
}

impl ImageRecord {
    /// An `Ok` record younger than `ttl`.
    pub fn is_fresh_ok(&self, now: Timestamp, ttl: Duration) -> bool {
        self.status == ImageStatus::Ok
            && (now - self.fetched_at)
                .to_std()
                .map(|age| age < ttl)
                .unwrap_or(true)
    }
}

/// URL-keyed prefetch records with a bound on outstanding handles.
#[derive(Debug)]
pub struct ImageStore {
    records: DashMap<String, ImageRecord>,
    max_handles: usize,
}

impl ImageStore {
    pub fn new(max_handles: usize) -> Self {
        Self {
            records: DashMap::new(),
            max_handles: max_handles.max(1),
        }
    }

    pub fn get(&self, url: &str) -> Option<ImageRecord> {
        self.records.get(url).map(|record| record.clone())
    }

    /// Returns true if a repeat prefetch of `url` can be skipped.
    pub fn is_fresh_ok(&self, url: &str, now: Timestamp, ttl: Duration) -> bool {
        self.records
            .get(url)
            .map(|record| record.is_fresh_ok(now, ttl))
            .unwrap_or(false)
    }

    /// Record a successful load. With a handle, the oldest other handle is
    /// released first if the bound would otherwise be exceeded.
    pub fn record_ok(&self, url: &str, handle: Option<ImageHandle>, now: Timestamp) {
        if handle.is_some() {
            self.make_room_for_handle(url);
        }
        self.records.insert(
            url.to_string(),
            ImageRecord {
                status: ImageStatus::Ok,
                fetched_at: now,
                handle,
            },
        );
    }

    /// Record a failed load. Any handle previously held for `url` is dropped.
    pub fn record_err(&self, url: &str, now: Timestamp) {
        self.records.insert(
            url.to_string(),
            ImageRecord {
                status: ImageStatus::Err,
                fetched_at: now,
                handle: None,
            },
        );
    }

    /// The local handle's URI if one exists for an `Ok` record, else `url`.
    pub fn resolve_source(&self, url: &str) -> String {
        self.records
            .get(url)
            .and_then(|record| match (&record.status, &record.handle) {
                (ImageStatus::Ok, Some(handle)) => Some(handle.uri()),
                _ => None,
            })
            .unwrap_or_else(|| url.to_string())
    }

    /// Release the handle held for `url`. The record itself stays, so the URL
    /// is still considered prefetched and resolves to itself.
    pub fn release_handle(&self, url: &str) -> bool {
        self.records
            .get_mut(url)
            .and_then(|mut record| record.handle.take())
            .is_some()
    }

    /// Number of handles currently held.
    pub fn handle_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.handle.is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn make_room_for_handle(&self, incoming: &str) {
        loop {
            // Snapshot first: never hold a map guard while mutating.
            let held: Vec<(String, Timestamp)> = self
                .records
                .iter()
                .filter(|record| record.handle.is_some() && record.key() != incoming)
                .map(|record| (record.key().clone(), record.fetched_at))
                .collect();

            if held.len() < self.max_handles {
                return;
            }

            let Some((oldest, _)) = held.into_iter().min_by_key(|(_, fetched_at)| *fetched_at)
            else {
                return;
            };
            debug!(url = %oldest, "releasing oldest image handle");
            self.release_handle(&oldest);
        }
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new(folio_core::DEFAULT_MAX_IMAGE_HANDLES)
    }
}
