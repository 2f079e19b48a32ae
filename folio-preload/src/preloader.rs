//! The preload orchestrator.
//!
//! Two synchronous resolvers serve the views: [`PagePreloader::resolve_home_page`]
//! for the listing and [`PagePreloader::resolve_post`] for one article. On a
//! cache miss each one computes its answer from the sorted sequence, stores
//! it, and then hands speculative work to the scheduler: the next listing
//! page and the posts on it after a listing view, the following posts after
//! a post view. Cover images and the view component of the likely next route
//! are warmed along the way. Fan-out per trigger is bounded by `next_max`.
//!
//! Nothing speculative ever fails outward. Background errors are logged at
//! `debug` and dropped.

use std::sync::{Arc, PoisonError, RwLock};

use folio_core::{ConfigError, Entity, FolioError, FolioResult, PreloadConfig, PreloadError};
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::cache::{CacheKey, CacheStats, CacheStore, CachedValue};
use crate::clock::{Clock, SystemClock};
use crate::deadline::with_deadline;
use crate::image::{ImageFetcher, ImageHandle, ImageRecord, ImageStore, NoopImageFetcher};
use crate::routes::{Component, ComponentResolver, HOME_ROUTE, POST_ROUTE};
use crate::scheduler::{scheduler_for, Scheduler};

/// Post neighbours warmed after a post view never exceed this, whatever `next_max` says.
const MAX_POST_NEIGHBORS: usize = 2;

type SharedResolver = Arc<RwLock<Option<Arc<dyn ComponentResolver>>>>;

/// Page/entity cache with speculative preloading.
///
/// Cloning is cheap and every clone shares the same cache, image store,
/// scheduler and attached resolver.
pub struct PagePreloader<E: Entity> {
    config: PreloadConfig,
    cache: Arc<CacheStore<CachedValue<E>>>,
    images: Arc<ImageStore>,
    scheduler: Arc<dyn Scheduler>,
    fetcher: Arc<dyn ImageFetcher>,
    resolver: SharedResolver,
    clock: Arc<dyn Clock>,
}

impl<E: Entity> Clone for PagePreloader<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            cache: Arc::clone(&self.cache),
            images: Arc::clone(&self.images),
            scheduler: Arc::clone(&self.scheduler),
            fetcher: Arc::clone(&self.fetcher),
            resolver: Arc::clone(&self.resolver),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<E: Entity> std::fmt::Debug for PagePreloader<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePreloader")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("images", &self.images.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PagePreloader`].
///
/// Everything except the configuration is optional:
/// - scheduler: chosen from `config.scheduler` on the current Tokio runtime
/// - fetcher: [`NoopImageFetcher`]
/// - clock: [`SystemClock`]
/// - resolver: none, can be attached later
#[derive(Default)]
pub struct PagePreloaderBuilder {
    config: PreloadConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    resolver: Option<Arc<dyn ComponentResolver>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PagePreloaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PreloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ComponentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the preloader.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidValue`] if the configuration does not validate
    /// - [`ConfigError::MissingRequired`] (`runtime`) if no scheduler was
    ///   supplied and the caller is not inside a Tokio runtime
    pub fn build<E: Entity>(self) -> FolioResult<PagePreloader<E>> {
        self.config.validate()?;

        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => {
                let handle = Handle::try_current().map_err(|_| ConfigError::MissingRequired {
                    field: "runtime".to_string(),
                })?;
                scheduler_for(self.config.scheduler, &handle)
            }
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        debug!(
            ttl_ms = self.config.ttl.as_millis() as u64,
            next_max = self.config.next_max,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "page preloader ready"
        );

        Ok(PagePreloader {
            cache: Arc::new(CacheStore::with_clock(self.config.ttl, Arc::clone(&clock))),
            images: Arc::new(ImageStore::new(self.config.max_image_handles)),
            scheduler,
            fetcher: self.fetcher.unwrap_or_else(|| Arc::new(NoopImageFetcher)),
            resolver: Arc::new(RwLock::new(self.resolver)),
            clock,
            config: self.config,
        })
    }
}

impl<E: Entity> PagePreloader<E> {
    /// Preloader with default collaborators on the current Tokio runtime.
    pub fn new(config: PreloadConfig) -> FolioResult<Self> {
        PagePreloaderBuilder::new().config(config).build()
    }

    pub fn builder() -> PagePreloaderBuilder {
        PagePreloaderBuilder::new()
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.config
    }

    /// The underlying data cache.
    pub fn cache(&self) -> &CacheStore<CachedValue<E>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Install or replace the component resolver.
    pub fn attach(&self, resolver: Arc<dyn ComponentResolver>) {
        let mut slot = self
            .resolver
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(resolver);
    }

    // ========================================================================
    // LISTING
    // ========================================================================

    /// One page of the listing, 1-based.
    ///
    /// A hit returns the cached slice and does nothing else. A miss slices
    /// `sorted`, stores the slice, schedules warming of the next page and
    /// prefetches the covers of the first `next_max` items on this page.
    /// Pages past the end (and page 0) are empty, not errors.
    pub fn resolve_home_page(&self, sorted: &Arc<[E]>, page: usize, per_page: usize) -> Arc<[E]> {
        let key = CacheKey::home(page, per_page);
        if let Some(hit) = self.cached_page(&key) {
            trace!(%key, "listing hit");
            return hit;
        }

        let slice = self.store_page(key, sorted, page, per_page);
        debug!(page, per_page, len = slice.len(), "listing miss, warming next page");

        let this = self.clone();
        let sequence = Arc::clone(sorted);
        self.scheduler.schedule(
            async move { this.warm_next_home_page(&sequence, page, per_page) }.boxed(),
        );
        self.prefetch_covers(slice.iter().take(self.config.next_max));

        slice
    }

    /// Make sure page `page + 1` is cached, then warm the first `next_max`
    /// posts on it and the post view component. A page already cached is
    /// not recomputed.
    pub fn warm_next_home_page(&self, sorted: &Arc<[E]>, page: usize, per_page: usize) {
        let next_page = page.saturating_add(1);
        let key = CacheKey::home(next_page, per_page);
        let next = match self.cached_page(&key) {
            Some(cached) => cached,
            None => self.store_page(key, sorted, next_page, per_page),
        };

        for entity in next.iter().take(self.config.next_max) {
            let this = self.clone();
            let sequence = Arc::clone(sorted);
            let id = entity.id().to_string();
            self.scheduler
                .schedule(async move { this.preload_post(&sequence, &id) }.boxed());
            if let Some(cover) = entity.cover() {
                self.prefetch_image(cover);
            }
        }

        self.preload_component(POST_ROUTE);
    }

    // ========================================================================
    // POSTS
    // ========================================================================

    /// One entity by id.
    ///
    /// A hit returns immediately. A miss searches `sorted`, stores what it
    /// finds and schedules warming of the following posts and the listing
    /// component. The warm-up is scheduled for an unknown id too: it finds no
    /// neighbours but still warms the component. A found entity also has its
    /// cover prefetched.
    pub fn resolve_post(&self, sorted: &Arc<[E]>, id: &str) -> Option<Arc<E>> {
        let key = CacheKey::post(id);
        if let Some(hit) = self.cached_post(&key) {
            trace!(%key, "post hit");
            return Some(hit);
        }

        let found = match locate(sorted, id) {
            Ok((_, entity)) => {
                let entity = Arc::new(entity.clone());
                self.cache.set(key, CachedValue::Post(Arc::clone(&entity)));
                Some(entity)
            }
            Err(error) => {
                debug!(%error, "post not in sequence");
                None
            }
        };

        let this = self.clone();
        let sequence = Arc::clone(sorted);
        let owned_id = id.to_string();
        self.scheduler.schedule(
            async move { this.warm_neighbors_of_post(&sequence, &owned_id) }.boxed(),
        );
        if let Some(cover) = found.as_deref().and_then(Entity::cover) {
            self.prefetch_image(cover);
        }

        found
    }

    /// Cache one entity if it is not cached already. Schedules nothing.
    pub fn preload_post(&self, sorted: &Arc<[E]>, id: &str) {
        let key = CacheKey::post(id);
        if self.cached_post(&key).is_some() {
            return;
        }
        match locate(sorted, id) {
            Ok((_, found)) => {
                trace!(id, "preloaded post");
                self.cache.set(key, CachedValue::post(found.clone()));
            }
            Err(error) => trace!(%error, "nothing to preload"),
        }
    }

    /// Schedule preloading of the posts that follow `id` in `sorted`, at most
    /// `min(next_max, 2)` of them, then warm the listing component. The
    /// component is warmed even when `id` is unknown.
    pub fn warm_neighbors_of_post(&self, sorted: &Arc<[E]>, id: &str) {
        if let Ok((index, _)) = locate(sorted, id) {
            let window = self.config.next_max.min(MAX_POST_NEIGHBORS);
            for neighbor in sorted.iter().skip(index + 1).take(window) {
                let this = self.clone();
                let sequence = Arc::clone(sorted);
                let neighbor_id = neighbor.id().to_string();
                self.scheduler.schedule(
                    async move { this.preload_post(&sequence, &neighbor_id) }.boxed(),
                );
            }
        }

        self.preload_component(HOME_ROUTE);
    }

    /// Refresh a post from an edited copy. Same rule as [`Self::refresh_if_stale`].
    pub fn refresh_post(&self, entity: E) -> bool {
        let key = CacheKey::post(entity.id());
        self.refresh_if_stale(&key, CachedValue::post(entity))
    }

    // ========================================================================
    // CACHE PASS-THROUGH
    // ========================================================================

    /// Replace a cached value when `fresh` carries a different non-zero
    /// version. Never creates an entry.
    pub fn refresh_if_stale(&self, key: &CacheKey, fresh: CachedValue<E>) -> bool {
        let replaced = self.cache.update_if_stale(key, fresh);
        if replaced {
            debug!(%key, "refreshed stale entry");
        }
        replaced
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.cache.invalidate(key)
    }

    // ========================================================================
    // IMAGES
    // ========================================================================

    /// Warm an image in the background.
    ///
    /// Skipped while a fresh `Ok` record exists. Otherwise a direct load is
    /// tried first, then a binary fetch whose bytes become a local handle.
    /// Both are deadline-guarded; if both fail the URL is recorded as `Err`.
    pub fn prefetch_image(&self, url: &str) {
        let now = self.clock.now();
        if self.images.is_fresh_ok(url, now, self.config.ttl) {
            trace!(url, "image still fresh");
            return;
        }

        let this = self.clone();
        let url = url.to_string();
        self.scheduler
            .schedule(async move { this.load_image(url).await }.boxed());
    }

    /// The local handle URI for `url` if a fallback fetch produced one,
    /// otherwise `url` unchanged.
    pub fn resolve_image_source(&self, url: &str) -> String {
        self.images.resolve_source(url)
    }

    /// Drop the local handle held for `url`. The record stays `Ok`.
    pub fn release_image_handle(&self, url: &str) -> bool {
        self.images.release_handle(url)
    }

    pub fn image_record(&self, url: &str) -> Option<ImageRecord> {
        self.images.get(url)
    }

    async fn load_image(&self, url: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let target = url.clone();
        let direct = flatten(
            with_deadline(
                async move { fetcher.load_direct(&target).await },
                self.config.timeout,
            )
            .await,
        );

        match direct {
            Ok(()) => {
                trace!(url = %url, "image loaded directly");
                self.images.record_ok(&url, None, self.clock.now());
                return;
            }
            Err(err) => debug!(url = %url, error = %err, "direct image load failed, fetching bytes"),
        }

        let fetcher = Arc::clone(&self.fetcher);
        let target = url.clone();
        let fetched = flatten(
            with_deadline(
                async move { fetcher.fetch_bytes(&target).await },
                self.config.timeout,
            )
            .await,
        );

        match fetched {
            Ok(bytes) => {
                let handle = ImageHandle::new(bytes);
                trace!(url = %url, handle = %handle.uri(), "image held locally");
                self.images.record_ok(&url, Some(handle), self.clock.now());
            }
            Err(err) => {
                debug!(url = %url, error = %err, "image prefetch failed");
                self.images.record_err(&url, self.clock.now());
            }
        }
    }

    // ========================================================================
    // COMPONENTS
    // ========================================================================

    /// Warm a named view component.
    ///
    /// Only lazily loaded components do anything: their loader is scheduled
    /// under the deadline. Eager components, unknown names and a missing
    /// resolver are all no-ops.
    pub fn preload_component(&self, name: &str) {
        let resolver = self
            .resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(resolver) = resolver else {
            return;
        };
        let Some(route) = resolver.find(name) else {
            trace!(name, "no such route");
            return;
        };
        let Component::Lazy(loader) = route.component else {
            return;
        };

        let deadline = self.config.timeout;
        let name = route.name;
        self.scheduler.schedule(
            async move {
                match flatten(with_deadline(loader(), deadline).await) {
                    Ok(()) => trace!(name = %name, "component warmed"),
                    Err(err) => debug!(name = %name, error = %err, "component warm-up failed"),
                }
            }
            .boxed(),
        );
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn cached_page(&self, key: &CacheKey) -> Option<Arc<[E]>> {
        self.cache.get(key).and_then(|value| value.as_page().cloned())
    }

    fn cached_post(&self, key: &CacheKey) -> Option<Arc<E>> {
        self.cache.get(key).and_then(|value| value.as_post().cloned())
    }

    fn store_page(&self, key: CacheKey, sorted: &[E], page: usize, per_page: usize) -> Arc<[E]> {
        let slice: Arc<[E]> = page_slice(sorted, page, per_page).into();
        self.cache.set(key, CachedValue::Page(Arc::clone(&slice)));
        slice
    }

    fn prefetch_covers<'a>(&self, entities: impl Iterator<Item = &'a E>) {
        for entity in entities {
            if let Some(cover) = entity.cover() {
                self.prefetch_image(cover);
            }
        }
    }
}

/// Items `[(page - 1) * per_page, page * per_page)` clamped to the sequence.
fn page_slice<E: Clone>(sorted: &[E], page: usize, per_page: usize) -> Vec<E> {
    if page == 0 || per_page == 0 {
        return Vec::new();
    }
    let start = (page - 1).saturating_mul(per_page);
    if start >= sorted.len() {
        return Vec::new();
    }
    let end = start.saturating_add(per_page).min(sorted.len());
    sorted[start..end].to_vec()
}

/// Position and entity for `id`. A miss is `NotFound` keyed by the post's cache key.
fn locate<'a, E: Entity>(sorted: &'a [E], id: &str) -> Result<(usize, &'a E), PreloadError> {
    sorted
        .iter()
        .enumerate()
        .find(|(_, entity)| entity.id() == id)
        .ok_or_else(|| PreloadError::NotFound {
            key: CacheKey::post(id).to_string(),
        })
}

fn flatten<T>(outcome: Result<FolioResult<T>, PreloadError>) -> FolioResult<T> {
    outcome.map_err(FolioError::from).and_then(|inner| inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::image::ImageStatus;
    use crate::routes::RouteTable;
    use crate::scheduler::ManualScheduler;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use folio_core::Article;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn articles(n: usize) -> Arc<[Article]> {
        (0..n)
            .map(|i| {
                Article::new(format!("a{i}"), format!("Article {i}"))
                    .with_cover(format!("https://img/{i}.png"))
                    .with_published_at(Utc.timestamp_opt(1_700_000_000 - i as i64 * 60, 0).unwrap())
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn ids(slice: &[Article]) -> Vec<&str> {
        slice.iter().map(|a| a.id.as_str()).collect()
    }

    struct Harness {
        preloader: PagePreloader<Article>,
        scheduler: Arc<ManualScheduler>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(config: PreloadConfig, fetcher: Arc<dyn ImageFetcher>) -> Harness {
        let scheduler = Arc::new(ManualScheduler::new());
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let preloader = PagePreloaderBuilder::new()
            .config(config)
            .scheduler(scheduler.clone())
            .clock(clock.clone())
            .fetcher(fetcher)
            .build()
            .unwrap();
        Harness {
            preloader,
            scheduler,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(PreloadConfig::default(), Arc::new(NoopImageFetcher))
    }

    /// Direct loads fail, byte fetches succeed.
    struct FallbackOnly;

    #[async_trait]
    impl ImageFetcher for FallbackOnly {
        async fn load_direct(&self, url: &str) -> FolioResult<()> {
            Err(PreloadError::FetchFailure {
                url: url.to_string(),
                reason: "cross-origin".to_string(),
            }
            .into())
        }

        async fn fetch_bytes(&self, _url: &str) -> FolioResult<Vec<u8>> {
            Ok(vec![0xFF, 0xD8])
        }
    }

    #[test]
    fn test_page_slice_bounds() {
        let items: Vec<u32> = (0..7).collect();
        assert_eq!(page_slice(&items, 1, 3), vec![0, 1, 2]);
        assert_eq!(page_slice(&items, 3, 3), vec![6]);
        assert!(page_slice(&items, 4, 3).is_empty());
        assert!(page_slice(&items, 0, 3).is_empty());
        assert!(page_slice(&items, 1, 0).is_empty());
        assert!(page_slice(&items, usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn test_build_outside_runtime_needs_scheduler() {
        let result = PagePreloader::<Article>::new(PreloadConfig::default());
        assert_eq!(
            result.unwrap_err(),
            FolioError::Config(ConfigError::MissingRequired {
                field: "runtime".to_string()
            })
        );
    }

    #[test]
    fn test_locate_reports_not_found_by_cache_key() {
        let sorted = articles(3);
        assert_eq!(locate(&sorted, "a1").map(|(index, _)| index), Ok(1));
        assert_eq!(
            locate(&sorted, "missing").map(|(index, _)| index),
            Err(PreloadError::NotFound {
                key: "post:missing".to_string()
            })
        );
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = PagePreloaderBuilder::new()
            .config(PreloadConfig::default().with_ttl(Duration::ZERO))
            .scheduler(Arc::new(ManualScheduler::new()))
            .build::<Article>();
        assert!(matches!(
            result,
            Err(FolioError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[tokio::test]
    async fn test_home_miss_stores_and_schedules() {
        let h = harness();
        let sorted = articles(7);

        let page = h.preloader.resolve_home_page(&sorted, 1, 3);
        assert_eq!(ids(&page), vec!["a0", "a1", "a2"]);
        // next-page warm + two cover prefetches
        assert_eq!(h.scheduler.pending(), 3);
        assert!(!h.preloader.cache().contains_fresh(&CacheKey::home(2, 3)));

        h.scheduler.flush().await;
        assert!(h.preloader.cache().contains_fresh(&CacheKey::home(2, 3)));
        assert!(h.preloader.cache().contains_fresh(&CacheKey::post("a3")));
        assert!(h.preloader.cache().contains_fresh(&CacheKey::post("a4")));
        assert!(!h.preloader.cache().contains_fresh(&CacheKey::post("a5")));
    }

    #[tokio::test]
    async fn test_home_hit_has_no_side_effects() {
        let h = harness();
        let sorted = articles(7);

        let first = h.preloader.resolve_home_page(&sorted, 1, 3);
        h.scheduler.flush().await;
        let submitted = h.scheduler.submitted();

        let second = h.preloader.resolve_home_page(&sorted, 1, 3);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.scheduler.submitted(), submitted);
    }

    #[tokio::test]
    async fn test_home_page_expires_after_ttl() {
        let h = harness();
        let sorted = articles(7);

        let first = h.preloader.resolve_home_page(&sorted, 1, 3);
        h.clock.advance(h.preloader.config().ttl + Duration::from_millis(1));
        let second = h.preloader.resolve_home_page(&sorted, 1, 3);

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(h.preloader.cache_stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_warm_next_page_does_not_recompute() {
        let h = harness();
        let sorted = articles(7);

        h.preloader.warm_next_home_page(&sorted, 1, 3);
        let warmed = h.preloader.resolve_home_page(&sorted, 2, 3);
        h.preloader.warm_next_home_page(&sorted, 1, 3);
        let again = h.preloader.resolve_home_page(&sorted, 2, 3);

        assert!(Arc::ptr_eq(&warmed, &again));
    }

    #[tokio::test]
    async fn test_resolve_post_found_and_missing() {
        let h = harness();
        let sorted = articles(5);

        let post = h.preloader.resolve_post(&sorted, "a1").unwrap();
        assert_eq!(post.id, "a1");
        // neighbour warm + cover prefetch
        assert_eq!(h.scheduler.pending(), 2);

        h.scheduler.flush().await;
        assert!(h.preloader.cache().contains_fresh(&CacheKey::post("a2")));
        assert!(h.preloader.cache().contains_fresh(&CacheKey::post("a3")));
        assert!(!h.preloader.cache().contains_fresh(&CacheKey::post("a4")));

        assert!(h.preloader.resolve_post(&sorted, "zz").is_none());
        // neighbour warm only: no cover to prefetch
        assert_eq!(h.scheduler.pending(), 1);
        assert_eq!(h.scheduler.flush().await, 1);
        assert!(!h.preloader.cache().contains_fresh(&CacheKey::post("zz")));
    }

    #[tokio::test]
    async fn test_neighbor_window_respects_next_max() {
        let h = harness_with(
            PreloadConfig::default().with_next_max(1),
            Arc::new(NoopImageFetcher),
        );
        let sorted = articles(5);

        h.preloader.warm_neighbors_of_post(&sorted, "a0");
        assert_eq!(h.scheduler.flush().await, 1);
        assert!(h.preloader.cache().contains_fresh(&CacheKey::post("a1")));
        assert!(!h.preloader.cache().contains_fresh(&CacheKey::post("a2")));
    }

    #[tokio::test]
    async fn test_neighbors_of_last_post() {
        let h = harness();
        let sorted = articles(3);

        h.preloader.warm_neighbors_of_post(&sorted, "a2");
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_refresh_post_replaces_only_on_new_version() {
        let h = harness();
        let sorted = articles(3);
        h.preloader.resolve_post(&sorted, "a0");

        let same = sorted[0].clone();
        assert!(!h.preloader.refresh_post(same));

        let edited = sorted[0]
            .clone()
            .with_updated_at(Utc.timestamp_opt(1_800_000_000, 0).unwrap());
        assert!(h.preloader.refresh_post(edited));
        assert!(!h.preloader.refresh_post(Article::new("a9", "never cached").with_updated_at(Utc::now())));

        let cached = h.preloader.resolve_post(&sorted, "a0").unwrap();
        assert!(cached.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let h = harness();
        let sorted = articles(3);
        h.preloader.resolve_home_page(&sorted, 1, 3);

        assert!(h.preloader.invalidate(&CacheKey::home(1, 3)));
        assert!(!h.preloader.invalidate(&CacheKey::home(1, 3)));
    }

    #[tokio::test]
    async fn test_prefetch_direct_then_skip_while_fresh() {
        let h = harness();
        h.preloader.prefetch_image("https://img/x.png");
        h.scheduler.flush().await;

        let record = h.preloader.image_record("https://img/x.png").unwrap();
        assert_eq!(record.status, ImageStatus::Ok);
        assert!(record.handle.is_none());
        assert_eq!(h.preloader.resolve_image_source("https://img/x.png"), "https://img/x.png");

        h.preloader.prefetch_image("https://img/x.png");
        assert_eq!(h.scheduler.pending(), 0);

        h.clock.advance(h.preloader.config().ttl);
        h.preloader.prefetch_image("https://img/x.png");
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_fallback_produces_handle() {
        let h = harness_with(PreloadConfig::default(), Arc::new(FallbackOnly));
        h.preloader.prefetch_image("https://cdn/y.png");
        h.scheduler.flush().await;

        let source = h.preloader.resolve_image_source("https://cdn/y.png");
        assert!(source.starts_with("blob:folio/"));

        assert!(h.preloader.release_image_handle("https://cdn/y.png"));
        assert_eq!(h.preloader.resolve_image_source("https://cdn/y.png"), "https://cdn/y.png");
    }

    #[tokio::test]
    async fn test_component_warmup() {
        let h = harness();
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);

        // No resolver yet: nothing happens.
        h.preloader.preload_component(POST_ROUTE);
        assert_eq!(h.scheduler.pending(), 0);

        h.preloader.attach(Arc::new(
            RouteTable::new()
                .with_eager(HOME_ROUTE)
                .with_lazy(POST_ROUTE, move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
        ));

        h.preloader.preload_component(HOME_ROUTE);
        h.preloader.preload_component("archive");
        assert_eq!(h.scheduler.pending(), 0);

        h.preloader.preload_component(POST_ROUTE);
        h.scheduler.flush().await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
