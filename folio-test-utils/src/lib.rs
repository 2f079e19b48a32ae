//! FOLIO Test Utilities
//!
//! Centralized test infrastructure for the FOLIO workspace:
//! - Proptest generators for articles and sorted sequences
//! - Mock image fetcher and route table with call counters
//! - Test fixtures for common scenarios
//! - Custom assertions for cache contents

pub use folio_core::{
    sorted_by_recency, Article, Entity, FolioError, FolioResult, Origin, PreloadConfig,
    PreloadError, Timestamp,
};
pub use folio_preload::{
    CacheKey, ComponentResolver, ImageFetcher, ManualClock, ManualScheduler, PagePreloader,
    PagePreloaderBuilder, RouteTable, HOME_ROUTE, POST_ROUTE,
};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// MOCK IMAGE FETCHER
// ============================================================================

/// How one tier of [`MockImageFetcher`] responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBehavior {
    Succeed,
    Fail,
    /// Sleep, then succeed. Pair with a paused clock to exercise deadlines.
    Slow(Duration),
}

/// Scripted image fetcher that records every call.
#[derive(Debug)]
pub struct MockImageFetcher {
    direct: FetchBehavior,
    bytes: FetchBehavior,
    payload: Vec<u8>,
    direct_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
}

impl MockImageFetcher {
    /// Both tiers succeed.
    pub fn new() -> Self {
        Self {
            direct: FetchBehavior::Succeed,
            bytes: FetchBehavior::Succeed,
            payload: vec![0x89, b'P', b'N', b'G'],
            direct_calls: Mutex::new(Vec::new()),
            fetch_calls: Mutex::new(Vec::new()),
        }
    }

    /// Direct load fails, byte fetch succeeds.
    pub fn fallback_only() -> Self {
        Self::new().with_direct(FetchBehavior::Fail)
    }

    /// Both tiers fail.
    pub fn failing() -> Self {
        Self::new()
            .with_direct(FetchBehavior::Fail)
            .with_bytes(FetchBehavior::Fail)
    }

    pub fn with_direct(mut self, behavior: FetchBehavior) -> Self {
        self.direct = behavior;
        self
    }

    pub fn with_bytes(mut self, behavior: FetchBehavior) -> Self {
        self.bytes = behavior;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn direct_calls(&self) -> usize {
        lock(&self.direct_calls).len()
    }

    pub fn fetch_calls(&self) -> usize {
        lock(&self.fetch_calls).len()
    }

    /// Direct loads attempted for one URL.
    pub fn direct_calls_for(&self, url: &str) -> usize {
        lock(&self.direct_calls).iter().filter(|u| *u == url).count()
    }

    async fn respond(behavior: FetchBehavior, url: &str) -> FolioResult<()> {
        match behavior {
            FetchBehavior::Succeed => Ok(()),
            FetchBehavior::Fail => Err(PreloadError::FetchFailure {
                url: url.to_string(),
                reason: "scripted failure".to_string(),
            }
            .into()),
            FetchBehavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

impl Default for MockImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn load_direct(&self, url: &str) -> FolioResult<()> {
        lock(&self.direct_calls).push(url.to_string());
        Self::respond(self.direct, url).await
    }

    async fn fetch_bytes(&self, url: &str) -> FolioResult<Vec<u8>> {
        lock(&self.fetch_calls).push(url.to_string());
        Self::respond(self.bytes, url).await?;
        Ok(self.payload.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK ROUTES
// ============================================================================

/// The application's route table with a load counter per lazy route.
///
/// `home` is eager; `about`, `post` and `archive` are lazy.
#[derive(Debug, Clone)]
pub struct MockRoutes {
    pub table: RouteTable,
    pub post_loads: Arc<AtomicUsize>,
    pub about_loads: Arc<AtomicUsize>,
    pub archive_loads: Arc<AtomicUsize>,
}

impl MockRoutes {
    pub fn resolver(&self) -> Arc<dyn ComponentResolver> {
        Arc::new(self.table.clone())
    }

    pub fn post_loads(&self) -> usize {
        self.post_loads.load(Ordering::SeqCst)
    }

    /// Loads of the routes the preloader never warms.
    pub fn unrelated_loads(&self) -> usize {
        self.about_loads.load(Ordering::SeqCst) + self.archive_loads.load(Ordering::SeqCst)
    }
}

fn counting_loader(
    counter: &Arc<AtomicUsize>,
) -> impl Fn() -> std::future::Ready<FolioResult<()>> + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(()))
    }
}

/// Build the standard route table.
pub fn mock_routes() -> MockRoutes {
    let post_loads = Arc::new(AtomicUsize::new(0));
    let about_loads = Arc::new(AtomicUsize::new(0));
    let archive_loads = Arc::new(AtomicUsize::new(0));

    let table = RouteTable::new()
        .with_eager(HOME_ROUTE)
        .with_lazy("about", counting_loader(&about_loads))
        .with_lazy(POST_ROUTE, counting_loader(&post_loads))
        .with_lazy("archive", counting_loader(&archive_loads));

    MockRoutes {
        table,
        post_loads,
        about_loads,
        archive_loads,
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Filter used by [`init_test_tracing`] when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "folio_core=debug,folio_preload=debug";

/// Install a test-friendly subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to [`DEFAULT_TEST_FILTER`].
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating FOLIO entities.

    use super::*;
    use proptest::prelude::*;

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_origin() -> impl Strategy<Value = Origin> {
        prop_oneof![
            Just(Origin::Original),
            Just(Origin::Repost),
            Just(Origin::Translation),
        ]
    }

    /// Generate an optional cover URL.
    pub fn arb_cover() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[a-z]{1,8}".prop_map(|name| format!("https://img.folio.test/{name}.jpg")))
    }

    /// Generate an Article with any combination of timestamps.
    pub fn arb_article() -> impl Strategy<Value = Article> {
        (
            "[a-z0-9-]{1,16}",
            "[A-Za-z ]{1,40}",
            arb_cover(),
            0u32..60,
            arb_origin(),
            proptest::option::of(arb_timestamp()),
            proptest::option::of(arb_timestamp()),
        )
            .prop_map(
                |(id, title, cover, read_mins, origin, published_at, updated_at)| Article {
                    id,
                    title,
                    summary: String::new(),
                    tags: Vec::new(),
                    cover,
                    read_mins,
                    origin,
                    published_at,
                    updated_at,
                },
            )
    }

    /// Generate a content-store sequence: unique ids, most recent first.
    pub fn arb_sorted_articles(max_len: usize) -> impl Strategy<Value = Vec<Article>> {
        proptest::collection::vec(arb_article(), 0..=max_len).prop_map(|articles| {
            let unique = articles
                .into_iter()
                .enumerate()
                .map(|(i, mut article)| {
                    article.id = format!("{i}-{}", article.id);
                    article
                })
                .collect();
            sorted_by_recency(unique)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::TimeZone;

    /// Fixed instant all fixtures are anchored to.
    pub fn base_time() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Cover URL of fixture article `i`.
    pub fn cover_url(i: usize) -> String {
        format!("https://img.folio.test/covers/{i}.jpg")
    }

    /// `n` articles `post-0..post-{n-1}`, one hour apart, newest first, each
    /// with a cover.
    pub fn article_fixture(n: usize) -> Arc<[Article]> {
        let base = base_time();
        (0..n)
            .map(|i| {
                Article::new(format!("post-{i}"), format!("Post {i}"))
                    .with_cover(cover_url(i))
                    .with_published_at(base - chrono::Duration::hours(i as i64))
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// A clock frozen at [`base_time`].
    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(base_time()))
    }

    /// Deterministic preloader: manual scheduler, manual clock.
    pub struct TestPreloader {
        pub preloader: PagePreloader<Article>,
        pub scheduler: Arc<ManualScheduler>,
        pub clock: Arc<ManualClock>,
    }

    /// Build a [`TestPreloader`] around `fetcher`.
    pub fn test_preloader(
        config: PreloadConfig,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> FolioResult<TestPreloader> {
        let scheduler = Arc::new(ManualScheduler::new());
        let clock = manual_clock();
        let preloader = PagePreloaderBuilder::new()
            .config(config)
            .scheduler(scheduler.clone())
            .clock(clock.clone())
            .fetcher(fetcher)
            .build()?;
        Ok(TestPreloader {
            preloader,
            scheduler,
            clock,
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for cache and page contents.

    use super::*;

    /// Assert the ids of a page, in order.
    #[track_caller]
    pub fn assert_page_ids(page: &[Article], expected: &[&str]) {
        let ids: Vec<&str> = page.iter().map(|article| article.id.as_str()).collect();
        assert_eq!(ids, expected, "Unexpected page contents");
    }

    /// Assert that a live entry exists for `key`.
    #[track_caller]
    pub fn assert_cached(preloader: &PagePreloader<Article>, key: &CacheKey) {
        assert!(
            preloader.cache().contains_fresh(key),
            "Expected {key} to be cached, have: {:?}",
            preloader.cache().keys()
        );
    }

    /// Assert that no live entry exists for `key`.
    #[track_caller]
    pub fn assert_not_cached(preloader: &PagePreloader<Article>, key: &CacheKey) {
        assert!(
            !preloader.cache().contains_fresh(key),
            "Expected {key} not to be cached"
        );
    }

    /// Assert that a result is a deadline expiry.
    #[track_caller]
    pub fn assert_timeout<T: std::fmt::Debug>(result: &Result<T, PreloadError>) {
        match result {
            Err(err) if err.is_timeout() => {}
            other => panic!("Expected Timeout, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
