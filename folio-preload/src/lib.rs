//! FOLIO Preload - Page/Entity Cache with Speculative Preloading
//!
//! A time-bounded cache over an already-sorted content sequence. Views read
//! through [`PagePreloader`]; on a miss it fills the cache and schedules
//! background warming of whatever the reader is likely to open next.
//!
//! The HTTP image fetcher lives behind the `http` feature.

pub mod cache;
pub mod clock;
pub mod deadline;
pub mod image;
pub mod preloader;
pub mod routes;
pub mod scheduler;

pub use cache::{CacheEntry, CacheKey, CacheStats, CacheStore, CachedValue, Versioned};
pub use clock::{Clock, ManualClock, SystemClock};
pub use deadline::with_deadline;
#[cfg(feature = "http")]
pub use image::HttpImageFetcher;
pub use image::{
    ImageFetcher, ImageHandle, ImageRecord, ImageStatus, ImageStore, NoopImageFetcher,
};
pub use preloader::{PagePreloader, PagePreloaderBuilder};
pub use routes::{
    Component, ComponentLoader, ComponentResolver, RouteEntry, RouteTable, HOME_ROUTE, POST_ROUTE,
};
pub use scheduler::{
    scheduler_for, DeferredScheduler, IdleScheduler, Job, ManualScheduler, Scheduler,
};

// Re-exported so callers need only one import for the common types.
pub use folio_core::{
    Article, Entity, FolioError, FolioResult, PreloadConfig, PreloadError, SchedulerMode,
    Timestamp,
};
