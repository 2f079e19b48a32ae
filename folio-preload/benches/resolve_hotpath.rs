use folio_preload::{
    Article, CacheKey, ManualScheduler, NoopImageFetcher, PagePreloader, PagePreloaderBuilder,
    PreloadConfig,
};
use folio_test_utils::fixtures::article_fixture;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn bench_preloader(scheduler: Arc<ManualScheduler>) -> PagePreloader<Article> {
    PagePreloaderBuilder::new()
        .config(PreloadConfig::default())
        .scheduler(scheduler)
        .fetcher(Arc::new(NoopImageFetcher))
        .build()
        .expect("build preloader")
}

fn bench_resolve_home_page(c: &mut Criterion) {
    let sorted = article_fixture(500);
    let scheduler = Arc::new(ManualScheduler::new());
    let preloader = bench_preloader(scheduler.clone());
    preloader.resolve_home_page(&sorted, 3, 20);

    c.bench_function("preload/home_hit", |b| {
        b.iter(|| {
            let page = preloader.resolve_home_page(&sorted, black_box(3), black_box(20));
            black_box(page.len());
        });
    });

    let key = CacheKey::home(7, 20);
    c.bench_function("preload/home_miss", |b| {
        b.iter(|| {
            preloader.invalidate(&key);
            let page = preloader.resolve_home_page(&sorted, black_box(7), black_box(20));
            scheduler.clear();
            black_box(page.len());
        });
    });
}

fn bench_resolve_post(c: &mut Criterion) {
    let sorted = article_fixture(500);
    let scheduler = Arc::new(ManualScheduler::new());
    let preloader = bench_preloader(scheduler.clone());
    let key = CacheKey::post("post-450");

    c.bench_function("preload/post_miss_linear_search", |b| {
        b.iter(|| {
            preloader.invalidate(&key);
            let post = preloader.resolve_post(&sorted, black_box("post-450"));
            scheduler.clear();
            black_box(post.is_some());
        });
    });
}

criterion_group!(benches, bench_resolve_home_page, bench_resolve_post);
criterion_main!(benches);
