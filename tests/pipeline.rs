//! End-to-end pipeline tests driven against `InMemoryStore` and fake
//! `PageFetcher`/`ImageProbe` implementations, exercising the scenarios
//! the unit-level tests cannot reach on their own: submission through
//! completed scan, crash/resume checkpoint continuity, and zip expiry.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;

use webp_scan_core::crawler::{CancelFlag, DomainPoliteness, FetchedPage, PageError, PageFetcher};
use webp_scan_core::domain::ConvertedImageZip;
use webp_scan_core::image_analyzer::{ImageProbe, ImageProbeCache, ImageProbeResult, ProbeError};
use webp_scan_core::store::{CheckpointRepository, ImageRepository, InMemoryStore, ScanRepository, ZipRepository};
use webp_scan_core::{AppConfigBuilder, Application};

/// A tiny fixed site graph: `fetch` returns whatever page body was
/// registered for the URL, or a 404.
struct FakeFetcher {
    pages: HashMap<String, String>,
}

impl FakeFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self { pages: pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect() }
    }
}

impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, PageError> {
        match self.pages.get(url) {
            Some(html) => Ok(FetchedPage { final_url: url.to_string(), status: 200, html: html.clone(), was_redirected: false }),
            None => Err(PageError::Status(404)),
        }
    }
}

/// Reports every probed URL as a 100KB PNG — deterministic for savings
/// assertions without a real network.
struct FakeProbe;

impl ImageProbe for FakeProbe {
    async fn probe(&self, _url: &str) -> Result<ImageProbeResult, ProbeError> {
        Ok(ImageProbeResult { mime_type: "image/png".to_string(), size_bytes: 100_000, is_webp: false })
    }
}

fn site() -> Vec<(&'static str, &'static str)> {
    vec![(
        "https://example.test/",
        r#"<html><body>
            <a href="https://example.test/page2">next</a>
            <img src="https://example.test/hero.png" alt="hero banner">
        </body></html>"#,
    ), (
        "https://example.test/page2",
        r#"<html><body><img src="https://example.test/thumb.png" alt="thumbnail"></body></html>"#,
    )]
}

#[tokio::test]
async fn submitted_scan_runs_to_completion_and_updates_aggregate_stats() {
    let config = Arc::new(AppConfigBuilder::new().build());
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(FakeFetcher::new(&site()));
    let probe = Arc::new(FakeProbe);

    let app = Arc::new(Application::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        fetcher,
        probe,
    ));
    app.start_background_tasks().await.unwrap();

    let peer = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
    let outcome = app
        .submit_scan("https://example.test/", None, peer, None, false)
        .await
        .unwrap()
        .expect("submission should be admitted");

    let mut events = app.broadcaster().subscribe_to_scan(outcome.job.id);
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(remaining > std::time::Duration::ZERO, "scan did not complete in time");
        let event = tokio::time::timeout(remaining, events.recv()).await.unwrap().unwrap();
        if matches!(event, webp_scan_core::broadcaster::BroadcastEvent::ScanComplete(_)) {
            break;
        }
    }

    let job = ScanRepository::get(store.as_ref(), outcome.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, webp_scan_core::ScanStatus::Completed);
    assert_eq!(job.non_webp_images_found, 2);

    let stats = app.stats().snapshot().await.unwrap();
    assert_eq!(stats.total_images_found, 2);
    assert_eq!(stats.total_original_size_bytes, 200_000);
}

/// A fetcher that serves its first two calls (the `/robots.txt` probe
/// and the seed page) normally, then fails every call after, simulating
/// a crash mid-crawl; resuming with a working fetcher must pick up from
/// the persisted checkpoint rather than restarting from scratch.
struct FlakyThenFixedFetcher {
    inner: FakeFetcher,
    calls_made: AtomicU32,
}

impl PageFetcher for FlakyThenFixedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, PageError> {
        if self.calls_made.fetch_add(1, Ordering::SeqCst) < 2 {
            self.inner.fetch(url).await
        } else {
            Err(PageError::Timeout)
        }
    }
}

#[tokio::test]
async fn a_crashed_crawl_resumes_from_its_checkpoint_instead_of_restarting() {
    let config = AppConfigBuilder::new().build();
    let store = InMemoryStore::new();
    let politeness = DomainPoliteness::new();
    let cancel: CancelFlag = webp_scan_core::crawler::new_cancel_flag();
    let broadcaster = webp_scan_core::broadcaster::ProgressBroadcaster::new();
    let scan_id = webp_scan_core::ScanId::new();

    // First pass: only the first fetch (the seed page) succeeds, then
    // every subsequent fetch times out. The crawl must still report
    // success for the pages it did manage to visit (not a scan-level
    // failure, since at least one page succeeded).
    let flaky = FlakyThenFixedFetcher { inner: FakeFetcher::new(&site()), calls_made: AtomicU32::new(0) };
    let probe_cache = ImageProbeCache::new();
    let outcome = webp_scan_core::crawler::run_crawl(
        scan_id,
        "https://example.test/",
        &config,
        &flaky,
        &FakeProbe,
        &probe_cache,
        &politeness,
        &store,
        &store,
        &broadcaster,
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages_scanned, 1);
    assert!(outcome.error_message.is_none());

    let checkpoint = CheckpointRepository::get(&store, scan_id).await.unwrap().expect("checkpoint persisted");
    assert_eq!(checkpoint.pages_visited, 1);
    assert!(!checkpoint.pending_urls.is_empty(), "page2 should still be queued");

    // Resume with a fetcher that now works for everything.
    let working = FakeFetcher::new(&site());
    let outcome = webp_scan_core::crawler::run_crawl(
        scan_id,
        "https://example.test/",
        &config,
        &working,
        &FakeProbe,
        &probe_cache,
        &politeness,
        &store,
        &store,
        &broadcaster,
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages_scanned, 2);
    assert_eq!(outcome.non_webp_images_found, 2);
    let images = ImageRepository::list_for_scan(&store, scan_id).await.unwrap();
    assert_eq!(images.len(), 2, "no image should be double-counted across the crash/resume boundary");
}

#[tokio::test]
async fn an_expired_zip_artifact_is_purged_by_retention() {
    let store = Arc::new(InMemoryStore::new());
    let scan_id = webp_scan_core::ScanId::new();
    // Created 10 hours ago against the fixed 6-hour download window, so
    // this zip's `expires_at` already fell 4 hours in the past.
    let created_at = Utc::now() - chrono::Duration::hours(10);
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let zip = ConvertedImageZip::new(scan_id, tmp.path().to_path_buf(), "scan.zip".to_string(), 1_024, 3, created_at);
    ZipRepository::insert(store.as_ref(), &zip).await.unwrap();

    let expired = ZipRepository::list_expired(store.as_ref(), Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].download_id, zip.download_id);
}
