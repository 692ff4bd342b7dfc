//! `[MODULE] Crawler` — the per-scan crawl state machine (`§4.5`).

mod extract;
mod fetcher;
mod politeness;
mod robots;

pub use extract::{extract_images, extract_same_origin_links, ExtractedImage};
pub use fetcher::{FetchedPage, PageError, PageFetcher, ReqwestPageFetcher};
pub use politeness::DomainPoliteness;
pub use robots::RobotsTxt;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{instrument, warn};
use url::Url;

use crate::aggregate_stats::Breakdown;
use crate::broadcaster::{ImageFound, PageProgress, ProgressBroadcaster};
use crate::config::AppConfig;
use crate::domain::{CrawlCheckpoint, DiscoveredImage, ScanId, StatsContribution};
use crate::image_analyzer::{ImageProbe, ImageProbeCache};
use crate::savings::{categorize, estimate};
use crate::store::{CheckpointRepository, ImageRepository};

/// Cooperative cancellation signal shared between a `Worker` and the
/// crawl it owns.
pub type CancelFlag = Arc<AtomicBool>;

#[must_use]
pub fn new_cancel_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub pages_scanned: u32,
    pub pages_discovered: u32,
    pub non_webp_images_found: u32,
    pub reached_page_limit: bool,
    /// Set only on a scan-level failure (`§4.5`: initial URL unreachable
    /// before any page succeeds, or an unrecoverable store error).
    pub error_message: Option<String>,
    pub breakdown: Breakdown,
}

/// Run (or resume) a scan's crawl to completion or a termination
/// condition, per `§4.5`. Page-level failures are swallowed; only the
/// conditions named in `§4.5`'s failure semantics abort the whole scan.
#[instrument(skip_all, fields(scan_id = %scan_id))]
pub async fn run_crawl<F, P, I, C>(
    scan_id: ScanId,
    target_url: &str,
    config: &AppConfig,
    fetcher: &F,
    probe: &P,
    probe_cache: &ImageProbeCache,
    politeness: &DomainPoliteness,
    image_repo: &I,
    checkpoint_repo: &C,
    broadcaster: &ProgressBroadcaster,
    cancel: &CancelFlag,
) -> anyhow::Result<CrawlOutcome>
where
    F: PageFetcher,
    P: ImageProbe,
    I: ImageRepository,
    C: CheckpointRepository,
{
    let start_url = match Url::parse(target_url) {
        Ok(url) => url,
        Err(err) => {
            return Ok(failed_outcome(format!("target URL is unparseable: {err}")));
        }
    };

    let mut checkpoint = match checkpoint_repo.get(scan_id).await? {
        Some(existing) => existing,
        None => CrawlCheckpoint::new(scan_id, start_url.to_string(), Utc::now()),
    };

    let mut seen_images: HashSet<String> =
        image_repo.list_for_scan(scan_id).await?.into_iter().map(|img| img.image_url).collect();

    let robots = fetch_robots(fetcher, &start_url).await;

    let deadline = Instant::now() + config.max_scan_duration();
    let max_pages = config.max_pages_per_scan();
    let checkpoint_every = config.checkpoint_every_pages();

    let mut pages_since_checkpoint: u32 = 0;
    let mut fetch_attempts: u32 = 0;
    let mut any_page_succeeded = false;

    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if checkpoint.pages_visited >= max_pages {
            break;
        }
        if Instant::now() >= deadline {
            break;
        }
        let Some(url) = checkpoint.pop_pending() else { break };

        let Ok(parsed) = Url::parse(&url) else {
            checkpoint.mark_visited(url, Utc::now());
            continue;
        };
        let path = parsed.path();
        if !robots.is_allowed(path) {
            checkpoint.mark_visited(url, Utc::now());
            continue;
        }

        let host = parsed.host_str().unwrap_or_default().to_string();
        politeness.wait_then_record(&host, config.per_request_delay()).await;

        fetch_attempts += 1;
        let fetched = match fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(err) => {
                checkpoint.mark_visited(url.clone(), Utc::now());
                warn!(%url, %err, "page fetch failed, skipping");
                continue;
            }
        };
        any_page_succeeded = true;

        if fetched.was_redirected || looks_like_login_redirect(&parsed, &fetched.final_url) {
            checkpoint.mark_visited(url, Utc::now());
            pages_since_checkpoint += 1;
            continue;
        }

        let links = extract_same_origin_links(&fetched.html, &parsed);
        for link in links {
            checkpoint.enqueue_if_new(link);
        }

        let images = extract_images(&fetched.html, &parsed);
        for image in images {
            if seen_images.contains(&image.url) {
                let _ = image_repo.append_sighting(scan_id, &image.url, &url).await;
                continue;
            }

            let probed = if let Some(cached) = probe_cache.get(&image.url) {
                cached
            } else {
                match probe.probe(&image.url).await {
                    Ok(result) => {
                        probe_cache.insert(image.url.clone(), result.clone());
                        result
                    }
                    Err(err) => {
                        warn!(image_url = %image.url, %err, "image probe failed, skipping");
                        continue;
                    }
                }
            };

            seen_images.insert(image.url.clone());
            if probed.is_webp {
                continue;
            }

            let savings = estimate(&probed.mime_type, probed.size_bytes);
            let potential_savings_bytes = savings.original_bytes.saturating_sub(savings.estimated_webp_bytes);

            let record = DiscoveredImage::first_sighting(
                scan_id,
                image.url.clone(),
                url.clone(),
                probed.mime_type.clone(),
                probed.size_bytes,
                None,
                None,
                savings.savings_percent,
                potential_savings_bytes,
                Utc::now(),
            );
            image_repo.insert(&record).await?;

            checkpoint.non_webp_images_found += 1;

            broadcaster.image_found(ImageFound {
                scan_id,
                image_url: image.url,
                page_url: url.clone(),
                mime_type: probed.mime_type,
                size_bytes: probed.size_bytes,
                potential_savings_percent: savings.savings_percent,
            });
        }

        checkpoint.mark_visited(url.clone(), Utc::now());
        pages_since_checkpoint += 1;

        broadcaster.page_progress(PageProgress {
            scan_id,
            pages_scanned: checkpoint.pages_visited,
            pages_discovered: checkpoint.pages_discovered,
            non_webp_images_found: checkpoint.non_webp_images_found,
            current_url: Some(url),
        });

        if pages_since_checkpoint >= checkpoint_every {
            checkpoint_repo.upsert(&checkpoint).await?;
            pages_since_checkpoint = 0;
        }
    }

    if !any_page_succeeded && fetch_attempts > 0 {
        return Ok(failed_outcome("initial URL unreachable: every page fetch attempt failed".to_string()));
    }

    checkpoint_repo.upsert(&checkpoint).await?;

    // Recomputed from every DiscoveredImage row on the scan, not just the
    // ones found during this particular resume — a scan that crashed and
    // resumed must still contribute its earlier findings on completion.
    let breakdown = build_breakdown(image_repo, scan_id, checkpoint.pages_visited).await?;

    Ok(CrawlOutcome {
        pages_scanned: checkpoint.pages_visited,
        pages_discovered: checkpoint.pages_discovered,
        non_webp_images_found: checkpoint.non_webp_images_found,
        reached_page_limit: checkpoint.pages_discovered > checkpoint.pages_visited,
        error_message: None,
        breakdown,
    })
}

async fn build_breakdown<I: ImageRepository>(
    image_repo: &I,
    scan_id: ScanId,
    pages_crawled: u32,
) -> anyhow::Result<Breakdown> {
    let images = image_repo.list_for_scan(scan_id).await?;

    let mut by_mime: std::collections::HashMap<String, StatsContribution> = std::collections::HashMap::new();
    let mut by_category: std::collections::HashMap<String, StatsContribution> = std::collections::HashMap::new();
    let mut total = StatsContribution { pages_crawled, ..Default::default() };

    for image in &images {
        let contribution = StatsContribution {
            pages_crawled: 0,
            images_found: 1,
            original_size_bytes: image.size_bytes,
            estimated_webp_size_bytes: image.size_bytes.saturating_sub(image.potential_savings_bytes),
            sum_of_savings_percent: image.potential_savings_percent,
        };
        total.images_found += 1;
        total.original_size_bytes += contribution.original_size_bytes;
        total.estimated_webp_size_bytes += contribution.estimated_webp_size_bytes;
        total.sum_of_savings_percent += contribution.sum_of_savings_percent;

        accumulate(&mut by_mime, image.mime_type.clone(), contribution);
        let category = categorize(&image.image_url, None).as_str().to_string();
        accumulate(&mut by_category, category, contribution);
    }

    Ok(Breakdown { total, by_mime: by_mime.into_iter().collect(), by_category: by_category.into_iter().collect() })
}

fn accumulate(map: &mut std::collections::HashMap<String, StatsContribution>, key: String, delta: StatsContribution) {
    let entry = map.entry(key).or_default();
    entry.images_found += delta.images_found;
    entry.original_size_bytes += delta.original_size_bytes;
    entry.estimated_webp_size_bytes += delta.estimated_webp_size_bytes;
    entry.sum_of_savings_percent += delta.sum_of_savings_percent;
}

fn failed_outcome(message: String) -> CrawlOutcome {
    CrawlOutcome {
        pages_scanned: 0,
        pages_discovered: 0,
        non_webp_images_found: 0,
        reached_page_limit: false,
        error_message: Some(message),
        breakdown: Breakdown::default(),
    }
}

async fn fetch_robots<F: PageFetcher>(fetcher: &F, start_url: &Url) -> RobotsTxt {
    let Ok(robots_url) = start_url.join("/robots.txt") else {
        return RobotsTxt::allow_all();
    };
    match fetcher.fetch(robots_url.as_str()).await {
        Ok(page) if page.status == 200 => RobotsTxt::parse(&page.html),
        _ => RobotsTxt::allow_all(),
    }
}

/// Heuristic for a same-page "soft redirect" into a login/authwall flow
/// that a plain HTTP fetch cannot pass: the final URL moved to a
/// different host, or its path contains a common login marker.
fn looks_like_login_redirect(original: &Url, final_url: &str) -> bool {
    let Ok(final_parsed) = Url::parse(final_url) else { return false };
    if final_parsed.host_str() != original.host_str() {
        return true;
    }
    let path = final_parsed.path().to_ascii_lowercase();
    path.contains("/login") || path.contains("/signin") || path.contains("/sign-in")
}
