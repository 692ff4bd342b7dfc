//! `[MODULE] Retention` — periodic purge of expired scans and zip
//! artifacts (`§4.10`).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::aggregate_stats::{AggregateStatsHandle, Breakdown};
use crate::domain::{ScanStatus, StatsContribution};
use crate::store::{CheckpointRepository, ImageRepository, ScanRepository, ZipRepository};

/// One pass of the retention sweep: scan TTL purge, then zip TTL purge.
/// Errors on an individual scan/zip are logged and skipped — `§7`:
/// "Retention errors: logged, next tick retries."
pub async fn run_once<R, I, C, Z>(scan_repo: &R, image_repo: &I, checkpoint_repo: &C, zip_repo: &Z, stats: &AggregateStatsHandle, scan_ttl: chrono::Duration, zip_ttl_hours: i64)
where
    R: ScanRepository,
    I: ImageRepository,
    C: CheckpointRepository,
    Z: ZipRepository,
{
    let _ = zip_ttl_hours; // fixed 6h window is enforced by ConvertedImageZip::new; kept for future TTL tuning.
    let now = Utc::now();

    let cutoff = now - scan_ttl;
    match scan_repo.list_older_than(cutoff).await {
        Ok(expired) => {
            for job in expired {
                if let Err(err) = purge_scan(scan_repo, image_repo, checkpoint_repo, zip_repo, stats, job.id, job.status).await {
                    error!(scan_id = %job.id, %err, "failed to purge expired scan, will retry next tick");
                }
            }
        }
        Err(err) => error!(%err, "failed to list expired scans"),
    }

    match zip_repo.list_expired(now).await {
        Ok(expired) => {
            for zip in expired {
                if let Err(err) = std::fs::remove_file(&zip.filesystem_path) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        warn!(download_id = %zip.download_id, %err, "failed to remove zip artifact from filesystem");
                    }
                }
                if let Err(err) = zip_repo.delete(zip.download_id).await {
                    error!(download_id = %zip.download_id, %err, "failed to delete expired zip row");
                }
            }
        }
        Err(err) => error!(%err, "failed to list expired zips"),
    }

    info!("retention sweep complete");
}

async fn purge_scan<R, I, C, Z>(
    scan_repo: &R,
    image_repo: &I,
    checkpoint_repo: &C,
    zip_repo: &Z,
    stats: &AggregateStatsHandle,
    scan_id: crate::domain::ScanId,
    status: ScanStatus,
) -> anyhow::Result<()>
where
    R: ScanRepository,
    I: ImageRepository,
    C: CheckpointRepository,
    Z: ZipRepository,
{
    if status == ScanStatus::Completed {
        let breakdown = breakdown_for_scan(image_repo, scan_id).await?;
        stats.subtract(breakdown).await?;
    }

    if let Some(zip) = zip_repo.get_for_scan(scan_id).await? {
        let _ = std::fs::remove_file(&zip.filesystem_path);
        zip_repo.delete(zip.download_id).await?;
    }

    image_repo.delete_for_scan(scan_id).await?;
    checkpoint_repo.delete(scan_id).await?;
    scan_repo.delete(scan_id).await?;
    Ok(())
}

async fn breakdown_for_scan<I: ImageRepository>(image_repo: &I, scan_id: crate::domain::ScanId) -> anyhow::Result<Breakdown> {
    let images = image_repo.list_for_scan(scan_id).await?;
    let mut by_mime: std::collections::HashMap<String, StatsContribution> = std::collections::HashMap::new();
    let mut total = StatsContribution::default();
    total.pages_crawled = 0;

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

        let entry = by_mime.entry(image.mime_type.clone()).or_default();
        entry.images_found += 1;
        entry.original_size_bytes += contribution.original_size_bytes;
        entry.estimated_webp_size_bytes += contribution.estimated_webp_size_bytes;
        entry.sum_of_savings_percent += contribution.sum_of_savings_percent;
    }

    Ok(Breakdown { total, by_mime: by_mime.into_iter().collect(), by_category: Vec::new() })
}

/// Run [`run_once`] on `interval` forever. Intended to be spawned as an
/// independent background task, per `§5`.
pub async fn run_periodic<R, I, C, Z>(
    scan_repo: Arc<R>,
    image_repo: Arc<I>,
    checkpoint_repo: Arc<C>,
    zip_repo: Arc<Z>,
    stats: AggregateStatsHandle,
    interval: Duration,
    scan_ttl: chrono::Duration,
    zip_ttl_hours: i64,
) where
    R: ScanRepository,
    I: ImageRepository,
    C: CheckpointRepository,
    Z: ZipRepository,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        run_once(scan_repo.as_ref(), image_repo.as_ref(), checkpoint_repo.as_ref(), zip_repo.as_ref(), &stats, scan_ttl, zip_ttl_hours).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiscoveredImage, ScanJob, SubmitterAddr};
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn purges_scans_older_than_the_ttl_and_subtracts_their_contribution() {
        let store = Arc::new(InMemoryStore::new());
        let stats = crate::aggregate_stats::spawn(Arc::clone(&store));

        let addr = SubmitterAddr::parse("203.0.113.1").unwrap();
        let old_created = Utc::now() - chrono::Duration::days(40);
        let mut job = ScanJob::new_queued("https://example.test/".into(), None, addr, 1, false, old_created);
        job.status = ScanStatus::Completed;
        job.completed_at = Some(old_created);
        ScanRepository::insert(store.as_ref(), &job).await.unwrap();

        let image = DiscoveredImage::first_sighting(
            job.id,
            "https://example.test/a.png".into(),
            "https://example.test/".into(),
            "image/png".into(),
            100_000,
            None,
            None,
            34.0,
            66_000,
            old_created,
        );
        ImageRepository::insert(store.as_ref(), &image).await.unwrap();
        stats
            .apply(Breakdown {
                total: StatsContribution { pages_crawled: 1, images_found: 1, original_size_bytes: 100_000, estimated_webp_size_bytes: 34_000, sum_of_savings_percent: 34.0 },
                by_mime: vec![],
                by_category: vec![],
            })
            .await
            .unwrap();

        run_once(store.as_ref(), store.as_ref(), store.as_ref(), store.as_ref(), &stats, chrono::Duration::days(30), 6).await;

        assert!(ScanRepository::get(store.as_ref(), job.id).await.unwrap().is_none());
        let snapshot = stats.snapshot().await.unwrap();
        assert_eq!(snapshot.total_images_found, 0);
    }
}
