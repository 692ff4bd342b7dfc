//! `GetCurrentProgress` reconnect snapshot (`§4.9`).
//!
//! A Checkpoint, when present, is the more current view of a `Processing`
//! job than the `ScanJob` row itself (the row is only written back at
//! checkpoint boundaries), so it is preferred whenever both exist.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{ScanId, ScanStatus};
use crate::scheduler;
use crate::store::{CheckpointRepository, ScanRepository};

use super::types::ScanProgressSnapshot;

/// Look up the current progress for `scan_id`, or `None` if no such scan
/// exists. Per the Open Question decision recorded in `DESIGN.md`, the
/// snapshot never includes `total_in_queue`.
pub async fn get_current_progress<S, C>(
    scan_repo: &Arc<S>,
    checkpoint_repo: &Arc<C>,
    scan_id: ScanId,
) -> anyhow::Result<Option<ScanProgressSnapshot>>
where
    S: ScanRepository,
    C: CheckpointRepository,
{
    let Some(job) = scan_repo.get(scan_id).await? else {
        return Ok(None);
    };

    let checkpoint = checkpoint_repo.get(scan_id).await?;

    let (pages_scanned, pages_discovered, non_webp_images_count, current_url) =
        if let Some(cp) = &checkpoint {
            (cp.pages_visited, cp.pages_discovered, cp.non_webp_images_found, cp.current_url.clone())
        } else {
            (job.pages_scanned, job.pages_discovered, job.non_webp_images_found, None)
        };

    let queue_position = if job.status == ScanStatus::Queued {
        let queued = scan_repo.list_by_status(ScanStatus::Queued).await?;
        scheduler::queue_position(&queued, scan_id, Utc::now())
    } else {
        None
    };

    let progress_percent = if pages_discovered > 0 {
        Some((f64::from(pages_scanned) / f64::from(pages_discovered) * 100.0).min(100.0))
    } else {
        None
    };

    Ok(Some(ScanProgressSnapshot {
        status: job.status,
        pages_scanned,
        pages_discovered,
        non_webp_images_count,
        queue_position,
        progress_percent,
        current_url,
        error_message: job.error_message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScanJob, SubmitterAddr};
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn unknown_scan_returns_none() {
        let store = Arc::new(InMemoryStore::new());
        let result = get_current_progress(&store, &store, ScanId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn queued_job_reports_its_position() {
        let store = Arc::new(InMemoryStore::new());
        let addr = SubmitterAddr::parse("203.0.113.1").unwrap();
        let job = ScanJob::new_queued("https://example.test/".into(), None, addr, 1, false, Utc::now());
        let id = job.id;
        store.insert(&job).await.unwrap();

        let snapshot = get_current_progress(&store, &store, id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, ScanStatus::Queued);
        assert_eq!(snapshot.queue_position, Some(1));
    }
}
