//! Repository trait contracts, named in `§3` ("accessed through
//! repository contracts defined in `§6`").

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::{
    AggregateStats, CategoryStat, CrawlCheckpoint, ConvertedImageZip, DiscoveredImage,
    MimeTypeStat, ScanId, ScanJob, ScanStatus, StatsContribution, SubmitterAddr,
};

/// Persistence for [`ScanJob`] rows.
pub trait ScanRepository: Send + Sync {
    fn insert(&self, job: &ScanJob) -> impl std::future::Future<Output = Result<()>> + Send;
    fn get(&self, id: ScanId) -> impl std::future::Future<Output = Result<Option<ScanJob>>> + Send;
    /// Full replace of a job row; only the owning Worker calls this while
    /// the job is `Processing`, per `§3`'s ownership rule.
    fn update(&self, job: &ScanJob) -> impl std::future::Future<Output = Result<()>> + Send;
    fn list_by_status(&self, status: ScanStatus) -> impl std::future::Future<Output = Result<Vec<ScanJob>>> + Send;
    fn count_queued(&self) -> impl std::future::Future<Output = Result<usize>> + Send;
    fn count_queued_for_ip(&self, addr: &SubmitterAddr) -> impl std::future::Future<Output = Result<usize>> + Send;
    fn last_submission_at(&self, addr: &SubmitterAddr) -> impl std::future::Future<Output = Result<Option<DateTime<Utc>>>> + Send;
    /// 1-based count of jobs this submitter has ever created (queued or
    /// not), used to assign `submission_count` at enqueue time.
    fn submission_count_for_ip(&self, addr: &SubmitterAddr) -> impl std::future::Future<Output = Result<u32>> + Send;
    /// Atomically transition `Queued -> Processing` for exactly this job.
    /// Returns `false` if the job was not found in `Queued` state (lost
    /// the race to another worker, or already claimed).
    fn try_claim(&self, id: ScanId, now: DateTime<Utc>) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn delete(&self, id: ScanId) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Jobs created before the cutoff, for Retention purge.
    fn list_older_than(&self, cutoff: DateTime<Utc>) -> impl std::future::Future<Output = Result<Vec<ScanJob>>> + Send;
}

/// Persistence for [`DiscoveredImage`] rows.
pub trait ImageRepository: Send + Sync {
    fn find_by_url(&self, scan_id: ScanId, image_url: &str) -> impl std::future::Future<Output = Result<Option<DiscoveredImage>>> + Send;
    fn insert(&self, image: &DiscoveredImage) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Append a page sighting to an already-analyzed image. Returns
    /// `false` if no row exists for `(scan_id, image_url)`.
    fn append_sighting(&self, scan_id: ScanId, image_url: &str, page_url: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn list_for_scan(&self, scan_id: ScanId) -> impl std::future::Future<Output = Result<Vec<DiscoveredImage>>> + Send;
    fn delete_for_scan(&self, scan_id: ScanId) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Persistence for the (unique-per-scan) [`CrawlCheckpoint`].
pub trait CheckpointRepository: Send + Sync {
    fn upsert(&self, checkpoint: &CrawlCheckpoint) -> impl std::future::Future<Output = Result<()>> + Send;
    fn get(&self, scan_id: ScanId) -> impl std::future::Future<Output = Result<Option<CrawlCheckpoint>>> + Send;
    fn delete(&self, scan_id: ScanId) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Persistence for [`ConvertedImageZip`] artifacts.
pub trait ZipRepository: Send + Sync {
    fn insert(&self, zip: &ConvertedImageZip) -> impl std::future::Future<Output = Result<()>> + Send;
    fn get(&self, download_id: uuid::Uuid) -> impl std::future::Future<Output = Result<Option<ConvertedImageZip>>> + Send;
    fn get_for_scan(&self, scan_id: ScanId) -> impl std::future::Future<Output = Result<Option<ConvertedImageZip>>> + Send;
    fn delete(&self, download_id: uuid::Uuid) -> impl std::future::Future<Output = Result<()>> + Send;
    fn list_expired(&self, now: DateTime<Utc>) -> impl std::future::Future<Output = Result<Vec<ConvertedImageZip>>> + Send;
}

/// Persistence for the singleton [`AggregateStats`] row and its children.
///
/// `apply`/`subtract` must be atomic read-modify-write operations guarded
/// by the row's version token; implementations return the row actually
/// committed (after any internal retry) so callers never need to re-read.
pub trait StatsRepository: Send + Sync {
    fn get(&self) -> impl std::future::Future<Output = Result<AggregateStats>> + Send;
    fn apply(&self, delta: &StatsContribution) -> impl std::future::Future<Output = Result<AggregateStats>> + Send;
    fn subtract(&self, delta: &StatsContribution) -> impl std::future::Future<Output = Result<AggregateStats>> + Send;

    fn upsert_mime_stat(&self, mime_type: &str, delta: &StatsContribution) -> impl std::future::Future<Output = Result<MimeTypeStat>> + Send;
    fn subtract_mime_stat(&self, mime_type: &str, delta: &StatsContribution) -> impl std::future::Future<Output = Result<MimeTypeStat>> + Send;
    fn list_mime_stats(&self) -> impl std::future::Future<Output = Result<Vec<MimeTypeStat>>> + Send;

    fn upsert_category_stat(&self, category: &str, delta: &StatsContribution) -> impl std::future::Future<Output = Result<CategoryStat>> + Send;
    fn subtract_category_stat(&self, category: &str, delta: &StatsContribution) -> impl std::future::Future<Output = Result<CategoryStat>> + Send;
    fn list_category_stats(&self) -> impl std::future::Future<Output = Result<Vec<CategoryStat>>> + Send;
}
