//! In-memory repository implementation used by tests and the demo binary.
//!
//! Mirrors the teacher's `DashMap`-for-concurrent-lookups style
//! (`rate_limiter.rs`, `domain_limiter.rs`) rather than a single global
//! mutex, even though nothing here is performance-critical; it keeps the
//! concurrency shape consistent with the rest of the crate.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::domain::{
    AggregateStats, CategoryStat, CrawlCheckpoint, ConvertedImageZip, DiscoveredImage,
    MimeTypeStat, ScanId, ScanJob, ScanStatus, StatsContribution, SubmitterAddr,
};

use super::traits::{CheckpointRepository, ImageRepository, ScanRepository, StatsRepository, ZipRepository};

/// Backs all five repository traits with plain in-process maps.
#[derive(Clone)]
pub struct InMemoryStore {
    jobs: Arc<DashMap<ScanId, ScanJob>>,
    images: Arc<DashMap<ScanId, Vec<DiscoveredImage>>>,
    checkpoints: Arc<DashMap<ScanId, CrawlCheckpoint>>,
    zips: Arc<DashMap<uuid::Uuid, ConvertedImageZip>>,
    stats: Arc<Mutex<AggregateStats>>,
    mime_stats: Arc<DashMap<String, MimeTypeStat>>,
    category_stats: Arc<DashMap<String, CategoryStat>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            images: Arc::new(DashMap::new()),
            checkpoints: Arc::new(DashMap::new()),
            zips: Arc::new(DashMap::new()),
            stats: Arc::new(Mutex::new(AggregateStats::default())),
            mime_stats: Arc::new(DashMap::new()),
            category_stats: Arc::new(DashMap::new()),
        }
    }
}

impl ScanRepository for InMemoryStore {
    async fn insert(&self, job: &ScanJob) -> Result<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: ScanId) -> Result<Option<ScanJob>> {
        Ok(self.jobs.get(&id).map(|j| j.clone()))
    }

    async fn update(&self, job: &ScanJob) -> Result<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn list_by_status(&self, status: ScanStatus) -> Result<Vec<ScanJob>> {
        Ok(self
            .jobs
            .iter()
            .filter(|e| e.value().status == status)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn count_queued(&self) -> Result<usize> {
        Ok(self
            .jobs
            .iter()
            .filter(|e| e.value().status == ScanStatus::Queued)
            .count())
    }

    async fn count_queued_for_ip(&self, addr: &SubmitterAddr) -> Result<usize> {
        Ok(self
            .jobs
            .iter()
            .filter(|e| e.value().status == ScanStatus::Queued && &e.value().submitter_addr == addr)
            .count())
    }

    async fn last_submission_at(&self, addr: &SubmitterAddr) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .jobs
            .iter()
            .filter(|e| &e.value().submitter_addr == addr)
            .map(|e| e.value().created_at)
            .max())
    }

    async fn submission_count_for_ip(&self, addr: &SubmitterAddr) -> Result<u32> {
        Ok(self
            .jobs
            .iter()
            .filter(|e| &e.value().submitter_addr == addr)
            .count() as u32
            + 1)
    }

    async fn try_claim(&self, id: ScanId, now: DateTime<Utc>) -> Result<bool> {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if entry.status != ScanStatus::Queued {
            return Ok(false);
        }
        entry.status = ScanStatus::Processing;
        entry.started_at = Some(now);
        Ok(true)
    }

    async fn delete(&self, id: ScanId) -> Result<()> {
        self.jobs.remove(&id);
        self.checkpoints.remove(&id);
        self.images.remove(&id);
        let stale: Vec<_> = self
            .zips
            .iter()
            .filter(|e| e.value().scan_id == id)
            .map(|e| *e.key())
            .collect();
        for k in stale {
            self.zips.remove(&k);
        }
        Ok(())
    }

    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScanJob>> {
        Ok(self
            .jobs
            .iter()
            .filter(|e| e.value().created_at < cutoff)
            .map(|e| e.value().clone())
            .collect())
    }
}

impl ImageRepository for InMemoryStore {
    async fn find_by_url(&self, scan_id: ScanId, image_url: &str) -> Result<Option<DiscoveredImage>> {
        Ok(self
            .images
            .get(&scan_id)
            .and_then(|v| v.iter().find(|img| img.image_url == image_url).cloned()))
    }

    async fn insert(&self, image: &DiscoveredImage) -> Result<()> {
        self.images.entry(image.scan_id).or_default().push(image.clone());
        Ok(())
    }

    async fn append_sighting(&self, scan_id: ScanId, image_url: &str, page_url: &str) -> Result<bool> {
        let Some(mut images) = self.images.get_mut(&scan_id) else {
            return Ok(false);
        };
        if let Some(img) = images.iter_mut().find(|img| img.image_url == image_url) {
            img.record_sighting(page_url.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list_for_scan(&self, scan_id: ScanId) -> Result<Vec<DiscoveredImage>> {
        Ok(self.images.get(&scan_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn delete_for_scan(&self, scan_id: ScanId) -> Result<()> {
        self.images.remove(&scan_id);
        Ok(())
    }
}

impl CheckpointRepository for InMemoryStore {
    async fn upsert(&self, checkpoint: &CrawlCheckpoint) -> Result<()> {
        self.checkpoints.insert(checkpoint.scan_id, checkpoint.clone());
        Ok(())
    }

    async fn get(&self, scan_id: ScanId) -> Result<Option<CrawlCheckpoint>> {
        Ok(self.checkpoints.get(&scan_id).map(|c| c.clone()))
    }

    async fn delete(&self, scan_id: ScanId) -> Result<()> {
        self.checkpoints.remove(&scan_id);
        Ok(())
    }
}

impl ZipRepository for InMemoryStore {
    async fn insert(&self, zip: &ConvertedImageZip) -> Result<()> {
        self.zips.insert(zip.download_id, zip.clone());
        Ok(())
    }

    async fn get(&self, download_id: uuid::Uuid) -> Result<Option<ConvertedImageZip>> {
        Ok(self.zips.get(&download_id).map(|z| z.clone()))
    }

    async fn get_for_scan(&self, scan_id: ScanId) -> Result<Option<ConvertedImageZip>> {
        Ok(self
            .zips
            .iter()
            .find(|e| e.value().scan_id == scan_id)
            .map(|e| e.value().clone()))
    }

    async fn delete(&self, download_id: uuid::Uuid) -> Result<()> {
        self.zips.remove(&download_id);
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ConvertedImageZip>> {
        Ok(self
            .zips
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.value().clone())
            .collect())
    }
}

impl StatsRepository for InMemoryStore {
    async fn get(&self) -> Result<AggregateStats> {
        Ok(self.stats.lock().clone())
    }

    async fn apply(&self, delta: &StatsContribution) -> Result<AggregateStats> {
        let mut guard = self.stats.lock();
        guard.apply_contribution(delta, Utc::now());
        Ok(guard.clone())
    }

    async fn subtract(&self, delta: &StatsContribution) -> Result<AggregateStats> {
        let mut guard = self.stats.lock();
        guard.subtract_contribution(delta, Utc::now());
        Ok(guard.clone())
    }

    async fn upsert_mime_stat(&self, mime_type: &str, delta: &StatsContribution) -> Result<MimeTypeStat> {
        let mut entry = self
            .mime_stats
            .entry(mime_type.to_string())
            .or_insert_with(|| MimeTypeStat::new(mime_type.to_string()));
        entry.image_count += delta.images_found;
        entry.original_size_bytes += delta.original_size_bytes;
        entry.estimated_webp_size_bytes += delta.estimated_webp_size_bytes;
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn subtract_mime_stat(&self, mime_type: &str, delta: &StatsContribution) -> Result<MimeTypeStat> {
        let mut entry = self
            .mime_stats
            .entry(mime_type.to_string())
            .or_insert_with(|| MimeTypeStat::new(mime_type.to_string()));
        entry.image_count = entry.image_count.saturating_sub(delta.images_found);
        entry.original_size_bytes = entry
            .original_size_bytes
            .saturating_sub(delta.original_size_bytes);
        entry.estimated_webp_size_bytes = entry
            .estimated_webp_size_bytes
            .saturating_sub(delta.estimated_webp_size_bytes);
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn list_mime_stats(&self) -> Result<Vec<MimeTypeStat>> {
        Ok(self.mime_stats.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_category_stat(&self, category: &str, delta: &StatsContribution) -> Result<CategoryStat> {
        let mut entry = self
            .category_stats
            .entry(category.to_string())
            .or_insert_with(|| CategoryStat::new(category.to_string()));
        entry.image_count += delta.images_found;
        entry.original_size_bytes += delta.original_size_bytes;
        entry.estimated_webp_size_bytes += delta.estimated_webp_size_bytes;
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn subtract_category_stat(&self, category: &str, delta: &StatsContribution) -> Result<CategoryStat> {
        let mut entry = self
            .category_stats
            .entry(category.to_string())
            .or_insert_with(|| CategoryStat::new(category.to_string()));
        entry.image_count = entry.image_count.saturating_sub(delta.images_found);
        entry.original_size_bytes = entry
            .original_size_bytes
            .saturating_sub(delta.original_size_bytes);
        entry.estimated_webp_size_bytes = entry
            .estimated_webp_size_bytes
            .saturating_sub(delta.estimated_webp_size_bytes);
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn list_category_stats(&self) -> Result<Vec<CategoryStat>> {
        Ok(self.category_stats.iter().map(|e| e.value().clone()).collect())
    }
}
