//! `AggregateStats` — the singleton counters row plus its per-MIME and
//! per-category child rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton aggregate counters (conceptually row id = 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_scans: u64,
    pub total_pages_crawled: u64,
    pub total_images_found: u64,
    pub total_original_size_bytes: u64,
    pub total_estimated_webp_size_bytes: u64,
    pub sum_of_savings_percent: f64,
    pub last_updated: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped on every successful write.
    pub version: u64,
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self {
            total_scans: 0,
            total_pages_crawled: 0,
            total_images_found: 0,
            total_original_size_bytes: 0,
            total_estimated_webp_size_bytes: 0,
            sum_of_savings_percent: 0.0,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            version: 0,
        }
    }
}

impl AggregateStats {
    #[must_use]
    pub fn average_savings_percent(&self) -> f64 {
        if self.total_images_found == 0 {
            0.0
        } else {
            self.sum_of_savings_percent / self.total_images_found as f64
        }
    }

    /// Apply a scan's contribution; never produces negative totals (they
    /// are monotonically non-decreasing on this path per `§3`).
    pub fn apply_contribution(&mut self, delta: &StatsContribution, now: DateTime<Utc>) {
        self.total_scans += 1;
        self.total_pages_crawled += u64::from(delta.pages_crawled);
        self.total_images_found += delta.images_found;
        self.total_original_size_bytes += delta.original_size_bytes;
        self.total_estimated_webp_size_bytes += delta.estimated_webp_size_bytes;
        self.sum_of_savings_percent += delta.sum_of_savings_percent;
        self.last_updated = now;
        self.version += 1;
    }

    /// Subtract a previously-applied contribution (Retention purge path).
    /// Clamped at zero per the `max(0, current - delta)` rule in `§4.8`.
    pub fn subtract_contribution(&mut self, delta: &StatsContribution, now: DateTime<Utc>) {
        self.total_scans = self.total_scans.saturating_sub(1);
        self.total_pages_crawled = self
            .total_pages_crawled
            .saturating_sub(u64::from(delta.pages_crawled));
        self.total_images_found = self.total_images_found.saturating_sub(delta.images_found);
        self.total_original_size_bytes = self
            .total_original_size_bytes
            .saturating_sub(delta.original_size_bytes);
        self.total_estimated_webp_size_bytes = self
            .total_estimated_webp_size_bytes
            .saturating_sub(delta.estimated_webp_size_bytes);
        self.sum_of_savings_percent =
            (self.sum_of_savings_percent - delta.sum_of_savings_percent).max(0.0);
        self.last_updated = now;
        self.version += 1;
    }
}

/// A single scan's contribution to (or subtraction from) the aggregate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsContribution {
    pub pages_crawled: u32,
    pub images_found: u64,
    pub original_size_bytes: u64,
    pub estimated_webp_size_bytes: u64,
    pub sum_of_savings_percent: f64,
}

/// Per-MIME-type child row, unique on `mime_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimeTypeStat {
    pub mime_type: String,
    pub image_count: u64,
    pub original_size_bytes: u64,
    pub estimated_webp_size_bytes: u64,
    pub version: u64,
}

impl MimeTypeStat {
    #[must_use]
    pub fn new(mime_type: String) -> Self {
        Self {
            mime_type,
            image_count: 0,
            original_size_bytes: 0,
            estimated_webp_size_bytes: 0,
            version: 0,
        }
    }
}

/// Per-category child row, unique on `category`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub image_count: u64,
    pub original_size_bytes: u64,
    pub estimated_webp_size_bytes: u64,
    pub version: u64,
}

impl CategoryStat {
    #[must_use]
    pub fn new(category: String) -> Self {
        Self {
            category,
            image_count: 0,
            original_size_bytes: 0,
            estimated_webp_size_bytes: 0,
            version: 0,
        }
    }
}
