//! `DiscoveredImage` — one row per (scan, image-url) first sighting.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::ScanId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredImage {
    pub id: Uuid,
    pub scan_id: ScanId,
    pub image_url: String,
    /// Every page URL the image has been seen embedded on. A `BTreeSet`
    /// gives deterministic serialization order for checkpoint round-trips
    /// (`§8` round-trip invariant).
    pub page_urls: BTreeSet<String>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub potential_savings_percent: f64,
    pub potential_savings_bytes: u64,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredImage {
    #[must_use]
    pub fn first_sighting(
        scan_id: ScanId,
        image_url: String,
        page_url: String,
        mime_type: String,
        size_bytes: u64,
        width: Option<u32>,
        height: Option<u32>,
        potential_savings_percent: f64,
        potential_savings_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut page_urls = BTreeSet::new();
        page_urls.insert(page_url);
        Self {
            id: Uuid::new_v4(),
            scan_id,
            image_url,
            page_urls,
            mime_type,
            size_bytes,
            width,
            height,
            potential_savings_percent,
            potential_savings_bytes,
            discovered_at: now,
        }
    }

    /// Record an additional sighting of this image on another page.
    /// Idempotent: inserting the same page URL twice has no extra effect,
    /// satisfying the `§8` upsert-idempotence invariant.
    pub fn record_sighting(&mut self, page_url: String) {
        self.page_urls.insert(page_url);
    }
}
