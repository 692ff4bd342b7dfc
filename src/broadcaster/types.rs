//! Broadcast event payloads (`§4.9`, `§6`). Field names are `camelCase`
//! on the wire (an external HTTP/hub layer would forward these directly),
//! matching the original specification's DTO contracts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AggregateStats, ScanId, ScanStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePositionUpdate {
    pub scan_id: ScanId,
    pub queue_position: usize,
    pub estimated_wait_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStarted {
    pub scan_id: ScanId,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageProgress {
    pub scan_id: ScanId,
    pub pages_scanned: u32,
    pub pages_discovered: u32,
    pub non_webp_images_found: u32,
    pub current_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFound {
    pub scan_id: ScanId,
    pub image_url: String,
    pub page_url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub potential_savings_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanComplete {
    pub scan_id: ScanId,
    pub pages_scanned: u32,
    pub pages_discovered: u32,
    pub non_webp_images_found: u32,
    pub reached_page_limit: bool,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailed {
    pub scan_id: ScanId,
    pub error_message: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    pub stats: AggregateStats,
}

/// Every event the Broadcaster can fan out, tagged for `serde` so an
/// external transport can serialize this enum directly onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    QueuePositionUpdate(QueuePositionUpdate),
    ScanStarted(ScanStarted),
    PageProgress(PageProgress),
    ImageFound(ImageFound),
    ScanComplete(ScanComplete),
    ScanFailed(ScanFailed),
    StatsUpdate(StatsUpdate),
}

impl BroadcastEvent {
    #[must_use]
    pub fn scan_id(&self) -> Option<ScanId> {
        match self {
            Self::QueuePositionUpdate(e) => Some(e.scan_id),
            Self::ScanStarted(e) => Some(e.scan_id),
            Self::PageProgress(e) => Some(e.scan_id),
            Self::ImageFound(e) => Some(e.scan_id),
            Self::ScanComplete(e) => Some(e.scan_id),
            Self::ScanFailed(e) => Some(e.scan_id),
            Self::StatsUpdate(_) => None,
        }
    }
}

/// Self-consistent current-state response for a reconnecting client,
/// returned by `GetCurrentProgress` (`§4.9`).
///
/// Per the Open Question decision recorded in `DESIGN.md`, this does
/// **not** carry `total_in_queue` — the original DTO is kept as specified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgressSnapshot {
    pub status: ScanStatus,
    pub pages_scanned: u32,
    pub pages_discovered: u32,
    pub non_webp_images_count: u32,
    pub queue_position: Option<usize>,
    pub progress_percent: Option<f64>,
    pub current_url: Option<String>,
    pub error_message: Option<String>,
}

/// Subscription group name for a scan's progress channel.
#[must_use]
pub fn scan_group(scan_id: ScanId) -> String {
    format!("scan-{scan_id}")
}

/// Subscription group name for the global aggregate-stats channel.
pub const STATS_GROUP: &str = "stats-updates";
