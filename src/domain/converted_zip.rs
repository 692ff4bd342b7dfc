//! `ConvertedImageZip` — optional downloadable artifact of converted images.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::ScanId;

/// Fixed download window, per `§3` invariant (`expires_at > created_at`).
pub const ZIP_WINDOW_HOURS: i64 = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedImageZip {
    pub download_id: Uuid,
    pub scan_id: ScanId,
    pub filesystem_path: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
    pub image_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConvertedImageZip {
    #[must_use]
    pub fn new(
        scan_id: ScanId,
        filesystem_path: PathBuf,
        filename: String,
        size_bytes: u64,
        image_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            download_id: Uuid::new_v4(),
            scan_id,
            filesystem_path,
            filename,
            size_bytes,
            image_count,
            created_at: now,
            expires_at: now + Duration::hours(ZIP_WINDOW_HOURS),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
