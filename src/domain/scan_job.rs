//! The `ScanJob` aggregate — the unit of work flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ScanId, SubmitterAddr};

/// Lifecycle state of a [`ScanJob`].
///
/// Terminal states (`Completed`, `Failed`) are immutable once reached —
/// only a `Worker` transitions a job, and only while it owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ScanStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A user-submitted scan request and its execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: ScanId,
    pub target_url: String,
    pub email: Option<String>,
    pub submitter_addr: SubmitterAddr,
    /// 1-based index of this submitter's nth job; persisted at enqueue
    /// time and never recomputed, per `§4.3`.
    pub submission_count: u32,
    pub status: ScanStatus,
    pub convert_to_webp: bool,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub pages_discovered: u32,
    pub pages_scanned: u32,
    pub non_webp_images_found: u32,
    pub error_message: Option<String>,
}

impl ScanJob {
    /// Construct a freshly-admitted job in the `Queued` state.
    #[must_use]
    pub fn new_queued(
        target_url: String,
        email: Option<String>,
        submitter_addr: SubmitterAddr,
        submission_count: u32,
        convert_to_webp: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ScanId::new(),
            target_url,
            email,
            submitter_addr,
            submission_count,
            status: ScanStatus::Queued,
            convert_to_webp,
            created_at: now,
            started_at: None,
            completed_at: None,
            pages_discovered: 0,
            pages_scanned: 0,
            non_webp_images_found: 0,
            error_message: None,
        }
    }

    /// `reachedPageLimit` per `§4.5`: true iff pages-discovered exceeds
    /// pages-scanned at termination (there was still unfinished frontier).
    #[must_use]
    pub fn reached_page_limit(&self) -> bool {
        self.pages_discovered > self.pages_scanned
    }

    /// `§8` boundary invariant: `completed_at >= started_at >= created_at`.
    #[must_use]
    pub fn has_consistent_timestamps(&self) -> bool {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                started >= self.created_at && completed >= started
            }
            (Some(started), None) => started >= self.created_at,
            (None, None) => true,
            (None, Some(_)) => false,
        }
    }
}
