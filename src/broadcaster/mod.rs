//! `[MODULE] ProgressBroadcaster` — real-time fan-out of scan progress
//! and aggregate-stats events (`§4.9`).

mod core;
mod publishing;
mod queue_wait;
mod snapshot;
mod subscription;
mod throttle;
pub mod types;

use std::time::Instant;

use chrono::Utc;

use crate::domain::ScanId;
use crate::store::{CheckpointRepository, ScanRepository};

pub use queue_wait::estimate_wait_seconds;
pub use snapshot::get_current_progress;
pub use types::{
    scan_group, BroadcastEvent, ImageFound, PageProgress, ScanComplete, ScanFailed,
    ScanProgressSnapshot, ScanStarted, StatsUpdate, QueuePositionUpdate, STATS_GROUP,
};

use core::GroupTable;
use throttle::QueueUpdateThrottle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Fan-out hub for all scan-progress and aggregate-stats events.
///
/// Subscribers receive events over a private `tokio::mpsc` channel; a
/// subscriber that never drains its channel slows down only itself —
/// `UnboundedSender::send` never blocks the publisher.
pub struct ProgressBroadcaster {
    groups: GroupTable,
    queue_throttle: QueueUpdateThrottle,
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: GroupTable::new(),
            queue_throttle: QueueUpdateThrottle::new(),
        }
    }

    #[must_use]
    pub fn subscribe_to_scan(&self, scan_id: ScanId) -> UnboundedReceiver<BroadcastEvent> {
        subscription::subscribe_to_scan(&self.groups, scan_id)
    }

    #[must_use]
    pub fn subscribe_to_stats(&self) -> UnboundedReceiver<BroadcastEvent> {
        subscription::subscribe_to_stats(&self.groups)
    }

    #[must_use]
    pub fn scan_subscriber_count(&self, scan_id: ScanId) -> usize {
        self.groups.subscriber_count(&scan_group(scan_id))
    }

    fn publish_to_scan(&self, scan_id: ScanId, event: BroadcastEvent) {
        publishing::publish(&self.groups, &scan_group(scan_id), event);
    }

    pub fn scan_started(&self, scan_id: ScanId, target_url: String) {
        self.publish_to_scan(
            scan_id,
            BroadcastEvent::ScanStarted(ScanStarted { scan_id, target_url, started_at: Utc::now() }),
        );
        self.queue_throttle.clear(scan_id);
    }

    pub fn page_progress(&self, event: PageProgress) {
        self.publish_to_scan(event.scan_id, BroadcastEvent::PageProgress(event));
    }

    pub fn image_found(&self, event: ImageFound) {
        self.publish_to_scan(event.scan_id, BroadcastEvent::ImageFound(event));
    }

    pub fn scan_complete(&self, event: ScanComplete) {
        let scan_id = event.scan_id;
        self.publish_to_scan(scan_id, BroadcastEvent::ScanComplete(event));
        self.queue_throttle.clear(scan_id);
    }

    pub fn scan_failed(&self, event: ScanFailed) {
        let scan_id = event.scan_id;
        self.publish_to_scan(scan_id, BroadcastEvent::ScanFailed(event));
        self.queue_throttle.clear(scan_id);
    }

    pub fn stats_update(&self, stats: crate::domain::AggregateStats) {
        publishing::publish(&self.groups, STATS_GROUP, BroadcastEvent::StatsUpdate(StatsUpdate { stats }));
    }

    /// Publish a `QueuePositionUpdate` for `scan_id` if the throttle rule
    /// (`§4.9`: every 5s, or immediately on a jump of 5+ places) allows it.
    pub fn maybe_queue_position_update(
        &self,
        scan_id: ScanId,
        position: usize,
        active_remaining_pages: &[u32],
        default_estimated_pages_per_site: u32,
        avg_secs_per_page: f64,
    ) {
        if !self.queue_throttle.should_send(scan_id, position, Instant::now()) {
            return;
        }
        let estimated_wait_seconds =
            estimate_wait_seconds(position, active_remaining_pages, default_estimated_pages_per_site, avg_secs_per_page);
        self.publish_to_scan(
            scan_id,
            BroadcastEvent::QueuePositionUpdate(QueuePositionUpdate {
                scan_id,
                queue_position: position,
                estimated_wait_seconds,
            }),
        );
    }

    /// `GetCurrentProgress(scanId)` for a reconnecting client.
    pub async fn current_progress<S, C>(
        &self,
        scan_repo: &std::sync::Arc<S>,
        checkpoint_repo: &std::sync::Arc<C>,
        scan_id: ScanId,
    ) -> anyhow::Result<Option<ScanProgressSnapshot>>
    where
        S: ScanRepository,
        C: CheckpointRepository,
    {
        get_current_progress(scan_repo, checkpoint_repo, scan_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events_published_to_their_scan() {
        let broadcaster = ProgressBroadcaster::new();
        let scan_id = ScanId::new();
        let mut rx = broadcaster.subscribe_to_scan(scan_id);
        broadcaster.scan_started(scan_id, "https://example.test/".into());
        let event = rx.try_recv().expect("event should be buffered");
        assert_eq!(event.scan_id(), Some(scan_id));
    }

    #[test]
    fn events_for_other_scans_are_not_delivered() {
        let broadcaster = ProgressBroadcaster::new();
        let subscribed = ScanId::new();
        let other = ScanId::new();
        let mut rx = broadcaster.subscribe_to_scan(subscribed);
        broadcaster.scan_started(other, "https://example.test/".into());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropping_the_receiver_prunes_the_group_on_next_publish() {
        let broadcaster = ProgressBroadcaster::new();
        let scan_id = ScanId::new();
        let rx = broadcaster.subscribe_to_scan(scan_id);
        assert_eq!(broadcaster.scan_subscriber_count(scan_id), 1);
        drop(rx);
        broadcaster.scan_started(scan_id, "https://example.test/".into());
        assert_eq!(broadcaster.scan_subscriber_count(scan_id), 0);
    }
}
