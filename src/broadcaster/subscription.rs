//! Typed subscribe helpers over the raw group table.

use tokio::sync::mpsc::UnboundedReceiver;

use crate::domain::ScanId;

use super::core::GroupTable;
use super::types::{scan_group, BroadcastEvent, STATS_GROUP};

pub(super) fn subscribe_to_scan(table: &GroupTable, scan_id: ScanId) -> UnboundedReceiver<BroadcastEvent> {
    table.subscribe(&scan_group(scan_id))
}

pub(super) fn subscribe_to_stats(table: &GroupTable) -> UnboundedReceiver<BroadcastEvent> {
    table.subscribe(STATS_GROUP)
}
