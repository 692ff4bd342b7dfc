//! Best-effort fan-out. A subscriber that is slow or gone never blocks
//! or fails the publish for anyone else — `UnboundedSender::send` only
//! fails when the receiver has already been dropped, which we treat as
//! an unsubscribe to clean up lazily.

use super::core::GroupTable;
use super::types::BroadcastEvent;

pub(super) fn publish(table: &GroupTable, group: &str, event: BroadcastEvent) {
    let Some(senders) = table.snapshot(group) else {
        return;
    };
    let mut any_dead = false;
    for tx in senders.iter() {
        if tx.send(event.clone()).is_err() {
            any_dead = true;
        }
    }
    if any_dead {
        table.prune(group);
    }
}
