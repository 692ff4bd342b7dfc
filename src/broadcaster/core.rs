//! Subscriber-group bookkeeping: copy-on-write `Vec<Sender>` per group,
//! the same shape as the teacher's event bus core — reads never take a
//! lock across an await point, writes replace the whole group atomically.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::types::BroadcastEvent;

#[derive(Default)]
pub(super) struct GroupTable {
    groups: RwLock<HashMap<String, Arc<Vec<UnboundedSender<BroadcastEvent>>>>>,
}

impl GroupTable {
    pub(super) fn new() -> Self {
        Self { groups: RwLock::new(HashMap::new()) }
    }

    /// Register a fresh subscriber for `group`, returning the receiving
    /// half of its private channel.
    pub(super) fn subscribe(&self, group: &str) -> UnboundedReceiver<BroadcastEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut groups = self.groups.write();
        let mut next = groups.get(group).map_or_else(Vec::new, |v| (**v).clone());
        next.push(tx);
        groups.insert(group.to_string(), Arc::new(next));
        rx
    }

    /// Current fan-out list for `group`, or `None` if nobody is subscribed.
    pub(super) fn snapshot(&self, group: &str) -> Option<Arc<Vec<UnboundedSender<BroadcastEvent>>>> {
        self.groups.read().get(group).cloned()
    }

    /// Drop any sender in `group` whose receiver has gone away. Called
    /// after a publish finds dead senders, not on every publish.
    pub(super) fn prune(&self, group: &str) {
        let mut groups = self.groups.write();
        if let Some(current) = groups.get(group) {
            let alive: Vec<_> = current.iter().filter(|tx| !tx.is_closed()).cloned().collect();
            if alive.is_empty() {
                groups.remove(group);
            } else {
                groups.insert(group.to_string(), Arc::new(alive));
            }
        }
    }

    pub(super) fn subscriber_count(&self, group: &str) -> usize {
        self.groups.read().get(group).map_or(0, |v| v.len())
    }
}
