//! `QueuePositionUpdate` throttling (`§4.9`): at most one broadcast every
//! 5 seconds per scan, unless the remaining-ahead count has moved by 5 or
//! more since the last one — a burst of enqueue/dequeue activity should
//! still reach subscribers promptly even inside the quiet window.

use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::ScanId;

const MIN_INTERVAL_SECS: u64 = 5;
const MIN_POSITION_DELTA: usize = 5;

struct LastSent {
    at: Instant,
    position: usize,
}

#[derive(Default)]
pub(super) struct QueueUpdateThrottle {
    last: DashMap<ScanId, LastSent>,
}

impl QueueUpdateThrottle {
    pub(super) fn new() -> Self {
        Self { last: DashMap::new() }
    }

    /// Returns `true` if a `QueuePositionUpdate` for `scan_id` at
    /// `position` should be sent now. The first call for a given
    /// `scan_id` always sends — there is no prior update to throttle
    /// against, and `§4.9` requires a broadcast on every enqueue.
    pub(super) fn should_send(&self, scan_id: ScanId, position: usize, now: Instant) -> bool {
        match self.last.entry(scan_id) {
            Entry::Vacant(vacant) => {
                vacant.insert(LastSent { at: now, position });
                true
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get();
                let elapsed = now.saturating_duration_since(entry.at);
                let delta = entry.position.abs_diff(position);
                let send = elapsed.as_secs() >= MIN_INTERVAL_SECS || delta >= MIN_POSITION_DELTA;
                if send {
                    let entry = occupied.get_mut();
                    entry.at = now;
                    entry.position = position;
                }
                send
            }
        }
    }

    pub(super) fn clear(&self, scan_id: ScanId) {
        self.last.remove(&scan_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_always_sends() {
        let throttle = QueueUpdateThrottle::new();
        let id = ScanId::new();
        assert!(throttle.should_send(id, 10, Instant::now()));
    }

    #[test]
    fn suppresses_small_moves_within_the_window() {
        let throttle = QueueUpdateThrottle::new();
        let id = ScanId::new();
        let t0 = Instant::now();
        assert!(throttle.should_send(id, 10, t0));
        assert!(!throttle.should_send(id, 9, t0));
    }

    #[test]
    fn large_position_jump_bypasses_the_window() {
        let throttle = QueueUpdateThrottle::new();
        let id = ScanId::new();
        let t0 = Instant::now();
        assert!(throttle.should_send(id, 10, t0));
        assert!(throttle.should_send(id, 4, t0));
    }
}
