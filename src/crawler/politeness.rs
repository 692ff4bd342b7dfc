//! Per-host politeness delay, shared process-wide (`§4.5` design note:
//! `perRequestDelayMs` applies per-host **globally across scans**, not
//! scoped to one scan) — two concurrent scans hitting the same host
//! still honor a single combined delay between requests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Default)]
pub struct DomainPoliteness {
    last_request_at: Mutex<HashMap<String, Instant>>,
}

impl DomainPoliteness {
    #[must_use]
    pub fn new() -> Self {
        Self { last_request_at: Mutex::new(HashMap::new()) }
    }

    /// Sleep, if necessary, so that at least `delay` has elapsed since
    /// the last request to `host` from any scan, then record this
    /// request's timestamp.
    pub async fn wait_then_record(&self, host: &str, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        let wait_for = {
            let mut last = self.last_request_at.lock();
            let now = Instant::now();
            let wait_for = last
                .get(host)
                .map(|prev| delay.saturating_sub(now.saturating_duration_since(*prev)))
                .unwrap_or_default();
            last.insert(host.to_string(), now + wait_for);
            wait_for
        };
        if !wait_for.is_zero() {
            tokio::time::sleep(wait_for).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_to_a_host_never_waits() {
        let politeness = DomainPoliteness::new();
        let start = Instant::now();
        politeness.wait_then_record("example.test", Duration::from_millis(50)).await;
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn second_immediate_request_waits_out_the_delay() {
        let politeness = DomainPoliteness::new();
        politeness.wait_then_record("example.test", Duration::from_millis(30)).await;
        let start = Instant::now();
        politeness.wait_then_record("example.test", Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn different_hosts_do_not_block_each_other() {
        let politeness = DomainPoliteness::new();
        politeness.wait_then_record("a.test", Duration::from_millis(200)).await;
        let start = Instant::now();
        politeness.wait_then_record("b.test", Duration::from_millis(200)).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
