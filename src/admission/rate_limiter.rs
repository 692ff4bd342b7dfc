//! Per-IP sliding-window rate limiter (`§4.2` policy 4).
//!
//! A 1-minute window is partitioned into 4 segments of 15 seconds each.
//! The estimated request count within the trailing window is the current
//! segment's count plus a linearly-weighted fraction of the previous
//! segments, giving smoother behavior than a fixed window without the
//! cost of a true sliding log. Structured the same way as the teacher's
//! `rate_limiter.rs`: one entry per key in a `DashMap`, guarded
//! individually rather than behind one global lock.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(60);
const SEGMENT_COUNT: usize = 4;
const SEGMENT: Duration = Duration::from_secs(60 / SEGMENT_COUNT as u64);

struct SegmentedCounter {
    /// Ring of segment counts; `segments[cursor]` is the current segment.
    segments: [u32; SEGMENT_COUNT],
    cursor: usize,
    segment_started_at: Instant,
}

impl SegmentedCounter {
    fn new(now: Instant) -> Self {
        Self {
            segments: [0; SEGMENT_COUNT],
            cursor: 0,
            segment_started_at: now,
        }
    }

    /// Advance the ring past any fully-elapsed segments, zeroing them out.
    fn roll(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.segment_started_at);
        let segments_elapsed = (elapsed.as_secs_f64() / SEGMENT.as_secs_f64()).floor() as usize;
        if segments_elapsed == 0 {
            return;
        }
        if segments_elapsed >= SEGMENT_COUNT {
            self.segments = [0; SEGMENT_COUNT];
            self.segment_started_at = now;
            return;
        }
        for _ in 0..segments_elapsed {
            self.cursor = (self.cursor + 1) % SEGMENT_COUNT;
            self.segments[self.cursor] = 0;
        }
        self.segment_started_at += SEGMENT * segments_elapsed as u32;
    }

    /// Estimated requests within the trailing window, weighting the
    /// oldest counted segment by how much of it remains in the window.
    fn estimate(&self, now: Instant) -> f64 {
        let into_segment = now
            .saturating_duration_since(self.segment_started_at)
            .as_secs_f64()
            / SEGMENT.as_secs_f64();
        let oldest_weight = (1.0 - into_segment).clamp(0.0, 1.0);

        let mut total = 0.0;
        for offset in 0..SEGMENT_COUNT {
            let idx = (self.cursor + SEGMENT_COUNT - offset) % SEGMENT_COUNT;
            let weight = if offset == SEGMENT_COUNT - 1 { oldest_weight } else { 1.0 };
            total += f64::from(self.segments[idx]) * weight;
        }
        total
    }

    fn record(&mut self) {
        self.segments[self.cursor] += 1;
    }
}

/// Decision returned by [`SlidingWindowLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after_secs: u64 },
}

/// Sliding-window limiter keyed by submitter IP.
pub struct SlidingWindowLimiter {
    buckets: DashMap<IpAddr, Mutex<SegmentedCounter>>,
    max_requests_per_minute: u32,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            max_requests_per_minute,
        }
    }

    /// Check and, if allowed, record a request for `ip`.
    pub fn check(&self, ip: IpAddr) -> RateDecision {
        if self.max_requests_per_minute == 0 {
            return RateDecision::Allow;
        }
        let now = Instant::now();
        let entry = self
            .buckets
            .entry(ip)
            .or_insert_with(|| Mutex::new(SegmentedCounter::new(now)));
        let mut counter = entry.lock();
        counter.roll(now);

        let estimate = counter.estimate(now);
        if estimate >= f64::from(self.max_requests_per_minute) {
            let retry_after = SEGMENT.as_secs().max(1);
            return RateDecision::Deny { retry_after_secs: retry_after };
        }
        counter.record();
        RateDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit() {
        let limiter = SlidingWindowLimiter::new(3);
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert_eq!(limiter.check(ip), RateDecision::Allow);
        assert_eq!(limiter.check(ip), RateDecision::Allow);
        assert_eq!(limiter.check(ip), RateDecision::Allow);
        assert!(matches!(limiter.check(ip), RateDecision::Deny { .. }));
    }

    #[test]
    fn tracks_ips_independently() {
        let limiter = SlidingWindowLimiter::new(1);
        let a: IpAddr = "203.0.113.5".parse().unwrap();
        let b: IpAddr = "203.0.113.6".parse().unwrap();
        assert_eq!(limiter.check(a), RateDecision::Allow);
        assert_eq!(limiter.check(b), RateDecision::Allow);
    }
}
