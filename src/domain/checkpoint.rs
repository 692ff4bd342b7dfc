//! `CrawlCheckpoint` — persisted frontier snapshot sufficient to resume a
//! scan without re-fetching already-visited pages.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ScanId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    pub scan_id: ScanId,
    pub visited_urls: BTreeSet<String>,
    pub pending_urls: VecDeque<String>,
    pub pages_visited: u32,
    pub pages_discovered: u32,
    pub non_webp_images_found: u32,
    pub current_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrawlCheckpoint {
    #[must_use]
    pub fn new(scan_id: ScanId, start_url: String, now: DateTime<Utc>) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(start_url);
        Self {
            scan_id,
            visited_urls: BTreeSet::new(),
            pending_urls: pending,
            pages_visited: 0,
            pages_discovered: 1,
            non_webp_images_found: 0,
            current_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `§3`/`§8` invariant: `visited ∩ pending = ∅`.
    #[must_use]
    pub fn is_disjoint(&self) -> bool {
        self.visited_urls
            .iter()
            .all(|u| !self.pending_urls.contains(u))
    }

    /// `§3` invariant: `pages_visited == |visited|`.
    #[must_use]
    pub fn visited_count_matches(&self) -> bool {
        self.pages_visited as usize == self.visited_urls.len()
    }

    /// `§3` invariant: `pages_discovered == |visited ∪ pending|`.
    #[must_use]
    pub fn discovered_count_matches(&self) -> bool {
        let union_len = self.visited_urls.len()
            + self
                .pending_urls
                .iter()
                .filter(|u| !self.visited_urls.contains(*u))
                .count();
        self.pages_discovered as usize == union_len
    }

    /// Pop the next URL to visit, or `None` if the frontier is exhausted.
    pub fn pop_pending(&mut self) -> Option<String> {
        self.pending_urls.pop_front()
    }

    /// Enqueue a newly-discovered URL if not already visited or pending.
    pub fn enqueue_if_new(&mut self, url: String) {
        if self.visited_urls.contains(&url) || self.pending_urls.contains(&url) {
            return;
        }
        self.pending_urls.push_back(url);
        self.pages_discovered += 1;
    }

    /// Mark a URL as visited (moves it out of the pending count if present).
    pub fn mark_visited(&mut self, url: String, now: DateTime<Utc>) {
        if self.visited_urls.insert(url) {
            self.pages_visited += 1;
        }
        self.updated_at = now;
    }
}
