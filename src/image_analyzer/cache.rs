//! Per-scan probe cache (`§4.6`: "results may be cached per-process by
//! URL for the scan's lifetime") — a plain `DashMap` scoped to one
//! `Worker`'s crawl of a single scan, dropped with it.

use dashmap::DashMap;

use super::ImageProbeResult;

#[derive(Default)]
pub struct ImageProbeCache {
    entries: DashMap<String, ImageProbeResult>,
}

impl ImageProbeCache {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<ImageProbeResult> {
        self.entries.get(url).map(|entry| entry.clone())
    }

    pub fn insert(&self, url: String, result: ImageProbeResult) {
        self.entries.insert(url, result);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_and_returns_results_by_url() {
        let cache = ImageProbeCache::new();
        let result = ImageProbeResult { mime_type: "image/png".into(), size_bytes: 100, is_webp: false };
        cache.insert("https://example.test/a.png".into(), result.clone());
        assert_eq!(cache.get("https://example.test/a.png"), Some(result));
        assert_eq!(cache.get("https://example.test/b.png"), None);
    }
}
