//! Read-only accessors for [`AppConfig`].
//!
//! All fields are crate-private; every other module reaches the
//! configuration through these getters, matching the teacher's
//! `CrawlConfig` accessor style (`config/getters.rs`).

use std::net::IpAddr;
use std::time::Duration;

use super::types::AppConfig;

impl AppConfig {
    #[must_use]
    pub fn queue_max_size(&self) -> usize {
        self.queue.max_size
    }

    #[must_use]
    pub fn queue_max_per_ip(&self) -> usize {
        self.queue.max_per_ip
    }

    #[must_use]
    pub fn queue_cooldown(&self) -> Duration {
        Duration::from_secs(self.queue.cooldown_seconds)
    }

    #[must_use]
    pub fn default_estimated_pages_per_site(&self) -> u32 {
        self.queue.default_estimated_pages_per_site
    }

    #[must_use]
    pub fn max_pages_per_scan(&self) -> u32 {
        self.crawler.max_pages_per_scan
    }

    #[must_use]
    pub fn max_scan_duration(&self) -> Duration {
        Duration::from_secs(self.crawler.max_scan_duration_secs)
    }

    #[must_use]
    pub fn max_concurrent_scans(&self) -> usize {
        self.crawler.max_concurrent_scans
    }

    #[must_use]
    pub fn per_request_delay(&self) -> Duration {
        Duration::from_millis(self.crawler.per_request_delay_ms)
    }

    #[must_use]
    pub fn page_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.page_fetch_timeout_secs)
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.crawler.user_agent
    }

    #[must_use]
    pub fn checkpoint_every_pages(&self) -> u32 {
        self.crawler.checkpoint_every_pages
    }

    #[must_use]
    pub fn forwarded_headers_enabled(&self) -> bool {
        self.security.forwarded_headers_enabled
    }

    #[must_use]
    pub fn trusted_proxies(&self) -> &[ipnet::IpNet] {
        &self.security.trusted_proxies
    }

    #[must_use]
    pub fn is_rate_limit_exempt(&self, ip: &IpAddr) -> bool {
        self.security.rate_limit_exempt_ips.contains(ip)
    }

    #[must_use]
    pub fn max_requests_per_minute(&self) -> u32 {
        self.security.max_requests_per_minute
    }

    #[must_use]
    pub fn email_enabled(&self) -> bool {
        self.email.enabled
    }

    #[must_use]
    pub fn retention(&self) -> &super::types::RetentionConfig {
        &self.retention
    }

    #[must_use]
    pub fn webp_conversion(&self) -> &super::types::WebpConversionConfig {
        &self.webp_conversion
    }
}
