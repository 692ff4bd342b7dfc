//! Builder for [`AppConfig`], following the fluent-setter pattern used
//! throughout this crate's teacher for its crawl configuration.

use std::net::IpAddr;

use super::types::{
    AppConfig, CrawlerConfig, EmailConfig, QueueConfig, RetentionConfig, SecurityConfig,
    WebpConversionConfig,
};

/// Fluent builder for [`AppConfig`].
///
/// Environment variables are applied last, in [`Self::build`], so they
/// always win over whatever was set programmatically — mirroring how the
/// original specification describes `SENDGRID_API_KEY`/`SENTRY_DSN` as
/// overrides of their config counterparts.
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    queue: QueueConfig,
    crawler: CrawlerConfig,
    security: SecurityConfig,
    email: EmailConfig,
    retention: RetentionConfig,
    webp_conversion: WebpConversionConfig,
    sentry_dsn: Option<String>,
}

impl AppConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn queue_max_size(mut self, n: usize) -> Self {
        self.queue.max_size = n;
        self
    }

    #[must_use]
    pub fn queue_max_per_ip(mut self, n: usize) -> Self {
        self.queue.max_per_ip = n;
        self
    }

    #[must_use]
    pub fn queue_cooldown_seconds(mut self, secs: u64) -> Self {
        self.queue.cooldown_seconds = secs;
        self
    }

    #[must_use]
    pub fn crawler_max_pages_per_scan(mut self, n: u32) -> Self {
        self.crawler.max_pages_per_scan = n;
        self
    }

    #[must_use]
    pub fn crawler_max_concurrent_scans(mut self, n: usize) -> Self {
        self.crawler.max_concurrent_scans = n.max(1);
        self
    }

    #[must_use]
    pub fn crawler_per_request_delay_ms(mut self, ms: u64) -> Self {
        self.crawler.per_request_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn security_forwarded_headers_enabled(mut self, enabled: bool) -> Self {
        self.security.forwarded_headers_enabled = enabled;
        self
    }

    #[must_use]
    pub fn security_trusted_proxies(mut self, proxies: Vec<ipnet::IpNet>) -> Self {
        self.security.trusted_proxies = proxies;
        self
    }

    #[must_use]
    pub fn security_rate_limit_exempt_ips(mut self, ips: Vec<IpAddr>) -> Self {
        self.security.rate_limit_exempt_ips = ips;
        self
    }

    #[must_use]
    pub fn security_max_requests_per_minute(mut self, n: u32) -> Self {
        self.security.max_requests_per_minute = n;
        self
    }

    #[must_use]
    pub fn email_enabled(mut self, enabled: bool) -> Self {
        self.email.enabled = enabled;
        self
    }

    #[must_use]
    pub fn email_from_address(mut self, addr: impl Into<String>) -> Self {
        self.email.from_address = Some(addr.into());
        self
    }

    #[must_use]
    pub fn retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn webp_conversion(mut self, webp: WebpConversionConfig) -> Self {
        self.webp_conversion = webp;
        self
    }

    /// Finalize the configuration, applying environment variable overrides.
    #[must_use]
    pub fn build(mut self) -> AppConfig {
        if let Ok(key) = std::env::var("SENDGRID_API_KEY") {
            if !key.is_empty() {
                self.email.api_key = Some(key);
            }
        }
        if let Ok(dsn) = std::env::var("SENTRY_DSN") {
            if !dsn.is_empty() {
                self.sentry_dsn = Some(dsn);
            }
        }

        AppConfig {
            queue: self.queue,
            crawler: self.crawler,
            security: self.security,
            email: self.email,
            retention: self.retention,
            webp_conversion: self.webp_conversion,
            sentry_dsn: self.sentry_dsn,
        }
    }
}
