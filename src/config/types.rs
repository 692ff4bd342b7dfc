//! Core configuration types for the scan pipeline.
//!
//! Each group mirrors a `§6` configuration section of the specification.
//! Every group is an immutable, `Clone`-able record loaded once at startup
//! and shared by `Arc` — components never reach into global state for it.

use std::net::IpAddr;
use std::time::Duration;

/// `queue.*` — admission capacity and fair-share estimation defaults.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_size: usize,
    pub max_per_ip: usize,
    pub cooldown_seconds: u64,
    pub default_estimated_pages_per_site: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 200,
            max_per_ip: 3,
            cooldown_seconds: 30,
            default_estimated_pages_per_site: 25,
        }
    }
}

/// `crawler.*` — per-scan crawl limits and politeness.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub max_pages_per_scan: u32,
    pub max_scan_duration_secs: u64,
    pub max_concurrent_scans: usize,
    pub per_request_delay_ms: u64,
    pub page_fetch_timeout_secs: u64,
    pub user_agent: String,
    pub checkpoint_every_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages_per_scan: 500,
            max_scan_duration_secs: 30 * 60,
            max_concurrent_scans: 3,
            per_request_delay_ms: 250,
            page_fetch_timeout_secs: 15,
            user_agent: "webp-scan-core/0.1 (+https://example.invalid/bot)".to_string(),
            checkpoint_every_pages: 5,
        }
    }
}

/// `security.*` — proxy trust, IP allow-lists, and request-size limits.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    pub forwarded_headers_enabled: bool,
    pub trusted_proxies: Vec<ipnet::IpNet>,
    pub rate_limit_exempt_ips: Vec<IpAddr>,
    pub max_requests_per_minute: u32,
    pub enforce_https: bool,
    pub max_request_body_size_bytes: usize,
}

/// `email.*` — optional notification sink. `api_key` may be overridden
/// by the `SENDGRID_API_KEY` environment variable (applied in the builder).
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub from_address: Option<String>,
}

/// `retention.*` — periodic purge cadence and TTLs.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub scan_ttl_days: u32,
    pub interval_minutes: u32,
    pub zip_ttl_hours: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            scan_ttl_days: 30,
            interval_minutes: 60,
            zip_ttl_hours: 6,
        }
    }
}

impl RetentionConfig {
    #[must_use]
    pub fn scan_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_ttl_days) * 24 * 3600)
    }

    #[must_use]
    pub fn zip_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.zip_ttl_hours) * 3600)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

/// `webpConversion.*` — optional zip-of-converted-images feature.
#[derive(Debug, Clone)]
pub struct WebpConversionConfig {
    pub enabled: bool,
    pub quality: u8,
    pub timeout_secs: u64,
    pub output_dir: std::path::PathBuf,
}

impl Default for WebpConversionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 80,
            timeout_secs: 30,
            output_dir: std::path::PathBuf::from("./webp-scan-artifacts"),
        }
    }
}

/// Aggregate, immutable application configuration.
///
/// Built once via [`super::builder::AppConfigBuilder`] and shared via
/// `Arc<AppConfig>` with every component that needs it.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub(crate) queue: QueueConfig,
    pub(crate) crawler: CrawlerConfig,
    pub(crate) security: SecurityConfig,
    pub(crate) email: EmailConfig,
    pub(crate) retention: RetentionConfig,
    pub(crate) webp_conversion: WebpConversionConfig,
    /// Optional Sentry DSN, overridable by the `SENTRY_DSN` env var.
    pub(crate) sentry_dsn: Option<String>,
}
