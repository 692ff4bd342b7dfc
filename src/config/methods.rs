//! Derived behavior on [`AppConfig`] that isn't a plain field accessor.

use std::net::IpAddr;

use super::types::AppConfig;

impl AppConfig {
    /// Convenience constructor for a config with every group at its default.
    #[must_use]
    pub fn with_defaults() -> Self {
        super::builder::AppConfigBuilder::new().build()
    }

    /// Whether `ip` is inside any configured trusted-proxy CIDR.
    #[must_use]
    pub fn is_trusted_proxy(&self, ip: &IpAddr) -> bool {
        self.security
            .trusted_proxies
            .iter()
            .any(|net| net.contains(ip))
    }
}
