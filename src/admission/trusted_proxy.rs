//! Trusted-proxy effective-IP resolution (`§4.2`).

use std::net::IpAddr;

use crate::config::AppConfig;

/// Resolve the effective client IP from a direct peer address and an
/// optional `X-Forwarded-For`-style hop list (left = original client,
/// right = most recent proxy).
///
/// Per `§4.2`: walk the chain from the right, skipping hops that are
/// trusted proxies, and return the first (rightmost) untrusted hop. If
/// forwarded-header support is disabled, or no header was supplied, the
/// direct peer address is used unconditionally.
#[must_use]
pub fn resolve_effective_ip(config: &AppConfig, peer_addr: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
    if !config.forwarded_headers_enabled() {
        return peer_addr;
    }
    let Some(header) = forwarded_for else {
        return peer_addr;
    };

    let hops: Vec<IpAddr> = header
        .split(',')
        .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect();

    if hops.is_empty() {
        return peer_addr;
    }

    // Only trust the header at all if the direct peer is itself a
    // trusted proxy — otherwise an untrusted client could inject hops.
    if !config.is_trusted_proxy(&peer_addr) {
        return peer_addr;
    }

    for hop in hops.iter().rev() {
        if !config.is_trusted_proxy(hop) {
            return *hop;
        }
    }

    // Every hop (including the original client-supplied one) was inside
    // a trusted CIDR; fall back to the leftmost, oldest hop.
    hops[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfigBuilder;

    fn config_with_trusted(cidrs: &[&str]) -> AppConfig {
        AppConfigBuilder::new()
            .security_forwarded_headers_enabled(true)
            .security_trusted_proxies(cidrs.iter().map(|c| c.parse().unwrap()).collect())
            .build()
    }

    #[test]
    fn uses_peer_when_disabled() {
        let config = AppConfigBuilder::new().build();
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(resolve_effective_ip(&config, peer, Some("1.2.3.4")), peer);
    }

    #[test]
    fn walks_back_past_trusted_hops() {
        let config = config_with_trusted(&["10.0.0.0/8"]);
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let effective = resolve_effective_ip(&config, peer, Some("203.0.113.9, 10.0.0.2"));
        assert_eq!(effective, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn ignores_header_from_untrusted_peer() {
        let config = config_with_trusted(&["10.0.0.0/8"]);
        let peer: IpAddr = "203.0.113.1".parse().unwrap();
        assert_eq!(
            resolve_effective_ip(&config, peer, Some("1.2.3.4")),
            peer
        );
    }
}
