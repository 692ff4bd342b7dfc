//! `[MODULE] Validation` — pure, stateless syntactic and policy checks on
//! a submitted URL/email (`§4.1`).

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use url::{Host, Url};

use crate::error::ValidationError;

pub const MAX_URL_LEN: usize = 2048;
pub const MAX_EMAIL_LEN: usize = 254;

/// RFC-5322-lite pattern: good enough to reject obvious garbage without
/// implementing the full grammar.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("static email regex is valid")
});

/// Outcome of validating a submission.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a submitted URL and optional email, per `§4.1`, in the
/// documented check order. All failures are collected — this is not a
/// fail-fast function — so the HTTP layer can show every problem at once.
#[must_use]
pub fn validate_submission(url: &str, email: Option<&str>) -> ValidationResult {
    let mut errors = Vec::new();

    if url.len() > MAX_URL_LEN {
        errors.push(ValidationError::UrlTooLong { max: MAX_URL_LEN });
    }

    match Url::parse(url) {
        Ok(parsed) => {
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                errors.push(ValidationError::UnsupportedScheme);
            } else if !host_is_publicly_routable(&parsed) {
                errors.push(ValidationError::DisallowedHost);
            }
        }
        Err(_) => errors.push(ValidationError::Unparseable),
    }

    if let Some(email) = email {
        if email.len() > MAX_EMAIL_LEN {
            errors.push(ValidationError::EmailTooLong { max: MAX_EMAIL_LEN });
        }
        if !EMAIL_RE.is_match(email) {
            errors.push(ValidationError::InvalidEmail);
        }
    }

    ValidationResult { errors }
}

/// SSRF guard: reject loopback, link-local, private, and other internal
/// ranges. Operates on whatever the URL's host resolves to syntactically;
/// an external caller performing an actual DNS resolution should re-check
/// the resolved address before connecting (TOCTOU is out of scope here).
fn host_is_publicly_routable(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            // A bare IP literal written as a domain-looking string still
            // parses as `Host::Ipv4`/`Host::Ipv6` by the `url` crate; a
            // real domain name is allowed through here and is subject to
            // the same check again once DNS resolution happens upstream.
            !domain.is_empty()
        }
        Some(Host::Ipv4(ip)) => ip_is_publicly_routable(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => ip_is_publicly_routable(IpAddr::V6(ip)),
        None => false,
    }
}

/// Whether `ip` is outside loopback/link-local/private/documentation
/// ranges, for both the URL host check and resolved-address rechecks
/// performed by the crawler before each fetch.
#[must_use]
pub fn ip_is_publicly_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_link_local()
                || v4.is_private()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.octets()[0] == 0)
        }
        IpAddr::V6(v6) => {
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || v6.segments()[0] == 0xfec0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        let result = validate_submission("ftp://example.test/", None);
        assert!(!result.valid());
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnsupportedScheme)));
    }

    #[test]
    fn accepts_plain_https_url() {
        let result = validate_submission("https://example.test/path", None);
        assert!(result.valid());
    }

    #[test]
    fn rejects_loopback_host() {
        let result = validate_submission("http://127.0.0.1/", None);
        assert!(!result.valid());
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DisallowedHost)));
    }

    #[test]
    fn rejects_private_ipv4() {
        let result = validate_submission("http://10.0.0.5/", None);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DisallowedHost)));
    }

    #[test]
    fn rejects_malformed_email() {
        let result = validate_submission("https://example.test/", Some("not-an-email"));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidEmail)));
    }

    #[test]
    fn accepts_valid_email() {
        let result = validate_submission("https://example.test/", Some("user@example.test"));
        assert!(result.valid());
    }

    #[test]
    fn rejects_oversized_url() {
        let long = format!("https://example.test/{}", "a".repeat(MAX_URL_LEN));
        let result = validate_submission(&long, None);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::UrlTooLong { .. })));
    }
}
