//! Small typed identifiers, following the teacher's habit of wrapping
//! primitive values (`ImUrl`, `BrowserProfile`) instead of passing bare
//! `String`/`u128` through the codebase.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a [`crate::domain::ScanJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanId(pub Uuid);

impl ScanId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A validated submitter network address (IPv4 or IPv6), capped at the
/// 45-character textual representation required by `§3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmitterAddr(String);

impl SubmitterAddr {
    /// Build from a parsed [`IpAddr`]; always within the 45-char bound.
    #[must_use]
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }

    /// Parse from text, enforcing the length bound and IP-address syntax.
    pub fn parse(s: &str) -> Result<Self, std::net::AddrParseError> {
        let ip: IpAddr = s.parse()?;
        Ok(Self::from_ip(ip))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse back into an [`IpAddr`] for CIDR/exemption checks.
    #[must_use]
    pub fn to_ip(&self) -> Option<IpAddr> {
        self.0.parse().ok()
    }
}

impl fmt::Display for SubmitterAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
