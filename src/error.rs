//! Error taxonomy for the scan pipeline.
//!
//! Internal plumbing uses `anyhow::Result` everywhere (matching the rest of
//! this crate's error style); these types exist only at the seams where a
//! caller needs to branch on *kind* rather than just log a message — the
//! HTTP layer (external to this crate) maps each variant to a status code.

use thiserror::Error;

/// Failure of the Validation component (`[MODULE] Validation`).
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Only HTTP and HTTPS URLs are allowed.")]
    UnsupportedScheme,
    #[error("The submitted URL could not be parsed.")]
    Unparseable,
    #[error("The submitted URL must be {max} characters or fewer.")]
    UrlTooLong { max: usize },
    #[error("The submitted URL targets a private, loopback, or link-local address.")]
    DisallowedHost,
    #[error("The submitted email address is not valid.")]
    InvalidEmail,
    #[error("The submitted email address must be {max} characters or fewer.")]
    EmailTooLong { max: usize },
}

/// Errors returned by Admission (`[MODULE] Admission`), in rejection order.
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    #[error("The scan queue is full. Please try again later.")]
    QueueFull,
    #[error("You have reached the maximum number of queued scans.")]
    PerIpCapReached,
    #[error("Please wait before submitting another scan.")]
    Cooldown { retry_after_secs: u64 },
    #[error("Too many requests. Please slow down.")]
    RateLimited { retry_after_secs: u64 },
}

impl AdmissionError {
    /// Suggested `Retry-After` value in seconds, when known.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Cooldown { retry_after_secs } | Self::RateLimited { retry_after_secs } => {
                Some(*retry_after_secs)
            }
            Self::QueueFull | Self::PerIpCapReached => None,
        }
    }
}

/// Errors for scan lookups, distinguishing Not-Found from Gone per §7.
#[derive(Debug, Clone, Error)]
pub enum ScanLookupError {
    #[error("Scan {0} was not found.")]
    NotFound(uuid::Uuid),
    #[error("Scan {0} has not completed yet.")]
    NotCompleted(uuid::Uuid),
}

/// Errors for zip-artifact retrieval.
#[derive(Debug, Clone, Error)]
pub enum ZipError {
    #[error("No conversion zip was requested for this scan.")]
    NotRequested,
    #[error("The zip for download {0} has expired or its artifact is missing.")]
    Gone(uuid::Uuid),
}
