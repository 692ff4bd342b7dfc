//! `[MODULE] Admission` — enqueue gating (`§4.2`).
//!
//! Policies are applied in the documented order; the first failure wins.

mod rate_limiter;
mod trusted_proxy;

pub use rate_limiter::{RateDecision, SlidingWindowLimiter};
pub use trusted_proxy::resolve_effective_ip;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::config::AppConfig;
use crate::domain::SubmitterAddr;
use crate::error::AdmissionError;
use crate::store::ScanRepository;

/// Gate that every submission passes through before a [`crate::domain::ScanJob`]
/// is inserted as `Queued`.
pub struct AdmissionControl<R: ScanRepository> {
    config: Arc<AppConfig>,
    scan_repo: Arc<R>,
    rate_limiter: SlidingWindowLimiter,
}

impl<R: ScanRepository> AdmissionControl<R> {
    #[must_use]
    pub fn new(config: Arc<AppConfig>, scan_repo: Arc<R>) -> Self {
        let rate_limiter = SlidingWindowLimiter::new(config.max_requests_per_minute());
        Self { config, scan_repo, rate_limiter }
    }

    /// Run every admission policy in order for `addr`. Returns `Ok(())`
    /// if the submission may proceed to enqueue.
    pub async fn check(&self, addr: &SubmitterAddr) -> Result<(), AdmissionError> {
        if let Some(ip) = addr.to_ip() {
            if self.config.is_rate_limit_exempt(&ip) {
                return Ok(());
            }
        }

        let queued = self
            .scan_repo
            .count_queued()
            .await
            .map_err(|_| AdmissionError::QueueFull)?;
        if queued >= self.config.queue_max_size() {
            return Err(AdmissionError::QueueFull);
        }

        let per_ip = self
            .scan_repo
            .count_queued_for_ip(addr)
            .await
            .map_err(|_| AdmissionError::PerIpCapReached)?;
        if per_ip >= self.config.queue_max_per_ip() {
            return Err(AdmissionError::PerIpCapReached);
        }

        if let Ok(Some(last)) = self.scan_repo.last_submission_at(addr).await {
            let elapsed = Utc::now().signed_duration_since(last);
            let cooldown = self.config.queue_cooldown();
            if elapsed.to_std().unwrap_or_default() < cooldown {
                let remaining = cooldown
                    .saturating_sub(elapsed.to_std().unwrap_or_default())
                    .as_secs()
                    .max(1);
                return Err(AdmissionError::Cooldown { retry_after_secs: remaining });
            }
        }

        if let Some(ip) = addr.to_ip() {
            if let RateDecision::Deny { retry_after_secs } = self.rate_limiter.check(ip) {
                return Err(AdmissionError::RateLimited { retry_after_secs });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfigBuilder;
    use crate::store::InMemoryStore;

    fn addr(s: &str) -> SubmitterAddr {
        SubmitterAddr::parse(s).unwrap()
    }

    #[tokio::test]
    async fn rejects_when_queue_full() {
        let config = Arc::new(AppConfigBuilder::new().queue_max_size(0).build());
        let store = Arc::new(InMemoryStore::new());
        let gate = AdmissionControl::new(config, store);
        let err = gate.check(&addr("203.0.113.1")).await.unwrap_err();
        assert!(matches!(err, AdmissionError::QueueFull));
    }

    #[tokio::test]
    async fn rejects_per_ip_cap() {
        let config = Arc::new(AppConfigBuilder::new().queue_max_per_ip(1).build());
        let store = Arc::new(InMemoryStore::new());
        let a = addr("203.0.113.1");
        let job = crate::domain::ScanJob::new_queued(
            "https://example.test/".into(),
            None,
            a.clone(),
            1,
            false,
            Utc::now(),
        );
        store.insert(&job).await.unwrap();

        let gate = AdmissionControl::new(config, store);
        let err = gate.check(&a).await.unwrap_err();
        assert!(matches!(err, AdmissionError::PerIpCapReached));
    }
}
