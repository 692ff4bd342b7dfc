//! Top-level wiring: one [`Application`] owns every repository, the
//! worker pool, and the background tasks named in `§5`'s process model —
//! a claim loop, a retention sweep, and a periodic stats broadcast.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::admission::{resolve_effective_ip, AdmissionControl};
use crate::aggregate_stats::{self, AggregateStatsHandle};
use crate::broadcaster::ProgressBroadcaster;
use crate::config::AppConfig;
use crate::crawler::{DomainPoliteness, PageFetcher};
use crate::domain::{ScanId, ScanJob, ScanStatus, SubmitterAddr};
use crate::error::{AdmissionError, ValidationError};
use crate::image_analyzer::ImageProbe;
use crate::scheduler;
use crate::store::{CheckpointRepository, ImageRepository, ScanRepository, StatsRepository, ZipRepository};
use crate::validation::validate_submission;
use crate::worker_pool::WorkerPool;

/// Outcome of a successful [`Application::submit_scan`] call.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job: ScanJob,
    pub queue_position: Option<usize>,
}

/// Everything a host process (an HTTP server, the demo CLI, a test
/// harness) needs to run the pipeline end to end.
pub struct Application<R: ScanRepository, I, C, Z, F, P> {
    config: Arc<AppConfig>,
    scan_repo: Arc<R>,
    image_repo: Arc<I>,
    checkpoint_repo: Arc<C>,
    zip_repo: Arc<Z>,
    broadcaster: Arc<ProgressBroadcaster>,
    stats: AggregateStatsHandle,
    admission: AdmissionControl<R>,
    pub worker_pool: Arc<WorkerPool<R, I, C, Z, F, P>>,
}

impl<R, I, C, Z, F, P> Application<R, I, C, Z, F, P>
where
    R: ScanRepository + 'static,
    I: ImageRepository + 'static,
    C: CheckpointRepository + 'static,
    Z: ZipRepository + 'static,
    F: PageFetcher + 'static,
    P: ImageProbe + 'static,
{
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        scan_repo: Arc<R>,
        image_repo: Arc<I>,
        checkpoint_repo: Arc<C>,
        zip_repo: Arc<Z>,
        stats_repo: Arc<impl StatsRepository + 'static>,
        fetcher: Arc<F>,
        probe: Arc<P>,
    ) -> Self {
        let broadcaster = Arc::new(ProgressBroadcaster::new());
        let stats = aggregate_stats::spawn(stats_repo);
        let admission = AdmissionControl::new(Arc::clone(&config), Arc::clone(&scan_repo));
        let worker_pool = Arc::new(WorkerPool::new(
            Arc::clone(&config),
            Arc::clone(&scan_repo),
            Arc::clone(&image_repo),
            Arc::clone(&checkpoint_repo),
            Arc::clone(&zip_repo),
            fetcher,
            probe,
            Arc::clone(&broadcaster),
            stats.clone(),
        ));

        Self { config, scan_repo, image_repo, checkpoint_repo, zip_repo, broadcaster, stats, admission, worker_pool }
    }

    #[must_use]
    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    #[must_use]
    pub fn stats(&self) -> &AggregateStatsHandle {
        &self.stats
    }

    /// Run the recovery pass, then spawn the claim loop, retention sweep,
    /// and periodic stats broadcast as independent background tasks, per
    /// `§5`. Returns once every task has been spawned; it does not block.
    pub async fn start_background_tasks(self: &Arc<Self>) -> anyhow::Result<()> {
        self.worker_pool.recover_orphaned_jobs().await?;

        let pool = Arc::clone(&self.worker_pool);
        tokio::spawn(async move { pool.run_claim_loop().await });

        let retention = self.config.retention().clone();
        tokio::spawn(crate::retention::run_periodic(
            Arc::clone(&self.scan_repo),
            Arc::clone(&self.image_repo),
            Arc::clone(&self.checkpoint_repo),
            Arc::clone(&self.zip_repo),
            self.stats.clone(),
            retention.tick_interval(),
            chrono::Duration::days(i64::from(retention.scan_ttl_days)),
            i64::from(retention.zip_ttl_hours),
        ));

        tokio::spawn(aggregate_stats::run_periodic_broadcast(
            self.stats.clone(),
            Arc::clone(&self.broadcaster),
            std::time::Duration::from_secs(5),
        ));

        info!("background tasks started: claim loop, retention sweep, stats broadcast");
        Ok(())
    }

    /// `Validation -> Admission -> enqueue`, per `§4.1`/`§4.2`. On success,
    /// also emits the job's initial queue-position broadcast.
    pub async fn submit_scan(
        &self,
        target_url: &str,
        email: Option<&str>,
        peer_ip: std::net::IpAddr,
        forwarded_for: Option<&str>,
        convert_to_webp: bool,
    ) -> anyhow::Result<Result<SubmitOutcome, SubmitRejection>> {
        let validation = validate_submission(target_url, email);
        if !validation.valid() {
            return Ok(Err(SubmitRejection::Validation(validation.errors)));
        }

        let effective_ip = resolve_effective_ip(&self.config, peer_ip, forwarded_for);
        let addr = SubmitterAddr::from_ip(effective_ip);

        if let Err(err) = self.admission.check(&addr).await {
            return Ok(Err(SubmitRejection::Admission(err)));
        }

        let submission_count = self.scan_repo.submission_count_for_ip(&addr).await?;
        let now = Utc::now();
        let job = ScanJob::new_queued(target_url.to_string(), email.map(str::to_string), addr, submission_count, convert_to_webp, now);
        self.scan_repo.insert(&job).await?;

        let queue_position = self.broadcast_initial_position(job.id, now).await?;
        Ok(Ok(SubmitOutcome { job, queue_position }))
    }

    async fn broadcast_initial_position(&self, scan_id: ScanId, now: chrono::DateTime<Utc>) -> anyhow::Result<Option<usize>> {
        let queued = self.scan_repo.list_by_status(ScanStatus::Queued).await?;
        let Some(position) = scheduler::queue_position(&queued, scan_id, now) else {
            return Ok(None);
        };

        let processing = self.scan_repo.list_by_status(ScanStatus::Processing).await?;
        let active_remaining_pages: Vec<u32> = processing
            .iter()
            .map(|j| j.pages_discovered.saturating_sub(j.pages_scanned).max(1))
            .collect();

        let avg_secs_per_page = self.config.per_request_delay().as_secs_f64().max(0.05);
        self.broadcaster.maybe_queue_position_update(
            scan_id,
            position,
            &active_remaining_pages,
            self.config.default_estimated_pages_per_site(),
            avg_secs_per_page,
        );
        Ok(Some(position))
    }

    /// Cooperatively cancel a running scan; a no-op if it isn't running.
    pub fn cancel_scan(&self, scan_id: ScanId) {
        self.worker_pool.cancel(scan_id);
    }
}

/// Why [`Application::submit_scan`] declined a submission.
#[derive(Debug, Clone)]
pub enum SubmitRejection {
    Validation(Vec<ValidationError>),
    Admission(AdmissionError),
}

/// Shared [`DomainPoliteness`] is owned by the worker pool itself; exposed
/// here only so other components (a status endpoint, say) can be built
/// against the same type without reaching into `worker_pool`'s privates.
pub type SharedPoliteness = Arc<DomainPoliteness>;
