//! `[MODULE] AggregateStats` service layer (`§4.8`).
//!
//! A single background task owns every write to the singleton stats row
//! and its per-MIME/per-category children, serialized through an
//! `mpsc` command channel — no two `apply`/`subtract` calls from this
//! process ever race each other. The repository's own optimistic-retry
//! ladder (`SqliteStore::retry_stats_update`) remains the defense against
//! a second process or a crashed-and-restarted writer racing this one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::broadcaster::ProgressBroadcaster;
use crate::domain::{AggregateStats, StatsContribution};
use crate::store::StatsRepository;

/// A scan's contribution broken down by MIME type and category, in
/// addition to the aggregate delta applied to the singleton row.
#[derive(Debug, Clone, Default)]
pub struct Breakdown {
    pub total: StatsContribution,
    pub by_mime: Vec<(String, StatsContribution)>,
    pub by_category: Vec<(String, StatsContribution)>,
}

enum Command {
    Apply { breakdown: Breakdown, reply: oneshot::Sender<anyhow::Result<AggregateStats>> },
    Subtract { breakdown: Breakdown, reply: oneshot::Sender<anyhow::Result<AggregateStats>> },
    Snapshot { reply: oneshot::Sender<anyhow::Result<AggregateStats>> },
}

/// Handle used by the rest of the application to mutate or read
/// aggregate stats; cloning it is cheap (just the channel sender).
#[derive(Clone)]
pub struct AggregateStatsHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl AggregateStatsHandle {
    pub async fn apply(&self, breakdown: Breakdown) -> anyhow::Result<AggregateStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Apply { breakdown, reply })
            .map_err(|_| anyhow::anyhow!("aggregate stats writer task has shut down"))?;
        rx.await.map_err(|_| anyhow::anyhow!("aggregate stats writer task dropped the reply"))?
    }

    pub async fn subtract(&self, breakdown: Breakdown) -> anyhow::Result<AggregateStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Subtract { breakdown, reply })
            .map_err(|_| anyhow::anyhow!("aggregate stats writer task has shut down"))?;
        rx.await.map_err(|_| anyhow::anyhow!("aggregate stats writer task dropped the reply"))?
    }

    pub async fn snapshot(&self) -> anyhow::Result<AggregateStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .map_err(|_| anyhow::anyhow!("aggregate stats writer task has shut down"))?;
        rx.await.map_err(|_| anyhow::anyhow!("aggregate stats writer task dropped the reply"))?
    }
}

/// Spawn the single-writer task and return a cloneable handle to it.
pub fn spawn<R>(repo: Arc<R>) -> AggregateStatsHandle
where
    R: StatsRepository + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Apply { breakdown, reply } => {
                    let result = apply_breakdown(&repo, &breakdown).await;
                    let _ = reply.send(result);
                }
                Command::Subtract { breakdown, reply } => {
                    let result = subtract_breakdown(&repo, &breakdown).await;
                    let _ = reply.send(result);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(repo.get().await);
                }
            }
        }
    });

    AggregateStatsHandle { tx }
}

async fn apply_breakdown<R: StatsRepository>(repo: &Arc<R>, breakdown: &Breakdown) -> anyhow::Result<AggregateStats> {
    for (mime, delta) in &breakdown.by_mime {
        repo.upsert_mime_stat(mime, delta).await?;
    }
    for (category, delta) in &breakdown.by_category {
        repo.upsert_category_stat(category, delta).await?;
    }
    repo.apply(&breakdown.total).await
}

async fn subtract_breakdown<R: StatsRepository>(repo: &Arc<R>, breakdown: &Breakdown) -> anyhow::Result<AggregateStats> {
    for (mime, delta) in &breakdown.by_mime {
        repo.subtract_mime_stat(mime, delta).await?;
    }
    for (category, delta) in &breakdown.by_category {
        repo.subtract_category_stat(category, delta).await?;
    }
    repo.subtract(&breakdown.total).await
}

/// Periodically push the current snapshot to the global stats
/// subscription group, per `§4.8`'s "periodic broadcaster pushes the
/// current snapshot ... at a configured interval".
pub async fn run_periodic_broadcast(
    handle: AggregateStatsHandle,
    broadcaster: Arc<ProgressBroadcaster>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match handle.snapshot().await {
            Ok(stats) => broadcaster.stats_update(stats),
            Err(err) => warn!(%err, "failed to snapshot aggregate stats for periodic broadcast"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn apply_then_snapshot_reflects_the_contribution() {
        let repo = Arc::new(InMemoryStore::new());
        let handle = spawn(repo);

        let breakdown = Breakdown {
            total: StatsContribution { pages_crawled: 3, images_found: 2, original_size_bytes: 204_800, ..Default::default() },
            by_mime: vec![("image/png".into(), StatsContribution { images_found: 2, original_size_bytes: 204_800, ..Default::default() })],
            by_category: vec![],
        };
        let stats = handle.apply(breakdown).await.unwrap();
        assert_eq!(stats.total_scans, 1);
        assert_eq!(stats.total_images_found, 2);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.total_images_found, 2);
    }

    #[tokio::test]
    async fn subtract_never_drives_totals_negative() {
        let repo = Arc::new(InMemoryStore::new());
        let handle = spawn(repo);

        let breakdown = Breakdown {
            total: StatsContribution { images_found: 5, ..Default::default() },
            by_mime: vec![],
            by_category: vec![],
        };
        let stats = handle.subtract(breakdown).await.unwrap();
        assert_eq!(stats.total_images_found, 0);
    }
}
