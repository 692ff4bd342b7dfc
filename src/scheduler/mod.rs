//! `[MODULE] Scheduler` — fair-share ordering with aging (`§4.3`).
//!
//! The priority score is recomputed on read; only `submission_count` is
//! persisted at enqueue. This keeps the ordering consistent even when
//! jobs sit in the queue for a long time, with no background job to keep
//! scores "fresh".

use chrono::{DateTime, Utc};

use crate::domain::ScanJob;

/// Weight applied per submission-count bucket: `baseBucket(n) = n * BUCKET_WEIGHT`.
///
/// Chosen (Open Question decision, recorded in `DESIGN.md`) so that every
/// submitter's nth job strictly outranks anyone's (n+1)th job regardless
/// of queue wait, while aging still lets old jobs from the same bucket
/// win over brand-new ones.
pub const BUCKET_WEIGHT: f64 = 1000.0;

/// Points subtracted per second of wait, per `§4.3`.
pub const AGING_RATE: f64 = 0.5;

/// Total order key for a queued job: higher score wins; ties break by
/// `created_at` ascending, then by `id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityKey {
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub id: uuid::Uuid,
}

impl Eq for PriorityKey {}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher score first ("wins"), so invert the natural f64 order.
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// `score(j) = baseBucket(submissionCount[j]) - age(j) * agingRate`.
#[must_use]
pub fn priority_score(job: &ScanJob, now: DateTime<Utc>) -> f64 {
    let base = f64::from(job.submission_count) * BUCKET_WEIGHT;
    let age_secs = now
        .signed_duration_since(job.created_at)
        .num_milliseconds()
        .max(0) as f64
        / 1000.0;
    base - age_secs * AGING_RATE
}

#[must_use]
pub fn priority_key(job: &ScanJob, now: DateTime<Utc>) -> PriorityKey {
    PriorityKey {
        score: priority_score(job, now),
        created_at: job.created_at,
        id: job.id.0,
    }
}

/// Sort a snapshot of `Queued` jobs into the total order the Scheduler
/// defines. The caller is responsible for re-reading a fresh snapshot
/// periodically, since scores drift with wall-clock time.
pub fn order_queued(mut jobs: Vec<ScanJob>, now: DateTime<Utc>) -> Vec<ScanJob> {
    jobs.sort_by(|a, b| priority_key(a, now).cmp(&priority_key(b, now)));
    jobs
}

/// 1-based queue position of `target` among `queued`, per the `§8`
/// invariant: `|{j : score(j) > score(target), or tie and earlier}| + 1`.
#[must_use]
pub fn queue_position(queued: &[ScanJob], target_id: crate::domain::ScanId, now: DateTime<Utc>) -> Option<usize> {
    let target = queued.iter().find(|j| j.id == target_id)?;
    let target_key = priority_key(target, now);
    let ahead = queued
        .iter()
        .filter(|j| j.id != target_id)
        .filter(|j| priority_key(j, now) < target_key)
        .count();
    Some(ahead + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubmitterAddr;

    fn job(submission_count: u32, created_at: DateTime<Utc>) -> ScanJob {
        ScanJob::new_queued(
            "https://example.test/".into(),
            None,
            SubmitterAddr::from_ip("203.0.113.1".parse().unwrap()),
            submission_count,
            false,
            created_at,
        )
    }

    #[test]
    fn first_submissions_outrank_seconds() {
        let now = Utc::now();
        let first = job(1, now);
        let second = job(2, now);
        assert!(priority_score(&first, now) < priority_score(&second, now));
    }

    #[test]
    fn sole_queued_job_has_position_one() {
        let now = Utc::now();
        let only = job(1, now);
        let id = only.id;
        let pos = queue_position(&[only], id, now).unwrap();
        assert_eq!(pos, 1);
    }

    #[test]
    fn interleaves_two_submitters_by_bucket() {
        // Scenario 2 from §8: A1,B1,A2,B2,A3,B3 back-to-back at t=0.
        let now = Utc::now();
        let mut a = Vec::new();
        let mut b = Vec::new();
        for n in 1..=3 {
            a.push(job(n, now));
            b.push(job(n, now));
        }
        let mut all = Vec::new();
        all.extend(a);
        all.extend(b);
        let ordered = order_queued(all, now);
        let counts: Vec<u32> = ordered.iter().map(|j| j.submission_count).collect();
        assert_eq!(counts, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn aging_lets_old_first_submissions_outrank_fresh_ones_eventually() {
        let now = Utc::now();
        let old_first = job(1, now - chrono::Duration::seconds(10_000));
        let fresh_second = job(2, now);
        // Aging has eaten into old_first's score enough that it now
        // ranks behind a fresh second-submission.
        assert!(priority_score(&old_first, now) < priority_score(&fresh_second, now));
    }
}
