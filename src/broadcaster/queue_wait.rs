//! Queue-wait estimation (`§4.9`'s design invariant): simulate queue
//! progression over the currently active scans' remaining-page counts
//! rather than a closed-form formula.
//!
//! For each of the `position` scans ahead of the target: the scan with
//! the fewest remaining pages finishes next (after `m` more ticks);
//! every other active scan's remaining count drops by `m`; the
//! finished slot is immediately backfilled by a fresh scan estimated at
//! `default_estimated_pages_per_site` (the queue is non-empty, so a
//! free worker always picks up the next job). The sum of every `m`,
//! scaled by the average time per page, is the estimated wait.

/// Returns `None` ("unknown") when there are no active scans to
/// extrapolate from, per `§4.9`.
#[must_use]
pub fn estimate_wait_seconds(
    position: usize,
    active_remaining_pages: &[u32],
    default_estimated_pages_per_site: u32,
    avg_secs_per_page: f64,
) -> Option<u64> {
    if active_remaining_pages.is_empty() {
        return None;
    }

    let mut remaining: Vec<u32> = active_remaining_pages.to_vec();
    let mut total_ticks: u64 = 0;

    for _ in 0..position {
        let (idx, &m) = remaining
            .iter()
            .enumerate()
            .min_by_key(|&(_, &v)| v)
            .expect("checked non-empty above and never fully drained");

        for v in remaining.iter_mut() {
            *v = v.saturating_sub(m);
        }
        remaining.remove(idx);
        remaining.push(default_estimated_pages_per_site);

        total_ticks += u64::from(m);
    }

    Some((total_ticks as f64 * avg_secs_per_page).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_active_scans_is_unknown() {
        assert_eq!(estimate_wait_seconds(1, &[], 25, 2.0), None);
    }

    #[test]
    fn single_active_scan_waits_for_it_to_finish() {
        // One active scan with 10 pages left; target is position 1.
        let result = estimate_wait_seconds(1, &[10], 25, 2.0).unwrap();
        assert_eq!(result, 20);
    }

    #[test]
    fn backfills_with_the_default_estimate_after_each_finish() {
        // Two active scans at [4, 10]; position 2 waits through two
        // finish events: first the 4-page scan (m=4, remaining [6]),
        // backfilled with a fresh 25-page scan -> [6, 25]; then the
        // 6-page scan finishes (m=6). Total ticks = 4 + 6 = 10.
        let result = estimate_wait_seconds(2, &[4, 10], 25, 1.0).unwrap();
        assert_eq!(result, 10);
    }
}
