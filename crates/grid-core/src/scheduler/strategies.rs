use crate::queues::JobType;

use super::{QueuedWorkUnit, SchedulingStrategy};

/// Cycles through distinct jobs in job-id order, picking one unit from the
/// job after whichever was served last. Falls back to the first candidate
/// once the remembered job no longer has queued work.
#[derive(Default)]
pub struct RoundRobinStrategy {
    last_job_id: Option<u64>,
}

impl SchedulingStrategy for RoundRobinStrategy {
    fn next(&mut self, candidates: &[QueuedWorkUnit]) -> Option<(u64, u64)> {
        if candidates.is_empty() {
            return None;
        }
        let mut job_ids: Vec<u64> = candidates.iter().map(|c| c.job_id).collect();
        job_ids.sort_unstable();
        job_ids.dedup();

        let start = match self.last_job_id {
            Some(last) => job_ids
                .iter()
                .position(|&id| id > last)
                .unwrap_or(0),
            None => 0,
        };
        let next_job_id = job_ids[start];
        self.last_job_id = Some(next_job_id);

        candidates
            .iter()
            .filter(|c| c.job_id == next_job_id)
            .min_by_key(|c| c.work_unit_id)
            .map(|c| (c.job_id, c.work_unit_id))
    }
}

/// First-come-first-served: the job with the earliest `created_ts` wins,
/// and its lowest-numbered queued unit is dispatched.
pub struct FcfsStrategy;

impl SchedulingStrategy for FcfsStrategy {
    fn next(&mut self, candidates: &[QueuedWorkUnit]) -> Option<(u64, u64)> {
        let earliest_job = candidates
            .iter()
            .min_by_key(|c| (c.created_ts, c.job_id))
            .map(|c| c.job_id)?;
        candidates
            .iter()
            .filter(|c| c.job_id == earliest_job)
            .min_by_key(|c| c.work_unit_id)
            .map(|c| (c.job_id, c.work_unit_id))
    }
}

/// Whichever job's deadline is soonest goes first.
pub struct DeadlineStrategy;

impl SchedulingStrategy for DeadlineStrategy {
    fn next(&mut self, candidates: &[QueuedWorkUnit]) -> Option<(u64, u64)> {
        candidates
            .iter()
            .min_by_key(|c| (c.deadline_ts, c.work_unit_id))
            .map(|c| (c.job_id, c.work_unit_id))
    }
}

/// Deadline pressure tempered by how much the client is paying: a job
/// closer to its deadline or with a larger budget is served first.
pub struct DeadlineCostStrategy;

impl SchedulingStrategy for DeadlineCostStrategy {
    fn next(&mut self, candidates: &[QueuedWorkUnit]) -> Option<(u64, u64)> {
        candidates
            .iter()
            .min_by(|a, b| {
                let score = |c: &QueuedWorkUnit| c.deadline_ts as f64 / (c.budget_cents as f64 + 1.0);
                score(a)
                    .partial_cmp(&score(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|c| (c.job_id, c.work_unit_id))
    }
}

/// FAST jobs ahead of DEFAULT ahead of BATCH; ties broken by submission
/// order.
pub struct PriorityQueueStrategy;

impl SchedulingStrategy for PriorityQueueStrategy {
    fn next(&mut self, candidates: &[QueuedWorkUnit]) -> Option<(u64, u64)> {
        let rank = |jt: JobType| match jt {
            JobType::Fast => 0,
            JobType::Default => 1,
            JobType::Batch => 2,
        };
        candidates
            .iter()
            .min_by_key(|c| (rank(c.job_type), c.created_ts, c.work_unit_id))
            .map(|c| (c.job_id, c.work_unit_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(job_id: u64, work_unit_id: u64, created_ts: i64, deadline_ts: i64, budget: i64, jt: JobType) -> QueuedWorkUnit {
        QueuedWorkUnit {
            job_id,
            work_unit_id,
            created_ts,
            deadline_ts,
            budget_cents: budget,
            job_type: jt,
        }
    }

    #[test]
    fn round_robin_cycles_jobs_in_order() {
        let mut s = RoundRobinStrategy::default();
        let candidates = vec![
            unit(0, 0, 0, 100, 0, JobType::Default),
            unit(1, 0, 0, 100, 0, JobType::Default),
            unit(2, 0, 0, 100, 0, JobType::Default),
        ];
        assert_eq!(s.next(&candidates), Some((0, 0)));
        assert_eq!(s.next(&candidates), Some((1, 0)));
        assert_eq!(s.next(&candidates), Some((2, 0)));
        assert_eq!(s.next(&candidates), Some((0, 0)));
    }

    #[test]
    fn fcfs_picks_earliest_created_job() {
        let mut s = FcfsStrategy;
        let candidates = vec![
            unit(0, 0, 50, 100, 0, JobType::Default),
            unit(1, 0, 10, 100, 0, JobType::Default),
        ];
        assert_eq!(s.next(&candidates), Some((1, 0)));
    }

    #[test]
    fn deadline_picks_soonest_deadline() {
        let mut s = DeadlineStrategy;
        let candidates = vec![
            unit(0, 0, 0, 500, 0, JobType::Default),
            unit(1, 0, 0, 50, 0, JobType::Default),
        ];
        assert_eq!(s.next(&candidates), Some((1, 0)));
    }

    #[test]
    fn priority_queue_prefers_fast_over_default_over_batch() {
        let mut s = PriorityQueueStrategy;
        let candidates = vec![
            unit(0, 0, 0, 100, 0, JobType::Batch),
            unit(1, 0, 1, 100, 0, JobType::Default),
            unit(2, 0, 2, 100, 0, JobType::Fast),
        ];
        assert_eq!(s.next(&candidates), Some((2, 0)));
    }

    #[test]
    fn empty_candidates_yield_none_for_every_strategy() {
        assert_eq!(RoundRobinStrategy::default().next(&[]), None);
        assert_eq!(FcfsStrategy.next(&[]), None);
        assert_eq!(DeadlineStrategy.next(&[]), None);
        assert_eq!(DeadlineCostStrategy.next(&[]), None);
        assert_eq!(PriorityQueueStrategy.next(&[]), None);
    }

    #[test]
    fn deadline_cost_breaks_tie_toward_higher_budget() {
        let mut s = DeadlineCostStrategy;
        let candidates = vec![
            unit(0, 0, 0, 1000, 0, JobType::Default),
            unit(1, 0, 0, 1000, 10_000, JobType::Default),
        ];
        // Higher budget divides the score down, so it should win.
        let picked = s.next(&candidates);
        assert_eq!(picked, Some((1, 0)));
    }
}
