mod strategies;

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::GridError;
use crate::queues::JobType;

pub use strategies::{
    DeadlineCostStrategy, DeadlineStrategy, FcfsStrategy, PriorityQueueStrategy, RoundRobinStrategy,
};

const MEM_LOG_CAPACITY: usize = 1000;
pub const LOG_TAIL_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerName {
    RoundRobin,
    Fcfs,
    Deadline,
    DeadlineCost,
    PriorityQueue,
}

impl SchedulerName {
    pub const ALL: [SchedulerName; 5] = [
        Self::RoundRobin,
        Self::Fcfs,
        Self::Deadline,
        Self::DeadlineCost,
        Self::PriorityQueue,
    ];

    pub fn parse(s: &str) -> Result<Self, GridError> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "roundrobin" => Ok(Self::RoundRobin),
            "fcfs" => Ok(Self::Fcfs),
            "deadline" => Ok(Self::Deadline),
            "deadlinecost" => Ok(Self::DeadlineCost),
            "priorityqueue" => Ok(Self::PriorityQueue),
            _ => Err(GridError::InvalidScheduler(
                s.to_string(),
                Self::ALL
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Fcfs => "fcfs",
            Self::Deadline => "deadline",
            Self::DeadlineCost => "deadline_cost",
            Self::PriorityQueue => "priority_queue",
        }
    }

    pub fn build(&self) -> Box<dyn SchedulingStrategy> {
        match self {
            Self::RoundRobin => Box::new(RoundRobinStrategy::default()),
            Self::Fcfs => Box::new(FcfsStrategy),
            Self::Deadline => Box::new(DeadlineStrategy),
            Self::DeadlineCost => Box::new(DeadlineCostStrategy),
            Self::PriorityQueue => Box::new(PriorityQueueStrategy),
        }
    }
}

impl std::fmt::Display for SchedulerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The information a strategy needs about one candidate unit, gathered by
/// the Grid facade from the job table before each allocation pass.
#[derive(Debug, Clone, Copy)]
pub struct QueuedWorkUnit {
    pub job_id: u64,
    pub work_unit_id: u64,
    pub created_ts: i64,
    pub deadline_ts: i64,
    pub budget_cents: i64,
    pub job_type: JobType,
}

/// A pluggable work-unit selection policy. `next` is called once per free
/// node slot during an allocation pass and must not assume the candidate
/// list is stable between calls — units it doesn't pick may vanish (killed)
/// or its own pick may later fail to dispatch.
pub trait SchedulingStrategy: Send + Sync {
    fn next(&mut self, candidates: &[QueuedWorkUnit]) -> Option<(u64, u64)>;
}

/// Rolling log of scheduler activity, exposed via the `/log` endpoint.
pub struct MemLog {
    entries: VecDeque<String>,
}

impl Default for MemLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MEM_LOG_CAPACITY),
        }
    }

    pub fn push(&mut self, line: String) {
        if self.entries.len() == MEM_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(line);
    }

    /// Last [`LOG_TAIL_LEN`] entries, oldest first, each paired with a
    /// synthetic index (matching the wire view's `{id, message}` shape).
    pub fn tail(&self) -> Vec<(usize, String)> {
        let skip = self.entries.len().saturating_sub(LOG_TAIL_LEN);
        self.entries
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, line)| (i, line.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_and_separator_insensitive() {
        assert_eq!(SchedulerName::parse("Round-Robin").unwrap(), SchedulerName::RoundRobin);
        assert_eq!(SchedulerName::parse("priority_queue").unwrap(), SchedulerName::PriorityQueue);
    }

    #[test]
    fn parse_rejects_unknown_name() {
        assert!(SchedulerName::parse("bogus").is_err());
    }

    #[test]
    fn mem_log_caps_and_reports_tail() {
        let mut log = MemLog::new();
        for i in 0..(LOG_TAIL_LEN + 10) {
            log.push(format!("line {i}"));
        }
        let tail = log.tail();
        assert_eq!(tail.len(), LOG_TAIL_LEN);
        assert_eq!(tail.last().unwrap().1, format!("line {}", LOG_TAIL_LEN + 9));
    }
}
