use serde::Serialize;

use crate::error::GridError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkUnitStatus {
    Pending,
    Queued,
    Running,
    Finished,
    Killed,
}

/// One (job, input file) pair — the unit of scheduling.
///
/// Invariant: `node_id`/`task_id` are `Some` iff `status` is one of
/// `Running`, `Finished`, `Killed`.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub work_unit_id: u64,
    pub job_id: u64,
    pub filename: String,
    pub status: WorkUnitStatus,
    pub node_id: Option<u64>,
    pub task_id: Option<String>,
    pub kill_msg: Option<String>,
    pub created_ts: i64,
    pub started_ts: Option<i64>,
    pub finished_ts: Option<i64>,
}

impl WorkUnit {
    pub fn new(work_unit_id: u64, job_id: u64, filename: String, now: i64) -> Self {
        Self {
            work_unit_id,
            job_id,
            filename,
            status: WorkUnitStatus::Pending,
            node_id: None,
            task_id: None,
            kill_msg: None,
            created_ts: now,
            started_ts: None,
            finished_ts: None,
        }
    }

    /// PENDING -> QUEUED, called when the owning job transitions READY.
    pub fn enqueue(&mut self) -> Result<(), GridError> {
        match self.status {
            WorkUnitStatus::Pending => {
                self.status = WorkUnitStatus::Queued;
                Ok(())
            }
            WorkUnitStatus::Queued => Ok(()),
            _ => Err(GridError::InvalidTransition(format!(
                "work unit {} cannot be queued from {:?}",
                self.work_unit_id, self.status
            ))),
        }
    }

    /// QUEUED -> RUNNING, called on successful dispatch.
    pub fn running(&mut self, node_id: u64, task_id: String, now: i64) -> Result<(), GridError> {
        if self.status != WorkUnitStatus::Queued {
            return Err(GridError::InvalidTransition(format!(
                "work unit {} cannot start running from {:?}",
                self.work_unit_id, self.status
            )));
        }
        self.status = WorkUnitStatus::Running;
        self.node_id = Some(node_id);
        self.task_id = Some(task_id);
        self.started_ts = Some(now);
        Ok(())
    }

    /// RUNNING -> FINISHED, called on a node's completion report. Rejected
    /// from KILLED (a dead job cannot "finish" after the fact).
    pub fn finish(&mut self, now: i64) -> Result<(), GridError> {
        if self.status != WorkUnitStatus::Running {
            return Err(GridError::InvalidTransition(format!(
                "work unit {} cannot finish from {:?}",
                self.work_unit_id, self.status
            )));
        }
        self.status = WorkUnitStatus::Finished;
        self.finished_ts = Some(now);
        Ok(())
    }

    /// Any non-terminal state -> KILLED. Preserves whatever `kill_msg` was
    /// already set by the caller.
    pub fn kill(&mut self, now: i64) {
        if matches!(
            self.status,
            WorkUnitStatus::Finished | WorkUnitStatus::Killed
        ) {
            return;
        }
        self.status = WorkUnitStatus::Killed;
        self.finished_ts = Some(now);
    }

    /// Overrides a just-finished unit with a kill message, for the case
    /// where a node reports completion and a kill reason in the same
    /// report. No-op if the unit was already KILLED.
    pub fn override_with_kill_message(&mut self, msg: String, now: i64) {
        if self.status == WorkUnitStatus::Killed {
            return;
        }
        self.kill_msg = Some(msg);
        self.status = WorkUnitStatus::Killed;
        self.finished_ts = Some(now);
    }

    /// RUNNING -> QUEUED, used when the unit's node dies. Idempotent when
    /// already QUEUED.
    pub fn reset(&mut self) {
        if self.status == WorkUnitStatus::Queued {
            return;
        }
        self.status = WorkUnitStatus::Queued;
        self.node_id = None;
        self.task_id = None;
        self.started_ts = None;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WorkUnitStatus::Finished | WorkUnitStatus::Killed
        )
    }

    pub fn to_view(&self) -> WorkUnitView {
        WorkUnitView {
            work_unit_id: self.work_unit_id,
            job_id: self.job_id,
            filename: self.filename.clone(),
            status: self.status,
            node_id: self.node_id,
            task_id: self.task_id.clone(),
            kill_msg: self.kill_msg.clone(),
            created_ts: self.created_ts,
            started_ts: self.started_ts,
            finished_ts: self.finished_ts,
        }
    }
}

/// API-facing view of a work unit (`to_dict()` in the original design).
#[derive(Debug, Clone, Serialize)]
pub struct WorkUnitView {
    pub work_unit_id: u64,
    pub job_id: u64,
    pub filename: String,
    pub status: WorkUnitStatus,
    pub node_id: Option<u64>,
    pub task_id: Option<String>,
    pub kill_msg: Option<String>,
    pub created_ts: i64,
    pub started_ts: Option<i64>,
    pub finished_ts: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> WorkUnit {
        WorkUnit::new(0, 0, "a.txt".into(), 100)
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut u = unit();
        u.enqueue().unwrap();
        assert_eq!(u.status, WorkUnitStatus::Queued);
        u.running(1, "task-1".into(), 101).unwrap();
        assert_eq!(u.status, WorkUnitStatus::Running);
        assert_eq!(u.node_id, Some(1));
        u.finish(102).unwrap();
        assert_eq!(u.status, WorkUnitStatus::Finished);
        assert_eq!(u.finished_ts, Some(102));
    }

    #[test]
    fn reset_is_idempotent_on_queued() {
        let mut u = unit();
        u.enqueue().unwrap();
        u.reset();
        u.reset();
        assert_eq!(u.status, WorkUnitStatus::Queued);
        assert!(u.node_id.is_none());
    }

    #[test]
    fn reset_clears_node_assignment() {
        let mut u = unit();
        u.enqueue().unwrap();
        u.running(3, "t".into(), 1).unwrap();
        u.reset();
        assert_eq!(u.status, WorkUnitStatus::Queued);
        assert!(u.node_id.is_none());
        assert!(u.task_id.is_none());
        assert!(u.started_ts.is_none());
    }

    #[test]
    fn finish_on_killed_is_rejected() {
        let mut u = unit();
        u.enqueue().unwrap();
        u.running(1, "t".into(), 1).unwrap();
        u.kill(2);
        assert!(u.finish(3).is_err());
    }

    #[test]
    fn kill_is_idempotent() {
        let mut u = unit();
        u.kill(1);
        u.kill(2);
        assert_eq!(u.status, WorkUnitStatus::Killed);
        assert_eq!(u.finished_ts, Some(1));
    }
}
