use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::dispatch::{AssignRequest, Dispatcher};
use crate::error::GridError;
use crate::job::{Job, JobStatus, JobView, NewJobParams};
use crate::node::{NodeRegistry, NodeView};
use crate::queues::JobType;
use crate::scheduler::{MemLog, QueuedWorkUnit, SchedulerName, SchedulingStrategy};
use crate::work_unit::{WorkUnitStatus, WorkUnitView};

#[derive(Debug, Clone, Serialize)]
pub struct OutputFileEntry {
    pub work_unit_id: u64,
    pub output_filename: String,
    pub error_filename: String,
    pub kill_msg: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFilesInfo {
    pub info_msg: Option<String>,
    pub files: Vec<OutputFileEntry>,
}

/// Facade the transport layer talks to. Everything that touches more than
/// one of jobs/nodes/scheduler goes through here so invariants that span
/// them (kill must reach nodes before the job is marked dead, a finished
/// unit frees its node slot) are enforced in exactly one place.
#[async_trait]
pub trait GridService: Send + Sync {
    async fn set_scheduler(&self, name: &str) -> Result<SchedulerName, GridError>;
    async fn scheduler_name(&self) -> SchedulerName;
    async fn available_schedulers(&self) -> Vec<SchedulerName>;

    async fn list_jobs(&self) -> Vec<JobView>;
    async fn get_job(&self, key: &str) -> Result<JobView, GridError>;
    async fn add_job(&self, params: NewJobParams, now: i64) -> Result<u64, GridError>;
    async fn add_file(&self, job_id: u64, path: String, now: i64) -> Result<(), GridError>;
    async fn add_executable(&self, job_id: u64, path: String) -> Result<(), GridError>;
    async fn ready_job(&self, job_id: u64) -> Result<(), GridError>;
    async fn kill_job(&self, job_id: u64, reason: String, now: i64) -> Result<Option<String>, GridError>;
    async fn output_files_info(&self, job_id: u64) -> Result<OutputFilesInfo, GridError>;
    async fn finish_work_unit(
        &self,
        job_id: u64,
        work_unit_id: u64,
        kill_msg: Option<String>,
        now: i64,
    ) -> Result<WorkUnitView, GridError>;

    async fn register_node(
        &self,
        host: String,
        port: u16,
        cores: u32,
        programs: Vec<String>,
        cost: i64,
        now: i64,
    ) -> u64;
    async fn heartbeat_node(&self, key: &str, cpu: Option<f64>, now: i64) -> Result<(), GridError>;
    async fn list_nodes(&self) -> Vec<NodeView>;
    async fn get_node(&self, key: &str) -> Result<NodeView, GridError>;

    async fn log_tail(&self) -> Vec<(usize, String)>;

    /// One allocation pass: as long as a free node slot and a queued unit
    /// exist for its type, dispatch them together. Returns the number of
    /// units successfully dispatched.
    async fn run_allocation_pass(&self, now: i64) -> usize;

    /// Marks heartbeat-expired nodes dead and requeues their orphaned work.
    async fn sweep(&self, now: i64);
}

struct GridState {
    jobs: HashMap<u64, Job>,
    next_job_id: u64,
    nodes: NodeRegistry,
    scheduler_name: SchedulerName,
    strategy: Box<dyn SchedulingStrategy>,
    mem_log: MemLog,
}

pub struct GridServiceImpl {
    state: Mutex<GridState>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl GridServiceImpl {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        let scheduler_name = SchedulerName::Fcfs;
        Self {
            state: Mutex::new(GridState {
                jobs: HashMap::new(),
                next_job_id: 0,
                nodes: NodeRegistry::new(),
                strategy: scheduler_name.build(),
                scheduler_name,
                mem_log: MemLog::new(),
            }),
            dispatcher,
        }
    }
}

#[async_trait]
impl GridService for GridServiceImpl {
    async fn set_scheduler(&self, name: &str) -> Result<SchedulerName, GridError> {
        let parsed = SchedulerName::parse(name)?;
        let mut state = self.state.lock().await;
        state.strategy = parsed.build();
        state.scheduler_name = parsed;
        state.mem_log.push(format!("scheduler changed to {parsed}"));
        Ok(parsed)
    }

    async fn scheduler_name(&self) -> SchedulerName {
        self.state.lock().await.scheduler_name
    }

    async fn available_schedulers(&self) -> Vec<SchedulerName> {
        SchedulerName::ALL.to_vec()
    }

    async fn list_jobs(&self) -> Vec<JobView> {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .map(Job::to_view)
            .collect()
    }

    async fn get_job(&self, key: &str) -> Result<JobView, GridError> {
        let state = self.state.lock().await;
        let job_id: u64 = key
            .parse()
            .map_err(|_| GridError::JobNotFound(key.to_string()))?;
        state
            .jobs
            .get(&job_id)
            .map(Job::to_view)
            .ok_or_else(|| GridError::JobNotFound(key.to_string()))
    }

    async fn add_job(&self, params: NewJobParams, now: i64) -> Result<u64, GridError> {
        let mut state = self.state.lock().await;
        let job_id = state.next_job_id;
        let job = Job::new(job_id, params, now)?;
        state.next_job_id += 1;
        state.mem_log.push(format!("job {job_id} created"));
        state.jobs.insert(job_id, job);
        Ok(job_id)
    }

    async fn add_file(&self, job_id: u64, path: String, now: i64) -> Result<(), GridError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
        job.add_file(path, now)
    }

    async fn add_executable(&self, job_id: u64, path: String) -> Result<(), GridError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
        job.add_executable(path)
    }

    async fn ready_job(&self, job_id: u64) -> Result<(), GridError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
        job.ready()?;
        state.mem_log.push(format!("job {job_id} is ready"));
        Ok(())
    }

    /// Sends a kill RPC for every RUNNING unit's node before marking the job
    /// (and all its units) KILLED locally. An RPC failure does not abort the
    /// kill — the job dies either way — but is surfaced back to the caller
    /// as an info message instead of being silently dropped.
    async fn kill_job(&self, job_id: u64, reason: String, now: i64) -> Result<Option<String>, GridError> {
        let mut state = self.state.lock().await;
        let running: Vec<(u64, u64, String, u64)> = {
            let job = state
                .jobs
                .get(&job_id)
                .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
            job.work_units
                .iter()
                .filter(|u| u.status == WorkUnitStatus::Running)
                .filter_map(|u| {
                    Some((
                        u.work_unit_id,
                        u.node_id?,
                        u.task_id.clone()?,
                        u.work_unit_id,
                    ))
                })
                .collect()
        };

        let mut failures = Vec::new();
        for (work_unit_id, node_id, task_id, _) in &running {
            let node_url = match state.nodes.get(*node_id) {
                Ok(n) => n.url(),
                Err(_) => continue,
            };
            if let Err(e) = self.dispatcher.kill(&node_url, task_id).await {
                failures.push(format!("work unit {work_unit_id}: {e}"));
            }
        }

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
        job.kill(reason, now);
        state.mem_log.push(format!("job {job_id} killed"));
        tracing::info!(target: "grid.kill_job", job_id, unreachable_nodes = failures.len(), "job killed");

        let info_msg = if failures.is_empty() {
            None
        } else {
            Some(format!(
                "job killed locally, but {} node(s) could not be reached: {}",
                failures.len(),
                failures.join("; ")
            ))
        };
        Ok(info_msg)
    }

    async fn output_files_info(&self, job_id: u64) -> Result<OutputFilesInfo, GridError> {
        let state = self.state.lock().await;
        let job = state
            .jobs
            .get(&job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;

        let status = job.derived_status();
        if matches!(status, JobStatus::New | JobStatus::Pending) {
            return Err(GridError::InvalidJobStatus(format!(
                "job {job_id} has not produced output yet (status {status:?})"
            )));
        }

        let info_msg = match status {
            JobStatus::Running => {
                Some("job is still running; output may be incomplete".to_string())
            }
            JobStatus::Killed => job
                .kill_msg
                .clone()
                .map(|m| format!("job was killed: {m}")),
            _ => None,
        };

        let files = job
            .work_units
            .iter()
            .filter(|u| u.is_terminal())
            .map(|u| OutputFileEntry {
                work_unit_id: u.work_unit_id,
                output_filename: format!("{job_id}_{}.o", u.work_unit_id),
                error_filename: format!("{job_id}_{}.e", u.work_unit_id),
                kill_msg: if u.status == WorkUnitStatus::Killed && status != JobStatus::Killed {
                    u.kill_msg.clone()
                } else {
                    None
                },
            })
            .collect();

        Ok(OutputFilesInfo { info_msg, files })
    }

    async fn finish_work_unit(
        &self,
        job_id: u64,
        work_unit_id: u64,
        kill_msg: Option<String>,
        now: i64,
    ) -> Result<WorkUnitView, GridError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
        let (node_id, view) = {
            job.finish_work_unit(work_unit_id, now)?;
            if let Some(msg) = kill_msg {
                // SAFETY: finish_work_unit just succeeded, so this lookup can't miss.
                let unit = job
                    .work_units
                    .iter_mut()
                    .find(|u| u.work_unit_id == work_unit_id)
                    .unwrap();
                unit.override_with_kill_message(msg, now);
            }
            let unit = job
                .work_units
                .iter()
                .find(|u| u.work_unit_id == work_unit_id)
                .unwrap();
            (unit.node_id, unit.to_view())
        };
        if let Some(node_id) = node_id {
            state.nodes.remove_running(node_id, job_id, work_unit_id);
        }
        Ok(view)
    }

    async fn register_node(
        &self,
        host: String,
        port: u16,
        cores: u32,
        programs: Vec<String>,
        cost: i64,
        now: i64,
    ) -> u64 {
        let mut state = self.state.lock().await;
        let node_id = state.nodes.add_node(host, port, cores, programs, cost, now);
        state.mem_log.push(format!("node {node_id} online"));
        node_id
    }

    async fn heartbeat_node(&self, key: &str, cpu: Option<f64>, now: i64) -> Result<(), GridError> {
        let mut state = self.state.lock().await;
        let node_id = state.nodes.resolve(key)?.node_id;
        state.nodes.update_heartbeat(node_id, cpu, now)
    }

    async fn list_nodes(&self) -> Vec<NodeView> {
        self.state
            .lock()
            .await
            .nodes
            .all()
            .map(|n| n.to_view())
            .collect()
    }

    async fn get_node(&self, key: &str) -> Result<NodeView, GridError> {
        Ok(self.state.lock().await.nodes.resolve(key)?.to_view())
    }

    async fn log_tail(&self) -> Vec<(usize, String)> {
        self.state.lock().await.mem_log.tail()
    }

    async fn run_allocation_pass(&self, now: i64) -> usize {
        let mut dispatched = 0;
        loop {
            let plan = {
                let mut state = self.state.lock().await;
                let Some((node_id, node_url, job_id, work_unit_id)) = next_assignment(&mut state) else {
                    break;
                };
                let job = state.jobs.get(&job_id).expect("job must exist for a queued unit");
                let executable = job.executable.clone().unwrap_or_default();
                let flags = job.flags.clone();
                let wall_time_secs = job.wall_time_secs;
                let filename = job
                    .work_units
                    .iter()
                    .find(|u| u.work_unit_id == work_unit_id)
                    .map(|u| u.filename.clone())
                    .unwrap_or_default();
                (
                    node_id,
                    node_url,
                    AssignRequest::new(work_unit_id, job_id, executable, flags, filename, wall_time_secs),
                )
            };
            let (node_id, node_url, req) = plan;

            match self.dispatcher.assign(&node_url, &req).await {
                Ok(resp) => {
                    let mut state = self.state.lock().await;
                    let transitioned = state
                        .jobs
                        .get_mut(&req.job_id)
                        .and_then(|job| {
                            job.work_units
                                .iter_mut()
                                .find(|u| u.work_unit_id == req.work_unit_id)
                        })
                        .map(|unit| unit.running(node_id, resp.task_id.clone(), now).is_ok())
                        .unwrap_or(false);
                    if transitioned {
                        let _ = state
                            .nodes
                            .record_running(node_id, req.job_id, req.work_unit_id, resp.task_id);
                        state.mem_log.push(format!(
                            "dispatched job {} unit {} to node {node_id}",
                            req.job_id, req.work_unit_id
                        ));
                        tracing::debug!(
                            target: "grid.allocate",
                            job_id = req.job_id,
                            work_unit_id = req.work_unit_id,
                            node_id,
                            "dispatched work unit"
                        );
                        dispatched += 1;
                    } else {
                        state.mem_log.push(format!(
                            "job {} unit {} was no longer assignable after dispatch to node {node_id}; not recording as running",
                            req.job_id, req.work_unit_id
                        ));
                        tracing::warn!(
                            target: "grid.allocate",
                            job_id = req.job_id,
                            work_unit_id = req.work_unit_id,
                            node_id,
                            "unit no longer assignable after dispatch; node left idle"
                        );
                    }
                }
                Err(e) => {
                    let mut state = self.state.lock().await;
                    if let Ok(node) = state.nodes.get_mut(node_id) {
                        node.status = crate::node::NodeStatus::Dead;
                    }
                    state
                        .mem_log
                        .push(format!("node {node_id} rejected dispatch: {e}"));
                    tracing::warn!(target: "grid.allocate", node_id, error = %e, "node rejected dispatch; marking dead");
                    continue;
                }
            }
        }
        dispatched
    }

    async fn sweep(&self, now: i64) {
        let mut state = self.state.lock().await;
        let orphaned = state.nodes.sweep_timed_out(now);
        if !orphaned.is_empty() {
            tracing::info!(target: "grid.sweep", requeued = orphaned.len(), "nodes timed out; requeuing orphaned work");
        }
        for (job_id, work_unit_id) in orphaned {
            if let Some(job) = state.jobs.get_mut(&job_id) {
                if let Some(unit) = job
                    .work_units
                    .iter_mut()
                    .find(|u| u.work_unit_id == work_unit_id)
                {
                    unit.reset();
                }
            }
        }
        state.mem_log.push("liveness sweep complete".to_string());
    }
}

/// Tries each job-type queue in turn: a free node of that type paired with
/// a queued unit whose job is of that same type. The first type with both
/// wins the pass; others are left for the next tick.
fn next_assignment(state: &mut GridState) -> Option<(u64, String, u64, u64)> {
    for job_type in JobType::ALL {
        let node = state
            .nodes
            .free_nodes(job_type)
            .ok()?
            .first()
            .map(|n| (n.node_id, n.url()));
        let Some((node_id, node_url)) = node else {
            continue;
        };
        let candidates = queued_candidates(state, job_type);
        if let Some((job_id, work_unit_id)) = state.strategy.next(&candidates) {
            return Some((node_id, node_url, job_id, work_unit_id));
        }
    }
    None
}

fn queued_candidates(state: &GridState, job_type: JobType) -> Vec<QueuedWorkUnit> {
    state
        .jobs
        .values()
        .filter(|job| job.job_type == job_type)
        .flat_map(|job| {
            job.work_units.iter().filter_map(move |u| {
                if u.status != WorkUnitStatus::Queued {
                    return None;
                }
                Some(QueuedWorkUnit {
                    job_id: job.job_id,
                    work_unit_id: u.work_unit_id,
                    created_ts: u.created_ts,
                    deadline_ts: job.deadline_ts,
                    budget_cents: job.budget_cents,
                    job_type: job.job_type,
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test_support::RecordingDispatcher;
    use serde_json::json;

    fn new_params() -> NewJobParams {
        NewJobParams {
            name: Some("t".into()),
            flags: "".into(),
            wall_time: "00:10:00".into(),
            deadline: "2030-01-01 00:00:00".into(),
            budget: json!(0),
            job_type: None,
        }
    }

    fn service() -> GridServiceImpl {
        GridServiceImpl::new(Arc::new(RecordingDispatcher::default()))
    }

    #[tokio::test]
    async fn add_job_then_get_job_round_trips() {
        let svc = service();
        let id = svc.add_job(new_params(), 0).await.unwrap();
        let view = svc.get_job(&id.to_string()).await.unwrap();
        assert_eq!(view.job_id, id);
    }

    #[tokio::test]
    async fn allocation_pass_dispatches_queued_unit_to_free_node() {
        let svc = service();
        let job_id = svc.add_job(new_params(), 0).await.unwrap();
        svc.add_file(job_id, "input.txt".into(), 0).await.unwrap();
        svc.add_executable(job_id, "run.sh".into()).await.unwrap();
        svc.ready_job(job_id).await.unwrap();
        svc.register_node("127.0.0.1".into(), 9000, 4, vec![], 0, 0).await;

        let dispatched = svc.run_allocation_pass(1).await;
        assert_eq!(dispatched, 1);

        let view = svc.get_job(&job_id.to_string()).await.unwrap();
        assert_eq!(view.work_units[0].status, WorkUnitStatus::Running);
    }

    #[tokio::test]
    async fn kill_job_marks_all_units_killed() {
        let svc = service();
        let job_id = svc.add_job(new_params(), 0).await.unwrap();
        svc.add_file(job_id, "a".into(), 0).await.unwrap();
        svc.ready_job(job_id).await.unwrap();
        let info = svc.kill_job(job_id, "stop".into(), 5).await.unwrap();
        assert!(info.is_none());
        let view = svc.get_job(&job_id.to_string()).await.unwrap();
        assert_eq!(view.status, JobStatus::Killed);
    }

    #[tokio::test]
    async fn set_scheduler_rejects_unknown_name() {
        let svc = service();
        assert!(svc.set_scheduler("bogus").await.is_err());
    }

    #[tokio::test]
    async fn sweep_requeues_orphaned_work_from_dead_node() {
        let svc = service();
        let job_id = svc.add_job(new_params(), 0).await.unwrap();
        svc.add_file(job_id, "a".into(), 0).await.unwrap();
        svc.add_executable(job_id, "run.sh".into()).await.unwrap();
        svc.ready_job(job_id).await.unwrap();
        svc.register_node("h".into(), 1, 1, vec![], 0, 0).await;
        svc.run_allocation_pass(1).await;

        svc.sweep(1 + crate::node::NODE_TIMEOUT_SECS + 1).await;

        let view = svc.get_job(&job_id.to_string()).await.unwrap();
        assert_eq!(view.work_units[0].status, WorkUnitStatus::Queued);
    }
}
