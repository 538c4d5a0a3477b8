use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::GridError;
use crate::queues::JobType;
use crate::wall_time::WallTime;
use crate::work_unit::{WorkUnit, WorkUnitStatus, WorkUnitView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    New,
    Ready,
    Pending,
    Running,
    Finished,
    Killed,
}

/// Parameters for a new job, as received from the client (loosely typed at
/// the JSON boundary, matching what the wire protocol actually hands us).
pub struct NewJobParams {
    pub name: Option<String>,
    pub flags: String,
    pub wall_time: String,
    pub deadline: String,
    pub budget: serde_json::Value,
    pub job_type: Option<String>,
}

/// Aggregate of work units plus job-level scheduling policy.
pub struct Job {
    pub job_id: u64,
    pub name: String,
    pub flags: String,
    pub wall_time_secs: u64,
    pub deadline_ts: i64,
    pub budget_cents: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_ts: i64,
    pub kill_msg: Option<String>,
    pub executable: Option<String>,
    pub files: Vec<String>,
    pub work_units: Vec<WorkUnit>,
}

impl Job {
    /// Validates, in order: unknown job_type; non-integer/negative budget;
    /// malformed wall_time; malformed deadline; deadline in the past;
    /// `deadline - wall_time < now`; wall_time exceeding the queue's
    /// `max_wall_time`.
    pub fn new(job_id: u64, params: NewJobParams, now: i64) -> Result<Self, GridError> {
        let job_type = match params.job_type.as_deref() {
            None => JobType::Default,
            Some(s) => JobType::parse(s)?,
        };

        let budget_cents = params
            .budget
            .as_i64()
            .ok_or_else(|| {
                GridError::InvalidJobBudget(format!(
                    "budget must be a whole number of cents, got: {}",
                    params.budget
                ))
            })
            .and_then(|b| {
                if b < 0 {
                    Err(GridError::InvalidJobBudget(format!(
                        "budget must be >= 0, got: {b}"
                    )))
                } else {
                    Ok(b)
                }
            })?;

        let wall_time = WallTime::parse(&params.wall_time)?;
        let wall_time_secs = wall_time.as_secs();

        let deadline_naive =
            NaiveDateTime::parse_from_str(&params.deadline, "%Y-%m-%d %H:%M:%S").map_err(|_| {
                GridError::InvalidJobDeadlineFormat(format!(
                    "expected YYYY-MM-DD HH:MM:SS, got: {}",
                    params.deadline
                ))
            })?;
        let deadline_ts = deadline_naive.and_utc().timestamp();

        if deadline_ts <= now {
            return Err(GridError::InvalidJobDeadline(
                "deadline is in the past".into(),
            ));
        }
        if deadline_ts - (wall_time_secs as i64) < now {
            return Err(GridError::InvalidJobDeadline(
                "current time plus wall time is later than the deadline".into(),
            ));
        }

        let spec = job_type.queue_spec();
        if let Some(max) = spec.max_wall_time_secs {
            if wall_time_secs > max {
                return Err(GridError::InvalidJobType(format!(
                    "wall time {wall_time} is too large for job type {job_type}; max is {}",
                    WallTime::from_secs(max)
                )));
            }
        }

        Ok(Self {
            job_id,
            name: params.name.unwrap_or_else(|| "Unknown".to_string()),
            flags: params.flags,
            wall_time_secs,
            deadline_ts,
            budget_cents,
            job_type,
            status: JobStatus::New,
            created_ts: now,
            kill_msg: None,
            executable: None,
            files: Vec::new(),
            work_units: Vec::new(),
        })
    }

    /// Appends an input file and creates its bound PENDING work unit.
    /// Rejected once the job has left NEW.
    pub fn add_file(&mut self, path: String, now: i64) -> Result<(), GridError> {
        if self.status != JobStatus::New {
            return Err(GridError::InvalidTransition(format!(
                "cannot add files to job {} in status {:?}",
                self.job_id, self.status
            )));
        }
        let work_unit_id = self.work_units.len() as u64;
        self.work_units
            .push(WorkUnit::new(work_unit_id, self.job_id, path.clone(), now));
        self.files.push(path);
        Ok(())
    }

    pub fn add_executable(&mut self, path: String) -> Result<(), GridError> {
        if self.executable.is_some() {
            return Err(GridError::InvalidTransition(format!(
                "job {} already has an executable",
                self.job_id
            )));
        }
        self.executable = Some(path);
        Ok(())
    }

    /// NEW -> READY. All PENDING units transition to QUEUED.
    pub fn ready(&mut self) -> Result<(), GridError> {
        if self.status != JobStatus::New {
            return Err(GridError::InvalidJobStatus(format!(
                "job {} cannot become READY from {:?}",
                self.job_id, self.status
            )));
        }
        self.status = JobStatus::Ready;
        for unit in &mut self.work_units {
            unit.enqueue()?;
        }
        Ok(())
    }

    /// Marks the job KILLED and kills every non-terminal work unit locally.
    /// Does not talk to nodes — that's the Grid facade's job (it must send
    /// the kill RPCs first, using still-RUNNING state).
    pub fn kill(&mut self, msg: String, now: i64) {
        self.kill_msg = Some(msg);
        self.status = JobStatus::Killed;
        for unit in &mut self.work_units {
            unit.kill(now);
        }
    }

    pub fn finish_work_unit(&mut self, work_unit_id: u64, now: i64) -> Result<&WorkUnit, GridError> {
        let unit = self
            .work_units
            .iter_mut()
            .find(|u| u.work_unit_id == work_unit_id)
            .ok_or_else(|| {
                GridError::InvalidTransition(format!(
                    "job {} has no work unit {}",
                    self.job_id, work_unit_id
                ))
            })?;
        unit.finish(now)?;
        Ok(unit)
    }

    /// Aggregate status: RUNNING if any unit RUNNING; FINISHED if all units
    /// FINISHED (vacuously true for a zero-file job); KILLED if `kill_msg`
    /// is set; else whatever the job-level status currently is
    /// (READY/PENDING/NEW).
    pub fn derived_status(&self) -> JobStatus {
        if self.kill_msg.is_some() {
            return JobStatus::Killed;
        }
        if self
            .work_units
            .iter()
            .any(|u| u.status == WorkUnitStatus::Running)
        {
            return JobStatus::Running;
        }
        if self.status != JobStatus::New
            && self
                .work_units
                .iter()
                .all(|u| u.status == WorkUnitStatus::Finished)
        {
            return JobStatus::Finished;
        }
        self.status
    }

    pub fn input_path(&self, root: &Path, file_name: &str) -> PathBuf {
        input_path(root, self.job_id, file_name)
    }

    pub fn output_path(&self, root: &Path, file_name: &str) -> PathBuf {
        output_path(root, self.job_id, file_name)
    }

    pub fn executable_path(&self, root: &Path, file_name: &str) -> PathBuf {
        executable_path(root, self.job_id, file_name)
    }

    pub fn to_view(&self) -> JobView {
        JobView {
            job_id: self.job_id,
            name: self.name.clone(),
            flags: self.flags.clone(),
            wall_time: WallTime::from_secs(self.wall_time_secs).format(),
            deadline: self.deadline_ts,
            budget: self.budget_cents,
            job_type: self.job_type,
            status: self.derived_status(),
            created_ts: self.created_ts,
            kill_msg: self.kill_msg.clone(),
            executable: self.executable.clone(),
            files: self.files.clone(),
            work_units: self.work_units.iter().map(WorkUnit::to_view).collect(),
        }
    }
}

/// Strips any path separators so an uploaded filename can never escape its
/// job directory (no `..`, no absolute paths, no nested subdirectories).
pub fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

pub fn input_path(root: &Path, job_id: u64, file_name: &str) -> PathBuf {
    root.join("jobs")
        .join(job_id.to_string())
        .join("files")
        .join(sanitize_file_name(file_name))
}

pub fn output_path(root: &Path, job_id: u64, file_name: &str) -> PathBuf {
    root.join("jobs")
        .join(job_id.to_string())
        .join("output")
        .join(sanitize_file_name(file_name))
}

pub fn executable_path(root: &Path, job_id: u64, file_name: &str) -> PathBuf {
    root.join("jobs")
        .join(job_id.to_string())
        .join("executable")
        .join(sanitize_file_name(file_name))
}

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: u64,
    pub name: String,
    pub flags: String,
    pub wall_time: String,
    pub deadline: i64,
    pub budget: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_ts: i64,
    pub kill_msg: Option<String>,
    pub executable: Option<String>,
    pub files: Vec<String>,
    pub work_units: Vec<WorkUnitView>,
}
