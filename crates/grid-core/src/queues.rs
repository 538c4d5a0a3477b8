use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// The three typed node queues, also used as job priority classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobType {
    Default,
    Batch,
    Fast,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Default, JobType::Batch, JobType::Fast];

    pub fn parse(s: &str) -> Result<Self, GridError> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "BATCH" => Ok(Self::Batch),
            "FAST" => Ok(Self::Fast),
            other => Err(GridError::InvalidJobType(format!(
                "{other} is not a valid job type. Valid types: DEFAULT, BATCH, FAST"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Batch => "BATCH",
            Self::Fast => "FAST",
        }
    }

    /// (target proportion of nodes, max wall time in seconds — `None` is unbounded).
    pub fn queue_spec(&self) -> QueueSpec {
        match self {
            Self::Default => QueueSpec {
                target_proportion: 0.5,
                max_wall_time_secs: Some(7 * 24 * 3600),
            },
            Self::Batch => QueueSpec {
                target_proportion: 0.3,
                max_wall_time_secs: None,
            },
            Self::Fast => QueueSpec {
                target_proportion: 0.2,
                max_wall_time_secs: Some(3600),
            },
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueSpec {
    pub target_proportion: f64,
    pub max_wall_time_secs: Option<u64>,
}
