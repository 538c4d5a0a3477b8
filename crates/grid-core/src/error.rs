use thiserror::Error;

/// The Grid's error taxonomy. Validation variants are fully local and never
/// mutate state; `NodeUnavailable` is raised by the dispatcher and handled
/// internally by the scheduler (it never reaches a client directly except
/// when a kill can't reach its node).
#[derive(Debug, Error)]
pub enum GridError {
    #[error("scheduler {0} not found; valid schedulers: {1}")]
    InvalidScheduler(String, String),

    #[error("invalid job type: {0}")]
    InvalidJobType(String),

    #[error("invalid job budget: {0}")]
    InvalidJobBudget(String),

    #[error("invalid wall time format: {0}")]
    InvalidWallTimeFormat(String),

    #[error("invalid job deadline format: {0}")]
    InvalidJobDeadlineFormat(String),

    #[error("invalid job deadline: {0}")]
    InvalidJobDeadline(String),

    #[error("invalid job status: {0}")]
    InvalidJobStatus(String),

    #[error("invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl GridError {
    /// HTTP status this error maps to per the error-handling design.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidScheduler(_, _)
            | Self::InvalidJobType(_)
            | Self::InvalidJobBudget(_)
            | Self::InvalidWallTimeFormat(_)
            | Self::InvalidJobDeadlineFormat(_)
            | Self::InvalidJobDeadline(_)
            | Self::InvalidJobStatus(_)
            | Self::InvalidNodeType(_)
            | Self::NodeUnavailable(_) => 400,
            Self::JobNotFound(_) | Self::NodeNotFound(_) => 404,
            Self::InvalidTransition(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
