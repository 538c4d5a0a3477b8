pub mod config;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod job;
pub mod node;
pub mod queues;
pub mod scheduler;
pub mod wall_time;
pub mod work_unit;

pub use config::GridConfig;
pub use dispatch::{AssignRequest, AssignResponse, Dispatcher, HttpDispatcher};
pub use error::{GridError, Result};
pub use grid::{GridService, GridServiceImpl, OutputFileEntry, OutputFilesInfo};
pub use job::{
    executable_path, input_path, output_path, sanitize_file_name, Job, JobStatus, JobView,
    NewJobParams,
};
pub use node::{Node, NodeRegistry, NodeStatus, NodeView};
pub use queues::{JobType, QueueSpec};
pub use scheduler::{QueuedWorkUnit, SchedulerName, SchedulingStrategy};
pub use wall_time::WallTime;
pub use work_unit::{WorkUnit, WorkUnitStatus, WorkUnitView};
