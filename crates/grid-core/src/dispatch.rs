use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GridError;
use crate::wall_time::WallTime;

/// Bound on both connect and total-request time for outbound RPCs to
/// worker nodes, so a hung node can't stall the allocator loop.
const NODE_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a node needs to start a work unit.
#[derive(Debug, Clone, Serialize)]
pub struct AssignRequest {
    pub work_unit_id: u64,
    pub job_id: u64,
    pub executable: String,
    pub flags: String,
    pub filename: String,
    pub wall_time: String,
}

impl AssignRequest {
    pub fn new(
        work_unit_id: u64,
        job_id: u64,
        executable: String,
        flags: String,
        filename: String,
        wall_time_secs: u64,
    ) -> Self {
        Self {
            work_unit_id,
            job_id,
            executable,
            flags,
            filename,
            wall_time: WallTime::from_secs(wall_time_secs).format(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AssignResponse {
    pub task_id: String,
}

/// Outbound RPCs to worker nodes. Abstracted behind a trait so the
/// scheduler's allocation loop and kill path can be exercised without a
/// live node on the other end.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn assign(&self, node_url: &str, req: &AssignRequest) -> Result<AssignResponse, GridError>;
    async fn kill(&self, node_url: &str, task_id: &str) -> Result<(), GridError>;
}

pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl Default for HttpDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDispatcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(NODE_RPC_TIMEOUT)
            .connect_timeout(NODE_RPC_TIMEOUT)
            .build()
            .expect("reqwest client with static config must build");
        Self { client }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn assign(&self, node_url: &str, req: &AssignRequest) -> Result<AssignResponse, GridError> {
        let resp = self
            .client
            .post(format!("{node_url}/task"))
            .json(req)
            .send()
            .await
            .map_err(|e| GridError::NodeUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GridError::NodeUnavailable(format!(
                "node {node_url} rejected assignment with status {}",
                resp.status()
            )));
        }

        resp.json::<AssignResponse>()
            .await
            .map_err(|e| GridError::NodeUnavailable(e.to_string()))
    }

    async fn kill(&self, node_url: &str, task_id: &str) -> Result<(), GridError> {
        let resp = self
            .client
            .delete(format!("{node_url}/task/{task_id}"))
            .send()
            .await
            .map_err(|e| GridError::NodeUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GridError::NodeUnavailable(format!(
                "node {node_url} rejected kill with status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every call instead of performing network IO; used to test
    /// the scheduler's allocation loop and the kill-RPC-failure path.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        pub fail_assign: bool,
        pub fail_kill: bool,
        pub assigned: Mutex<Vec<(String, u64)>>,
        pub killed: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn assign(
            &self,
            node_url: &str,
            req: &AssignRequest,
        ) -> Result<AssignResponse, GridError> {
            if self.fail_assign {
                return Err(GridError::NodeUnavailable("simulated failure".into()));
            }
            self.assigned
                .lock()
                .unwrap()
                .push((node_url.to_string(), req.work_unit_id));
            Ok(AssignResponse {
                task_id: format!("task-{}", req.work_unit_id),
            })
        }

        async fn kill(&self, node_url: &str, task_id: &str) -> Result<(), GridError> {
            if self.fail_kill {
                return Err(GridError::NodeUnavailable("simulated failure".into()));
            }
            self.killed
                .lock()
                .unwrap()
                .push((node_url.to_string(), task_id.to_string()));
            Ok(())
        }
    }
}
