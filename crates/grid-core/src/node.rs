use std::collections::HashMap;

use serde::Serialize;

use crate::error::GridError;
use crate::queues::JobType;

pub const NODE_TIMEOUT_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Online,
    Dead,
}

/// A worker node and the set of task ids it currently has running.
#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: u64,
    pub host: String,
    pub port: u16,
    pub cores: u32,
    /// Executables this node is able to run; advisory, never validated
    /// against a job's `executable` before dispatch.
    pub programs: Vec<String>,
    /// Cents per unit time; advisory, not consulted by any scheduling
    /// strategy.
    pub cost: i64,
    /// Last-reported utilization, refreshed on heartbeat; advisory.
    pub cpu: Option<f64>,
    pub status: NodeStatus,
    pub job_type: JobType,
    pub running_tasks: Vec<RunningTask>,
    pub came_online_ts: i64,
    pub heartbeat_ts: i64,
}

/// Which work unit a node is currently executing, so a dead node's work
/// can be requeued.
#[derive(Debug, Clone)]
pub struct RunningTask {
    pub job_id: u64,
    pub work_unit_id: u64,
    pub task_id: String,
}

impl Node {
    pub fn ident(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn free_cores(&self) -> u32 {
        self.cores.saturating_sub(self.running_tasks.len() as u32)
    }

    pub fn is_free(&self) -> bool {
        self.status == NodeStatus::Online && self.free_cores() > 0
    }

    pub fn to_view(&self) -> NodeView {
        NodeView {
            node_id: self.node_id,
            host: self.host.clone(),
            port: self.port,
            cores: self.cores,
            programs: self.programs.clone(),
            cost: self.cost,
            cpu: self.cpu,
            status: self.status,
            job_type: self.job_type,
            running_task_count: self.running_tasks.len(),
            came_online_ts: self.came_online_ts,
            heartbeat_ts: self.heartbeat_ts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub node_id: u64,
    pub host: String,
    pub port: u16,
    pub cores: u32,
    pub programs: Vec<String>,
    pub cost: i64,
    pub cpu: Option<f64>,
    pub status: NodeStatus,
    pub job_type: JobType,
    pub running_task_count: usize,
    pub came_online_ts: i64,
    pub heartbeat_ts: i64,
}

/// Owns every node and the typed queues used for load-balanced assignment.
/// Re-registration by the same `host:port` reuses the existing node id
/// instead of minting a new one.
pub struct NodeRegistry {
    nodes: HashMap<u64, Node>,
    queues: HashMap<JobType, Vec<u64>>,
    ident_to_id: HashMap<String, u64>,
    next_node_id: u64,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        let mut queues = HashMap::new();
        for jt in JobType::ALL {
            queues.insert(jt, Vec::new());
        }
        Self {
            nodes: HashMap::new(),
            queues,
            ident_to_id: HashMap::new(),
            next_node_id: 0,
        }
    }

/// Registers or re-registers a node, assigning it to the queue whose
    /// proportion is furthest below target (see [`NodeRegistry::assign_queue`]).
    pub fn add_node(
        &mut self,
        host: String,
        port: u16,
        cores: u32,
        programs: Vec<String>,
        cost: i64,
        now: i64,
    ) -> u64 {
        let ident = format!("{host}:{port}");
        if let Some(&node_id) = self.ident_to_id.get(&ident) {
            self.remove_from_queues(node_id);
            let job_type = self.assign_queue();
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.status = NodeStatus::Online;
                node.cores = cores;
                node.programs = programs;
                node.cost = cost;
                node.job_type = job_type;
                node.heartbeat_ts = now;
            }
            self.queues.get_mut(&job_type).unwrap().push(node_id);
            return node_id;
        }

        let node_id = self.next_node_id;
        self.next_node_id += 1;
        let job_type = self.assign_queue();
        self.nodes.insert(
            node_id,
            Node {
                node_id,
                host,
                port,
                cores,
                programs,
                cost,
                cpu: None,
                status: NodeStatus::Online,
                job_type,
                running_tasks: Vec::new(),
                came_online_ts: now,
                heartbeat_ts: now,
            },
        );
        self.ident_to_id.insert(ident, node_id);
        self.queues.get_mut(&job_type).unwrap().push(node_id);
        node_id
    }

    /// Picks the queue whose post-addition proportion of total nodes is
    /// furthest below its target. `total_nodes` counts the node being
    /// added, so the very first node never divides by zero.
    fn assign_queue(&self) -> JobType {
        let total_nodes = (self.nodes.len() as f64 + 1.0).max(1.0);
        JobType::ALL
            .into_iter()
            .min_by(|a, b| {
                let score = |jt: JobType| -> f64 {
                    let count = self.queues.get(&jt).map(Vec::len).unwrap_or(0) as f64;
                    let new_proportion = (count + 1.0) / total_nodes;
                    (new_proportion - jt.queue_spec().target_proportion).abs()
                };
                score(*a)
                    .partial_cmp(&score(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(JobType::Default)
    }

    fn remove_from_queues(&mut self, node_id: u64) {
        for ids in self.queues.values_mut() {
            ids.retain(|&id| id != node_id);
        }
    }

    pub fn get(&self, node_id: u64) -> Result<&Node, GridError> {
        self.nodes
            .get(&node_id)
            .ok_or_else(|| GridError::NodeNotFound(node_id.to_string()))
    }

    pub fn get_mut(&mut self, node_id: u64) -> Result<&mut Node, GridError> {
        self.nodes
            .get_mut(&node_id)
            .ok_or_else(|| GridError::NodeNotFound(node_id.to_string()))
    }

    /// Accepts either a numeric node id or a `host:port` ident, matching the
    /// dual lookup the wire protocol allows.
    pub fn resolve(&self, key: &str) -> Result<&Node, GridError> {
        if let Ok(id) = key.parse::<u64>() {
            if let Some(node) = self.nodes.get(&id) {
                return Ok(node);
            }
        }
        if let Some(&id) = self.ident_to_id.get(key) {
            return self.get(id);
        }
        Err(GridError::NodeNotFound(key.to_string()))
    }

    pub fn all(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn update_heartbeat(
        &mut self,
        node_id: u64,
        cpu: Option<f64>,
        now: i64,
    ) -> Result<(), GridError> {
        let node = self.get_mut(node_id)?;
        node.heartbeat_ts = now;
        if cpu.is_some() {
            node.cpu = cpu;
        }
        Ok(())
    }

    pub fn record_running(
        &mut self,
        node_id: u64,
        job_id: u64,
        work_unit_id: u64,
        task_id: String,
    ) -> Result<(), GridError> {
        let node = self.get_mut(node_id)?;
        node.running_tasks.push(RunningTask {
            job_id,
            work_unit_id,
            task_id,
        });
        Ok(())
    }

    pub fn remove_running(&mut self, node_id: u64, job_id: u64, work_unit_id: u64) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.running_tasks
                .retain(|t| !(t.job_id == job_id && t.work_unit_id == work_unit_id));
        }
    }

    /// Free nodes of the requested type, falling back to DEFAULT when that
    /// queue is empty.
    pub fn free_nodes(&self, job_type: JobType) -> Result<Vec<&Node>, GridError> {
        let mut queue = self.queues.get(&job_type).ok_or_else(|| {
            GridError::InvalidNodeType(format!("unknown node type: {job_type}"))
        })?;
        let default_queue;
        if queue.is_empty() && job_type != JobType::Default {
            default_queue = self.queues.get(&JobType::Default).cloned().unwrap_or_default();
            queue = &default_queue;
        }
        Ok(queue
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.is_free())
            .collect())
    }

    /// Marks heartbeat-expired nodes DEAD, evicts them from their queue, and
    /// returns the `(job_id, work_unit_id)` pairs that need requeuing.
    pub fn sweep_timed_out(&mut self, now: i64) -> Vec<(u64, u64)> {
        let expired: Vec<u64> = self
            .nodes
            .values()
            .filter(|n| {
                n.status == NodeStatus::Online && now - n.heartbeat_ts > NODE_TIMEOUT_SECS
            })
            .map(|n| n.node_id)
            .collect();

        let mut orphaned = Vec::new();
        for node_id in expired {
            self.remove_from_queues(node_id);
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.status = NodeStatus::Dead;
                for task in node.running_tasks.drain(..) {
                    orphaned.push((task.job_id, task.work_unit_id));
                }
            }
        }
        orphaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_node_does_not_divide_by_zero() {
        let mut reg = NodeRegistry::new();
        let id = reg.add_node("h1".into(), 1, 4, vec![], 0, 0);
        assert_eq!(reg.get(id).unwrap().node_id, 0);
    }

    #[test]
    fn reregistration_reuses_node_id() {
        let mut reg = NodeRegistry::new();
        let id1 = reg.add_node("h1".into(), 1000, 4, vec![], 0, 0);
        let id2 = reg.add_node("h1".into(), 1000, 8, vec!["solver".into()], 5, 10);
        assert_eq!(id1, id2);
        assert_eq!(reg.get(id1).unwrap().cores, 8);
        assert_eq!(reg.get(id1).unwrap().cost, 5);
    }

    #[test]
    fn distributes_across_queues_toward_target_proportions() {
        let mut reg = NodeRegistry::new();
        let mut counts: HashMap<JobType, u32> = HashMap::new();
        for i in 0..100 {
            let id = reg.add_node(format!("h{i}"), 1000 + i as u16, 1, vec![], 0, 0);
            let jt = reg.get(id).unwrap().job_type;
            *counts.entry(jt).or_insert(0) += 1;
        }
        // Roughly tracks 50/30/20 — allow generous slack since the
        // algorithm is greedy, not exact.
        assert!(*counts.get(&JobType::Default).unwrap_or(&0) > 30);
        assert!(*counts.get(&JobType::Batch).unwrap_or(&0) > 10);
        assert!(*counts.get(&JobType::Fast).unwrap_or(&0) > 5);
    }

    #[test]
    fn resolve_accepts_numeric_id_or_ident() {
        let mut reg = NodeRegistry::new();
        let id = reg.add_node("host".into(), 9, 1, vec![], 0, 0);
        assert_eq!(reg.resolve(&id.to_string()).unwrap().node_id, id);
        assert_eq!(reg.resolve("host:9").unwrap().node_id, id);
    }

    #[test]
    fn sweep_marks_dead_and_returns_orphaned_work() {
        let mut reg = NodeRegistry::new();
        let id = reg.add_node("h".into(), 1, 1, vec![], 0, 0);
        reg.record_running(id, 7, 0, "t1".into()).unwrap();
        let orphaned = reg.sweep_timed_out(NODE_TIMEOUT_SECS + 1);
        assert_eq!(orphaned, vec![(7, 0)]);
        assert_eq!(reg.get(id).unwrap().status, NodeStatus::Dead);
    }

    #[test]
    fn sweep_is_noop_within_timeout() {
        let mut reg = NodeRegistry::new();
        let id = reg.add_node("h".into(), 1, 1, vec![], 0, 0);
        let orphaned = reg.sweep_timed_out(NODE_TIMEOUT_SECS - 1);
        assert!(orphaned.is_empty());
        assert_eq!(reg.get(id).unwrap().status, NodeStatus::Online);
    }

    #[test]
    fn heartbeat_updates_cpu_only_when_provided() {
        let mut reg = NodeRegistry::new();
        let id = reg.add_node("h".into(), 1, 1, vec![], 0, 0);
        reg.update_heartbeat(id, Some(0.75), 5).unwrap();
        assert_eq!(reg.get(id).unwrap().cpu, Some(0.75));
        reg.update_heartbeat(id, None, 6).unwrap();
        assert_eq!(reg.get(id).unwrap().cpu, Some(0.75));
        assert_eq!(reg.get(id).unwrap().heartbeat_ts, 6);
    }
}
