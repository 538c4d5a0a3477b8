//! Node registration, heartbeat, and listing.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use chrono::Utc;
use grid_core::{GridService, NodeView};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub host: String,
    pub port: u16,
    pub cores: u32,
    #[serde(default)]
    pub programs: Vec<String>,
    #[serde(default)]
    pub cost: i64,
}

#[derive(Debug, Serialize)]
pub struct RegisterNodeResponse {
    pub node_id: u64,
}

pub async fn register_node(
    Extension(service): Extension<Arc<dyn GridService>>,
    Json(req): Json<RegisterNodeRequest>,
) -> Json<RegisterNodeResponse> {
    let node_id = service
        .register_node(
            req.host,
            req.port,
            req.cores,
            req.programs,
            req.cost,
            Utc::now().timestamp(),
        )
        .await;
    Json(RegisterNodeResponse { node_id })
}

pub async fn list_nodes(Extension(service): Extension<Arc<dyn GridService>>) -> Json<Vec<NodeView>> {
    Json(service.list_nodes().await)
}

pub async fn get_node(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(key): Path<String>,
) -> Result<Json<NodeView>, AppError> {
    Ok(Json(service.get_node(&key).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct HeartbeatRequest {
    pub cpu: Option<f64>,
}

/// `POST /nodes/:id/heartbeat` — a node keeping itself alive, optionally
/// reporting its current utilization.
pub async fn heartbeat(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(key): Path<String>,
    body: Option<Json<HeartbeatRequest>>,
) -> Result<Json<NodeView>, AppError> {
    let cpu = body.map(|Json(b)| b.cpu).unwrap_or(None);
    service
        .heartbeat_node(&key, cpu, Utc::now().timestamp())
        .await?;
    Ok(Json(service.get_node(&key).await?))
}
