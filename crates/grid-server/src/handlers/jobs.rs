//! Job lifecycle endpoints: create, inspect, ready, kill, and output listing.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use chrono::Utc;
use grid_core::{GridService, JobView, NewJobParams, WorkUnitView};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: Option<String>,
    pub flags: String,
    pub wall_time: String,
    pub deadline: String,
    pub budget: Value,
    pub job_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: u64,
}

pub async fn list_jobs(
    Extension(service): Extension<Arc<dyn GridService>>,
) -> Json<Vec<JobView>> {
    Json(service.list_jobs().await)
}

pub async fn get_job(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, AppError> {
    Ok(Json(service.get_job(&job_id).await?))
}

pub async fn create_job(
    Extension(service): Extension<Arc<dyn GridService>>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<CreateJobResponse>, AppError> {
    let params = NewJobParams {
        name: req.name,
        flags: req.flags,
        wall_time: req.wall_time,
        deadline: req.deadline,
        budget: req.budget,
        job_type: req.job_type,
    };
    let job_id = service.add_job(params, Utc::now().timestamp()).await?;
    Ok(Json(CreateJobResponse { job_id }))
}

#[derive(Debug, Deserialize)]
pub struct ReadyJobRequest {
    pub status: String,
}

/// `PUT /jobs/:id/status` — the only accepted value is `"READY"`, matching
/// the single status transition a client is ever allowed to request.
pub async fn update_job_status(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(job_id): Path<u64>,
    Json(req): Json<ReadyJobRequest>,
) -> Result<Json<Value>, AppError> {
    if req.status.to_ascii_uppercase() != "READY" {
        return Err(grid_core::GridError::InvalidJobStatus(format!(
            "unsupported status transition: {}",
            req.status
        ))
        .into());
    }
    service.ready_job(job_id).await?;
    Ok(Json(serde_json::json!({"status": "READY"})))
}

#[derive(Debug, Deserialize, Default)]
pub struct KillJobRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KillJobResponse {
    pub info_msg: Option<String>,
}

pub async fn kill_job(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(job_id): Path<u64>,
    body: Option<Json<KillJobRequest>>,
) -> Result<Json<KillJobResponse>, AppError> {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "Killed on request by client.".to_string());
    let info_msg = service.kill_job(job_id, reason, Utc::now().timestamp()).await?;
    Ok(Json(KillJobResponse { info_msg }))
}

pub async fn output_files(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(job_id): Path<u64>,
) -> Result<Json<grid_core::OutputFilesInfo>, AppError> {
    Ok(Json(service.output_files_info(job_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct FinishWorkUnitRequest {
    pub work_unit_id: u64,
    #[serde(default)]
    pub kill_msg: Option<String>,
}

/// `POST /jobs/:id/workunit` — a node reporting completion (optionally
/// overridden to KILLED in the same report).
pub async fn finish_work_unit(
    Extension(service): Extension<Arc<dyn GridService>>,
    Path(job_id): Path<u64>,
    Json(req): Json<FinishWorkUnitRequest>,
) -> Result<Json<WorkUnitView>, AppError> {
    let unit = service
        .finish_work_unit(job_id, req.work_unit_id, req.kill_msg, Utc::now().timestamp())
        .await?;
    Ok(Json(unit))
}
