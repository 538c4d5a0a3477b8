//! `PUT /scheduler` (admin) — switch the active scheduling strategy.
//! `GET /scheduler` — current strategy and the full valid list.

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use grid_core::GridService;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct SchedulerInfo {
    pub scheduler: String,
    pub available: Vec<String>,
}

pub async fn get_scheduler(Extension(service): Extension<Arc<dyn GridService>>) -> Json<SchedulerInfo> {
    let current = service.scheduler_name().await;
    let available = service
        .available_schedulers()
        .await
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    Json(SchedulerInfo {
        scheduler: current.to_string(),
        available,
    })
}

#[derive(Debug, Deserialize)]
pub struct SetSchedulerRequest {
    pub scheduler: String,
}

pub async fn set_scheduler(
    Extension(service): Extension<Arc<dyn GridService>>,
    Json(req): Json<SetSchedulerRequest>,
) -> Result<Json<SchedulerInfo>, AppError> {
    let current = service.set_scheduler(&req.scheduler).await?;
    let available = service
        .available_schedulers()
        .await
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    Ok(Json(SchedulerInfo {
        scheduler: current.to_string(),
        available,
    }))
}
