//! `GET /log` — last 100 scheduler activity lines.

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use grid_core::GridService;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub id: usize,
    pub message: String,
}

pub async fn log_tail(Extension(service): Extension<Arc<dyn GridService>>) -> Json<Vec<LogEntry>> {
    let entries = service
        .log_tail()
        .await
        .into_iter()
        .map(|(id, message)| LogEntry { id, message })
        .collect();
    Json(entries)
}
