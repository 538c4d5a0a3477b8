//! Upload/download of a job's input files, executable, and output files.
//! Every path is built from a sanitized filename so a client cannot escape
//! its job's directory.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use grid_core::{executable_path, input_path, output_path, sanitize_file_name, GridService};

use crate::error::AppError;
use crate::GridStorage;

pub async fn upload_input_file(
    Extension(service): Extension<Arc<dyn GridService>>,
    Extension(storage): Extension<GridStorage>,
    Path((job_id, file_name)): Path<(u64, String)>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = input_path(&storage.root, job_id, &file_name);
    write_file(&path, &body).await?;
    let clean_name = sanitize_file_name(&file_name);
    service
        .add_file(job_id, clean_name, Utc::now().timestamp())
        .await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn upload_executable(
    Extension(service): Extension<Arc<dyn GridService>>,
    Extension(storage): Extension<GridStorage>,
    Path((job_id, file_name)): Path<(u64, String)>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = executable_path(&storage.root, job_id, &file_name);
    write_file(&path, &body).await?;
    let clean_name = sanitize_file_name(&file_name);
    service.add_executable(job_id, clean_name).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn download_output_file(
    Extension(storage): Extension<GridStorage>,
    Path((job_id, file_name)): Path<(u64, String)>,
) -> Result<impl IntoResponse, AppError> {
    let path = output_path(&storage.root, job_id, &file_name);
    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        grid_core::GridError::JobNotFound(format!(
            "no output file {file_name} for job {job_id}"
        ))
    })?;
    Ok((StatusCode::OK, bytes))
}

/// `GET /jobs/:id/:kind/:file_name`, node role — fetches an input file, the
/// job's executable, or an output file so a node can pull down what it
/// needs to run. `kind` is `files`, `executable`, or `output`.
pub async fn download_job_asset(
    Extension(storage): Extension<GridStorage>,
    Path((job_id, kind, file_name)): Path<(u64, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let path = match kind.as_str() {
        "files" => input_path(&storage.root, job_id, &file_name),
        "executable" => executable_path(&storage.root, job_id, &file_name),
        "output" => output_path(&storage.root, job_id, &file_name),
        _ => {
            return Err(grid_core::GridError::JobNotFound(format!(
                "no such asset kind: {kind}"
            ))
            .into())
        }
    };
    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        grid_core::GridError::JobNotFound(format!(
            "no {kind} file {file_name} for job {job_id}"
        ))
    })?;
    Ok((StatusCode::OK, bytes))
}

async fn write_file(path: &std::path::Path, body: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            grid_core::GridError::InvalidTransition(format!("failed to create {parent:?}: {e}"))
        })?;
    }
    tokio::fs::write(path, body).await.map_err(|e| {
        grid_core::GridError::InvalidTransition(format!("failed to write {path:?}: {e}")).into()
    })
}
