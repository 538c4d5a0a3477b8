//! Error handling for the axum server.
//! Maps `GridError` to HTTP status codes and JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grid_core::GridError;
use serde_json::json;

/// Wrapper to convert `GridError` into an axum response.
pub struct AppError(GridError);

impl From<GridError> for AppError {
    fn from(e: GridError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "error_msg": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
