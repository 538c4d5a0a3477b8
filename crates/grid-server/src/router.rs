//! Router construction for the grid coordinator server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post, put},
    Extension, Router,
};
use grid_core::GridService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{basic_auth, require_admin, require_client_or_admin, require_node_or_admin, AuthConfig};
use crate::handlers;
use crate::GridStorage;

pub fn build_router(service: Arc<dyn GridService>, auth_config: AuthConfig, storage: GridStorage) -> Router {
    let admin_only = Router::new()
        .route(
            "/scheduler",
            put(handlers::scheduler::set_scheduler).get(handlers::scheduler::get_scheduler),
        )
        .layer(axum_mw::from_fn(require_admin));

    let client_or_admin = Router::new()
        .route(
            "/jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::create_job),
        )
        .route(
            "/jobs/:id",
            get(handlers::jobs::get_job).delete(handlers::jobs::kill_job),
        )
        .route("/jobs/:id/status", put(handlers::jobs::update_job_status))
        .route("/jobs/:id/output", get(handlers::jobs::output_files))
        .route(
            "/jobs/:id/files/:file_name",
            put(handlers::files::upload_input_file),
        )
        .route(
            "/jobs/:id/executable/:file_name",
            put(handlers::files::upload_executable),
        )
        .route(
            "/jobs/:id/output/:file_name",
            get(handlers::files::download_output_file),
        )
        .layer(axum_mw::from_fn(require_client_or_admin));

    let node_or_admin = Router::new()
        .route("/nodes", post(handlers::nodes::register_node).get(handlers::nodes::list_nodes))
        .route("/nodes/:id", get(handlers::nodes::get_node))
        .route("/nodes/:id/heartbeat", post(handlers::nodes::heartbeat))
        .route(
            "/jobs/:id/workunit",
            post(handlers::jobs::finish_work_unit),
        )
        .route(
            "/jobs/:id/:kind/:file_name",
            get(handlers::files::download_job_asset),
        )
        .layer(axum_mw::from_fn(require_node_or_admin));

    // `/log` is client-only per the route table; nodes have no business
    // reading scheduler activity, so it gets its own role gate rather than
    // riding on the node-readable `authenticated` merge below.
    let log_route = Router::new()
        .route("/log", get(handlers::log::log_tail))
        .layer(axum_mw::from_fn(require_client_or_admin));

    let authenticated = admin_only
        .merge(client_or_admin)
        .merge(node_or_admin)
        .merge(log_route)
        .layer(axum_mw::from_fn(basic_auth))
        .layer(Extension(auth_config));

    let public = Router::new().route("/healthz", get(handlers::health::healthz));

    public
        .merge(authenticated)
        .layer(Extension(service))
        .layer(Extension(storage))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
