//! grid-server — standalone REST coordinator for the job-execution grid.
//!
//! Reads config from env vars:
//!   GRID_STORAGE_ROOT           — job file storage root (default: ./grid-data)
//!   GRID_BIND_ADDR              — listen address (default: 0.0.0.0:8080)
//!   GRID_ALLOCATOR_INTERVAL_SECS — allocation pass interval (default: 2)
//!   GRID_LIVENESS_INTERVAL_SECS  — liveness sweep interval (default: 5)
//!   GRID_ADMIN_CREDENTIALS / GRID_CLIENT_CREDENTIALS / GRID_NODE_CREDENTIALS
//!                                — "user:pass" Basic-auth credentials per role

use std::sync::Arc;

use anyhow::Context;
use grid_core::config::GridConfig;
use grid_core::{Dispatcher, GridService, GridServiceImpl, HttpDispatcher};
use grid_server::auth::AuthConfig;
use grid_server::background::{AllocatorLoop, LivenessLoop};
use grid_server::router::build_router;
use grid_server::GridStorage;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,grid_server=debug".into()),
        )
        .init();

    let config = GridConfig::from_env();

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(HttpDispatcher::new());
    let service: Arc<dyn GridService> = Arc::new(GridServiceImpl::new(dispatcher));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let allocator = AllocatorLoop::new(Arc::clone(&service), config.allocator_interval);
    let allocator_shutdown = shutdown_rx.clone();
    tokio::spawn(async move { allocator.run(allocator_shutdown).await });

    let liveness = LivenessLoop::new(Arc::clone(&service), config.liveness_interval);
    let liveness_shutdown = shutdown_rx.clone();
    tokio::spawn(async move { liveness.run(liveness_shutdown).await });

    match tokio::fs::remove_dir_all(&config.storage_root).await {
        Ok(()) => tracing::info!("wiped stale job storage at {:?}", config.storage_root),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to wipe job storage at {:?}", config.storage_root)
            })
        }
    }

    let auth_config = AuthConfig::from_env();
    let storage = GridStorage {
        root: config.storage_root.clone(),
    };

    let app = build_router(service, auth_config, storage);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("grid-server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}
