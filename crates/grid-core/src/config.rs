use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read once at startup from the environment —
/// there is no config file or hot-reload.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Root directory under which per-job `files/`, `executable/`, and
    /// `output/` subtrees are created.
    pub storage_root: PathBuf,
    /// How often the allocation loop wakes to match queued work against
    /// free node slots.
    pub allocator_interval: Duration,
    /// How often the liveness sweep checks for heartbeat-expired nodes.
    pub liveness_interval: Duration,
    pub bind_addr: String,
}

impl GridConfig {
    pub fn from_env() -> Self {
        Self {
            storage_root: env::var("GRID_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./grid-data")),
            allocator_interval: Duration::from_secs(
                env::var("GRID_ALLOCATOR_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2),
            ),
            liveness_interval: Duration::from_secs(
                env::var("GRID_LIVENESS_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
            bind_addr: env::var("GRID_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}
