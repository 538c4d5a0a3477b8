pub mod auth;
pub mod background;
pub mod error;
pub mod handlers;
pub mod router;

use std::path::PathBuf;

/// Filesystem root the file-upload/download handlers read and write under.
#[derive(Debug, Clone)]
pub struct GridStorage {
    pub root: PathBuf,
}
