//! Error types for the mirror adapter
//!
//! One enum covers the whole crate. Remote failures carry the provider
//! message (already sanitized), local failures carry the staging path.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Remote access failed: {0}")]
    RemoteAccess(String),

    #[error("Local IO error at {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl MirrorError {
    /// Wrap an IO error with the staging path it happened on
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::LocalIo {
            path: path.into(),
            source,
        }
    }
}
