//! Error types for the lanwatch-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("arp-scan not runnable at path: {path}")]
    ProberNotFound { path: String },

    #[error("arp-scan exited with code {code}: {stderr}")]
    ProberFailed { code: i32, stderr: String },

    #[error("Sweep of {target} exceeded {secs}s")]
    ProbeTimeout { target: String, secs: u64 },

    #[error("Store error: {0}")]
    Store(#[from] lanwatch_store::StoreError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Control protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
