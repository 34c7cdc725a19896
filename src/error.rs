use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Store document corrupted: {0}")]
    Corruption(String),

    #[error("Write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out acquiring lock {path} after {waited_ms}ms")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Invalid status transition: {from} -> {to} (allowed: {allowed})")]
    InvalidTransition {
        from: String,
        to: String,
        allowed: String,
    },

    #[error("Store not initialized. Run 'taskwarden init' first.")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WardenError {
    /// Whether the caller may retry the failed operation as-is.
    /// Write and lock-timeout failures are transient; corruption and
    /// lookup failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::LockTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
