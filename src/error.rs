//! Error types for tidyup.

use std::path::PathBuf;

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("A daemon is already listening on {0}")]
    DaemonRunning(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("Not a git working tree: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("Cannot resolve document {}: {reason}", path.display())]
    DocumentResolution { path: PathBuf, reason: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn resolution(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DocumentResolution {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// JSON-RPC error codes used by the daemon.
#[derive(Debug, Clone, Copy)]
#[repr(i32)]
pub enum IpcErrorCode {
    ParseError = -32700,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}
