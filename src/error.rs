use std::path::Path;

use serde::Serialize;

/// Errors surfaced by tool calls.
///
/// Every variant is reported to the caller as a `success: false` envelope;
/// none of them terminates the server.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Missing or malformed tool arguments
    #[error("Invalid arguments: {0}")]
    Argument(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// Unsupported extension, or a file that is not a valid container for its format
    #[error("{0}")]
    Format(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stable, serializable name of a [`BridgeError`] class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ArgumentError,
    NotFound,
    FormatError,
    UnknownTool,
    IoError,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Argument(_) => ErrorKind::ArgumentError,
            BridgeError::NotFound(_) => ErrorKind::NotFound,
            BridgeError::Format(_) => ErrorKind::FormatError,
            BridgeError::UnknownTool(_) => ErrorKind::UnknownTool,
            BridgeError::Io { .. } => ErrorKind::IoError,
        }
    }

    /// Flatten an `anyhow` context chain into a format error.
    pub fn format(err: anyhow::Error) -> Self {
        BridgeError::Format(format!("{:#}", err))
    }

    /// Wrap an I/O failure on `path`; a vanished file becomes [`BridgeError::NotFound`]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return BridgeError::NotFound(path.display().to_string());
        }
        BridgeError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
