//! Error types for nirvana-assets.
//!
//! Library crates use [`AssetsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all nirvana-assets operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a model or metadata download.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing output, empty download, bad handle, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An external program (git, jupyter, pip) failed to start or exited non-zero.
    #[error("{tool} failed (exit status {status}): {message}")]
    ExternalTool {
        tool: String,
        status: i32,
        message: String,
    },

    /// Model archive could not be unpacked.
    #[error("archive error: {0}")]
    Archive(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AssetsError>;

impl AssetsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Report an external tool failure. `status` is -1 when the process never ran.
    pub fn tool(tool: impl Into<String>, status: i32, msg: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            status,
            message: msg.into(),
        }
    }
}
