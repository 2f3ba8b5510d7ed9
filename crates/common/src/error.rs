//! Error types shared across Podreel crates.

use std::path::PathBuf;

/// Top-level error type for Podreel operations.
#[derive(Debug, thiserror::Error)]
pub enum PodreelError {
    #[error("Render error: {message}")]
    Render { message: String },

    /// The external transcoder exited unsuccessfully.
    #[error("{stage} failed (exit status {status}): {stderr}")]
    Transcode {
        stage: String,
        status: String,
        stderr: String,
    },

    /// A primary input (speech audio, inserted video) is missing.
    #[error("Missing {kind} source: {path}")]
    MissingSource { kind: String, path: PathBuf },

    #[error("No clips to concatenate")]
    NoClips,

    #[error("Render cancelled")]
    Cancelled,

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PodreelError.
pub type PodreelResult<T> = Result<T, PodreelError>;

impl PodreelError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn transcode(
        stage: impl Into<String>,
        status: impl ToString,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Transcode {
            stage: stage.into(),
            status: status.to_string(),
            stderr: stderr.into(),
        }
    }

    pub fn missing_source(kind: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingSource {
            kind: kind.into(),
            path: path.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from a cancelled render.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
