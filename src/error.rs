//! Error type shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no .jsonl files found in {0}")]
    EmptyInputDirectory(PathBuf),

    #[error("invalid split ratios: {0}")]
    InvalidRatios(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("logger already initialised: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
