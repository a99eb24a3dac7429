//! Error types for config-env

use std::path::PathBuf;

/// Result type for config-env operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling or rendering property sources
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No such resource: {path}")]
    NoSuchResource { path: String },

    #[error("Failed to parse {format} source at {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Index {index} in '{key}' exceeds the sequence limit of {limit}")]
    IndexTooLarge {
        key: String,
        index: usize,
        limit: usize,
    },

    #[error("Failed to render {format}: {message}")]
    Render { format: &'static str, message: String },

    #[error(transparent)]
    Fs(#[from] config_fs::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchResource { .. })
    }
}
