//! Error types for config-git

use std::time::Duration;

/// Result type for config-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while materializing a configuration repository
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network, authentication or host key failure talking to the remote.
    #[error("Repository {uri} unavailable: {message}")]
    RepositoryUnavailable { uri: String, message: String },

    /// The configured location does not point at a usable repository.
    #[error("No such repository {uri}: {message}")]
    NoSuchRepository { uri: String, message: String },

    #[error("No such label: {label}")]
    NoSuchLabel { label: String },

    #[error("Operation on {uri} timed out after {after:?}")]
    Timeout { uri: String, after: Duration },

    #[error("Merge of '{branch}' resulted in conflicts")]
    MergeConflict { branch: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] config_fs::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Only transport-level failures qualify; a missing repository or label
    /// will not appear by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RepositoryUnavailable { .. } | Error::Timeout { .. }
        )
    }

    /// Whether this error should be rendered as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoSuchLabel { .. })
    }
}
