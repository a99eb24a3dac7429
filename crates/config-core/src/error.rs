//! Error types for config-core

/// Result type for config-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or serving configuration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backend that is not fail-isolated failed during composite resolution
    #[error("Backend '{backend}' failed: {source}")]
    CompositeFailure {
        backend: String,
        #[source]
        source: Box<Error>,
    },

    /// A backend worker panicked before producing a result
    #[error("Backend '{backend}' panicked while resolving")]
    BackendPanicked { backend: String },

    /// A routing or search pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Server settings are inconsistent
    #[error("Invalid settings: {message}")]
    Settings { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from config-fs
    #[error(transparent)]
    Fs(#[from] config_fs::Error),

    /// Repository error from config-git
    #[error(transparent)]
    Git(#[from] config_git::Error),

    /// Assembly or rendering error from config-env
    #[error(transparent)]
    Env(#[from] config_env::Error),

    /// Encryption error from config-crypto
    #[error(transparent)]
    Crypto(#[from] config_crypto::Error),
}

impl Error {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::CompositeFailure { source, .. } => source.is_retryable(),
            Error::Git(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the error should be reported as "not found".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::CompositeFailure { source, .. } => source.is_not_found(),
            Error::Git(e) => e.is_not_found(),
            Error::Env(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn settings(message: impl Into<String>) -> Self {
        Error::Settings {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_failure_delegates_classification() {
        let timeout = Error::Git(config_git::Error::Timeout {
            uri: "https://example.com/repo.git".into(),
            after: std::time::Duration::from_secs(5),
        });
        let wrapped = Error::CompositeFailure {
            backend: "git".into(),
            source: Box::new(timeout),
        };
        assert!(wrapped.is_retryable());
        assert!(!wrapped.is_not_found());
        assert!(wrapped.to_string().contains("git"));
    }

    #[test]
    fn missing_label_is_not_found() {
        let err = Error::Git(config_git::Error::NoSuchLabel {
            label: "nope".into(),
        });
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }
}
