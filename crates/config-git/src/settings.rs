//! Load-time settings for one git-backed configuration repository

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a single remote configuration repository.
///
/// Immutable after startup; the owning [`crate::VersionedSourceRepository`]
/// copies what it needs at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySettings {
    /// Remote URI (`https://`, `ssh://`, scp-style `git@host:path`, or a local path)
    pub uri: String,

    /// Directory holding local mirrors; a per-URI subdirectory is derived from it.
    /// Defaults to the user cache directory.
    pub base_dir: Option<PathBuf>,

    /// Label served when a request does not name one
    pub default_label: String,

    /// Discard local modifications and hard-reset to the remote on refresh
    pub force_pull: bool,

    /// Delete local branches whose remote counterpart disappeared
    pub delete_untracked_branches: bool,

    /// Clone eagerly at startup instead of on the first request
    pub clone_on_start: bool,

    /// Minimum seconds between two fetches; 0 fetches on every request
    pub refresh_rate_secs: u64,

    /// Upper bound in seconds for each network operation
    pub timeout_secs: u64,

    /// Reject SSH host keys whose fingerprint is not listed in `known_host_fingerprints`
    pub strict_host_key_checking: bool,

    /// Accepted SHA-256 host key fingerprints, hex encoded
    pub known_host_fingerprints: Vec<String>,

    /// Credential rules, tried in order against the URI host
    pub credentials: Vec<CredentialSettings>,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            uri: String::new(),
            base_dir: None,
            default_label: "main".to_string(),
            force_pull: false,
            delete_untracked_branches: false,
            clone_on_start: false,
            refresh_rate_secs: 0,
            timeout_secs: 5,
            strict_host_key_checking: false,
            known_host_fingerprints: Vec::new(),
            credentials: Vec::new(),
        }
    }
}

impl RepositorySettings {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn refresh_rate(&self) -> Duration {
        Duration::from_secs(self.refresh_rate_secs)
    }
}

/// One credential rule: a host glob plus the material to present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSettings {
    /// Glob matched against the host of the repository URI (`*` matches all)
    #[serde(default = "match_all")]
    pub host_pattern: String,

    #[serde(flatten)]
    pub kind: CredentialKind,
}

fn match_all() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialKind {
    UserPassword {
        username: String,
        password: String,
    },
    SshKey {
        #[serde(default)]
        username: Option<String>,
        /// PEM encoded private key
        #[serde(default)]
        private_key: Option<String>,
        #[serde(default)]
        private_key_path: Option<PathBuf>,
        #[serde(default)]
        passphrase: Option<String>,
    },
    SshAgent {
        #[serde(default)]
        username: Option<String>,
    },
    /// A pre-issued access token presented as a password
    Token {
        #[serde(default)]
        username: Option<String>,
        token: String,
    },
}
