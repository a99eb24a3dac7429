//! Server settings, read once at startup

use std::collections::HashSet;

use config_env::PropertyMap;
use config_fs::{ConfigStore, GlobPattern, NormalizedPath};
use config_git::RepositorySettings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::composite::BackendDescriptor;
use crate::routing::RoutePatterns;
use crate::{Error, Result};

/// Everything the server needs to know before serving its first request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub backends: Vec<BackendSettings>,

    /// Properties placed ahead of every backend's sources
    pub overrides: PropertyMap,

    pub encrypt: EncryptSettings,

    /// Abort startup when a repository configured to clone eagerly cannot
    pub fail_fast: bool,

    pub retry: RetrySettings,
}

/// One backend with its composite descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub identifier: String,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub search_patterns: Vec<String>,

    #[serde(default)]
    pub fail_isolated: bool,

    #[serde(flatten)]
    pub kind: BackendKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendKind {
    Git(GitSettings),
    Native(NativeSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSettings {
    #[serde(flatten)]
    pub repository: RepositorySettings,

    /// Directories inside the repository, may use `{application}`,
    /// `{profile}` and `{label}`; empty means the repository root
    #[serde(default)]
    pub search_paths: Vec<String>,

    /// Sub-repositories selected by `{application}/{profile}` patterns
    #[serde(default)]
    pub repos: Vec<PatternRepoSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRepoSettings {
    #[serde(default)]
    pub name: String,

    pub patterns: Vec<String>,

    #[serde(flatten)]
    pub repository: RepositorySettings,

    #[serde(default)]
    pub search_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeSettings {
    /// Directories read in order; may contain `{label}`
    pub search_locations: Vec<String>,

    pub search_paths: Vec<String>,

    pub default_label: Option<String>,
}

/// Keys used to decrypt `{cipher}` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptSettings {
    /// Default key passphrase
    pub key: Option<String>,

    pub salt: String,

    /// Named keys selectable with `{key:name}`
    pub keys: IndexMap<String, String>,

    /// Fail the whole document when one value cannot be decrypted
    pub fail_on_error: bool,
}

impl Default for EncryptSettings {
    fn default() -> Self {
        Self {
            key: None,
            salt: "deadbeef".to_string(),
            keys: IndexMap::new(),
            fail_on_error: false,
        }
    }
}

impl EncryptSettings {
    pub fn is_configured(&self) -> bool {
        self.key.as_deref().is_some_and(|k| !k.is_empty()) || !self.keys.is_empty()
    }
}

/// Retrying of retryable backend failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_interval_millis: u64,

    /// Give up once this much time has passed; 0 disables retrying
    pub max_elapsed_millis: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval_millis: 100,
            max_elapsed_millis: 0,
        }
    }
}

impl BackendSettings {
    pub fn git(uri: impl Into<String>) -> Self {
        Self::from_kind(BackendKind::Git(GitSettings {
            repository: RepositorySettings::new(uri),
            search_paths: Vec::new(),
            repos: Vec::new(),
        }))
    }

    pub fn native(search_locations: Vec<String>) -> Self {
        Self::from_kind(BackendKind::Native(NativeSettings {
            search_locations,
            ..NativeSettings::default()
        }))
    }

    fn from_kind(kind: BackendKind) -> Self {
        Self {
            identifier: String::new(),
            priority: 0,
            search_patterns: Vec::new(),
            fail_isolated: false,
            kind,
        }
    }

    /// Identifier, falling back to the repository URI or the backend kind.
    pub fn identifier(&self) -> String {
        if !self.identifier.is_empty() {
            return self.identifier.clone();
        }
        match &self.kind {
            BackendKind::Git(git) => git.repository.uri.clone(),
            BackendKind::Native(_) => "native".to_string(),
        }
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            identifier: self.identifier(),
            priority: self.priority,
            search_patterns: self.search_patterns.clone(),
            fail_isolated: self.fail_isolated,
        }
    }
}

impl ServerSettings {
    /// Load settings from a TOML, JSON or YAML file and validate them.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        let settings: Self = ConfigStore::new().load(path)?;
        settings.validate()?;
        tracing::debug!(
            path = %path.as_str(),
            backends = settings.backends.len(),
            "Loaded server settings"
        );
        Ok(settings)
    }

    /// Reject settings the server could not serve from.
    pub fn validate(&self) -> Result<()> {
        let mut identifiers = HashSet::new();
        for backend in &self.backends {
            let identifier = backend.identifier();
            if !identifiers.insert(identifier.clone()) {
                return Err(Error::settings(format!("duplicate backend identifier '{identifier}'")));
            }
            RoutePatterns::new(&backend.search_patterns)?;

            match &backend.kind {
                BackendKind::Git(git) => {
                    require_uri(&git.repository, &identifier)?;
                    for repo in &git.repos {
                        require_uri(&repo.repository, &identifier)?;
                        if repo.patterns.is_empty() {
                            return Err(Error::settings(format!(
                                "repository '{}' in backend '{identifier}' has no patterns",
                                repo.repository.uri
                            )));
                        }
                        RoutePatterns::new(&repo.patterns)?;
                    }
                    for credential in git
                        .repository
                        .credentials
                        .iter()
                        .chain(git.repos.iter().flat_map(|r| &r.repository.credentials))
                    {
                        GlobPattern::new(&credential.host_pattern).map_err(|e| {
                            Error::InvalidPattern {
                                pattern: credential.host_pattern.clone(),
                                message: e.to_string(),
                            }
                        })?;
                    }
                }
                BackendKind::Native(native) => {
                    if native.search_locations.iter().all(|l| l.trim().is_empty()) {
                        return Err(Error::settings(format!(
                            "native backend '{identifier}' has no search locations"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn require_uri(repository: &RepositorySettings, backend: &str) -> Result<()> {
    if repository.uri.trim().is_empty() {
        return Err(Error::settings(format!("backend '{backend}' has a repository without a uri")));
    }
    Ok(())
}
