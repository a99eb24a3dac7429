//! Credential selection for remote operations
//!
//! Each repository carries an ordered list of rules. The first rule whose host
//! glob matches the URI host supplies the credentials for one fetch or clone;
//! the callbacks holding them are built per operation and dropped afterwards,
//! so nothing is shared between concurrent operations on different URIs.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use config_fs::GlobPattern;
use git2::{Cred, CredentialType};

use crate::settings::{CredentialKind, CredentialSettings};
use crate::{Error, Result};

/// Exchanges provider-side identity for a short-lived git token.
///
/// Implemented by cloud integrations (for example a CodeCommit or Azure
/// token broker). Called once per remote operation.
pub trait TokenProvider: Send + Sync {
    /// Return `(username, token)` for the given remote URL.
    fn token(&self, url: &str) -> std::result::Result<(String, String), String>;
}

/// Credential material for one remote operation.
#[derive(Clone)]
pub enum CredentialStrategy {
    UserPassword {
        username: String,
        password: String,
    },
    SshKey {
        username: Option<String>,
        private_key: Option<String>,
        private_key_path: Option<PathBuf>,
        passphrase: Option<String>,
    },
    SshAgent {
        username: Option<String>,
    },
    TokenExchange(Arc<dyn TokenProvider>),
}

impl fmt::Debug for CredentialStrategy {
    // Secrets never reach logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPassword { username, .. } => f
                .debug_struct("UserPassword")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::SshKey { username, .. } => f
                .debug_struct("SshKey")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::SshAgent { username } => f
                .debug_struct("SshAgent")
                .field("username", username)
                .finish(),
            Self::TokenExchange(_) => f.write_str("TokenExchange"),
        }
    }
}

impl From<&CredentialKind> for CredentialStrategy {
    fn from(kind: &CredentialKind) -> Self {
        match kind {
            CredentialKind::UserPassword { username, password } => Self::UserPassword {
                username: username.clone(),
                password: password.clone(),
            },
            CredentialKind::SshKey {
                username,
                private_key,
                private_key_path,
                passphrase,
            } => Self::SshKey {
                username: username.clone(),
                private_key: private_key.clone(),
                private_key_path: private_key_path.clone(),
                passphrase: passphrase.clone(),
            },
            CredentialKind::SshAgent { username } => Self::SshAgent {
                username: username.clone(),
            },
            CredentialKind::Token { username, token } => Self::UserPassword {
                username: username.clone().unwrap_or_else(|| "x-token".to_string()),
                password: token.clone(),
            },
        }
    }
}

impl CredentialStrategy {
    /// Produce a git2 credential for the allowed types offered by the server.
    pub(crate) fn credential(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> std::result::Result<Cred, git2::Error> {
        let ssh_user = |configured: &Option<String>| {
            configured
                .clone()
                .or_else(|| username_from_url.map(str::to_string))
                .unwrap_or_else(|| "git".to_string())
        };

        match self {
            Self::UserPassword { username, password }
                if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
            {
                Cred::userpass_plaintext(username, password)
            }
            Self::SshKey {
                username,
                private_key,
                private_key_path,
                passphrase,
            } if allowed.contains(CredentialType::SSH_KEY)
                || allowed.contains(CredentialType::SSH_MEMORY) =>
            {
                let user = ssh_user(username);
                match (private_key, private_key_path) {
                    (Some(pem), _) => {
                        Cred::ssh_key_from_memory(&user, None, pem, passphrase.as_deref())
                    }
                    (None, Some(path)) => Cred::ssh_key(&user, None, path, passphrase.as_deref()),
                    (None, None) => Err(git2::Error::from_str(
                        "ssh key credentials configured without key material",
                    )),
                }
            }
            Self::SshAgent { username } if allowed.contains(CredentialType::SSH_KEY) => {
                Cred::ssh_key_from_agent(&ssh_user(username))
            }
            Self::TokenExchange(provider)
                if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
            {
                let (username, token) = provider.token(url).map_err(|message| {
                    git2::Error::from_str(&format!("token exchange failed: {message}"))
                })?;
                Cred::userpass_plaintext(&username, &token)
            }
            _ if allowed.contains(CredentialType::USERNAME) => {
                Cred::username(username_from_url.unwrap_or("git"))
            }
            other => Err(git2::Error::from_str(&format!(
                "configured credentials {other:?} do not satisfy server request {allowed:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
struct CredentialRule {
    host: GlobPattern,
    strategy: CredentialStrategy,
}

/// Ordered host-glob to credential mapping.
#[derive(Debug, Clone, Default)]
pub struct CredentialSelector {
    rules: Vec<CredentialRule>,
}

impl CredentialSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the selector from load-time settings.
    pub fn from_settings(settings: &[CredentialSettings]) -> Result<Self> {
        let mut selector = Self::new();
        for entry in settings {
            selector = selector.with_rule(&entry.host_pattern, (&entry.kind).into())?;
        }
        Ok(selector)
    }

    /// Append a rule; rules are consulted in insertion order.
    pub fn with_rule(mut self, host_pattern: &str, strategy: CredentialStrategy) -> Result<Self> {
        let host = GlobPattern::new(host_pattern).map_err(Error::Fs)?;
        self.rules.push(CredentialRule { host, strategy });
        Ok(self)
    }

    /// Pick the strategy for `uri`, if any rule matches its host.
    pub fn select(&self, uri: &str) -> Option<&CredentialStrategy> {
        let host = uri_host(uri).unwrap_or_default();
        self.rules
            .iter()
            .find(|rule| rule.host.matches(&host))
            .map(|rule| &rule.strategy)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Extract the host from the URI forms git accepts.
///
/// Local paths and `file://` URIs have no host and yield `None`.
pub fn uri_host(uri: &str) -> Option<String> {
    if let Some((scheme, rest)) = uri.split_once("://") {
        if scheme.eq_ignore_ascii_case("file") {
            return None;
        }
        let authority = rest.split('/').next().unwrap_or(rest);
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        let host = host_port.split(':').next().unwrap_or(host_port);
        return (!host.is_empty()).then(|| host.to_ascii_lowercase());
    }

    // scp-like syntax: [user@]host:path
    let (authority, _) = uri.split_once(':')?;
    if authority.contains('/') || authority.len() == 1 {
        // a Windows drive letter or a relative path, not a host
        return None;
    }
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_from_https_uri() {
        assert_eq!(
            uri_host("https://user:pw@GitHub.com:443/acme/config.git").as_deref(),
            Some("github.com")
        );
    }

    #[test]
    fn host_from_scp_uri() {
        assert_eq!(
            uri_host("git@gitlab.example.com:acme/config.git").as_deref(),
            Some("gitlab.example.com")
        );
    }

    #[test]
    fn local_paths_have_no_host() {
        assert_eq!(uri_host("/srv/config"), None);
        assert_eq!(uri_host("file:///srv/config"), None);
        assert_eq!(uri_host("C:/config"), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        let selector = CredentialSelector::new()
            .with_rule(
                "*.github.com",
                CredentialStrategy::SshAgent {
                    username: Some("first".into()),
                },
            )
            .unwrap()
            .with_rule(
                "*",
                CredentialStrategy::UserPassword {
                    username: "fallback".into(),
                    password: "pw".into(),
                },
            )
            .unwrap();

        match selector.select("ssh://git@ssh.github.com/acme/cfg.git") {
            Some(CredentialStrategy::SshAgent { username }) => {
                assert_eq!(username.as_deref(), Some("first"))
            }
            other => panic!("unexpected strategy {other:?}"),
        }
        match selector.select("https://gitlab.com/acme/cfg.git") {
            Some(CredentialStrategy::UserPassword { username, .. }) => {
                assert_eq!(username, "fallback")
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn debug_output_hides_password() {
        let strategy = CredentialStrategy::UserPassword {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{strategy:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
