//! Selecting an encryptor from key hints

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cipher::KeyHints;
use crate::encryptor::{AesGcmEncryptor, NoOpEncryptor, TextEncryptor};
use crate::{Error, Result};

/// Hint naming a configured key.
pub const KEY_HINT: &str = "key";
/// Hint carrying an ad-hoc passphrase.
pub const SECRET_HINT: &str = "secret";
/// Default hint carrying the application name.
pub const NAME_HINT: &str = "name";
/// Default hint carrying the comma-joined profiles.
pub const PROFILES_HINT: &str = "profiles";

/// Chooses the encryptor for a set of key hints.
pub trait EncryptorLocator: Send + Sync + fmt::Debug {
    fn locate(&self, hints: &KeyHints) -> Result<Arc<dyn TextEncryptor>>;
}

/// Named AES-GCM keys plus an optional default.
///
/// Selection, first match wins:
///
/// 1. a `secret` hint builds an ad-hoc encryptor from that passphrase
/// 2. a `key` hint picks that named key, failing when it is unknown
/// 3. the default key
#[derive(Debug, Clone, Default)]
pub struct KeyChain {
    salt: String,
    default: Option<Arc<dyn TextEncryptor>>,
    named: HashMap<String, Arc<dyn TextEncryptor>>,
}

impl KeyChain {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            ..Self::default()
        }
    }

    /// Use `secret` as the default key.
    pub fn with_default_secret(mut self, secret: &str) -> Self {
        self.default = Some(Arc::new(AesGcmEncryptor::new(secret, &self.salt)));
        self
    }

    /// Register a named key selectable with `{key:name}`.
    pub fn with_named_secret(mut self, name: impl Into<String>, secret: &str) -> Self {
        self.named
            .insert(name.into(), Arc::new(AesGcmEncryptor::new(secret, &self.salt)));
        self
    }

    /// Use an arbitrary encryptor as the default.
    pub fn with_default_encryptor(mut self, encryptor: Arc<dyn TextEncryptor>) -> Self {
        self.default = Some(encryptor);
        self
    }

    /// A key chain whose only encryptor passes text through.
    pub fn noop() -> Self {
        Self::default().with_default_encryptor(Arc::new(NoOpEncryptor))
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.named.is_empty()
    }
}

impl EncryptorLocator for KeyChain {
    fn locate(&self, hints: &KeyHints) -> Result<Arc<dyn TextEncryptor>> {
        if let Some(secret) = hints.get(SECRET_HINT).filter(|s| !s.is_empty()) {
            return Ok(Arc::new(AesGcmEncryptor::new(secret, &self.salt)));
        }
        if let Some(name) = hints.get(KEY_HINT).filter(|s| !s.is_empty()) {
            return self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| Error::KeyNotAvailable { name: name.clone() });
        }
        self.default.clone().ok_or(Error::KeyNotInstalled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(pairs: &[(&str, &str)]) -> KeyHints {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_key_serves_empty_hints() {
        let chain = KeyChain::new("salt").with_default_secret("default");
        let encryptor = chain.locate(&KeyHints::new()).unwrap();
        let cipher = encryptor.encrypt("x").unwrap();
        assert_eq!(AesGcmEncryptor::new("default", "salt").decrypt(&cipher).unwrap(), "x");
    }

    #[test]
    fn key_hint_selects_named_key() {
        let chain = KeyChain::new("salt")
            .with_default_secret("default")
            .with_named_secret("prod", "prod-secret");
        let cipher = chain.locate(&hints(&[("key", "prod")])).unwrap().encrypt("x").unwrap();

        assert_eq!(AesGcmEncryptor::new("prod-secret", "salt").decrypt(&cipher).unwrap(), "x");
        assert!(AesGcmEncryptor::new("default", "salt").decrypt(&cipher).is_err());
    }

    #[test]
    fn unknown_key_is_unavailable() {
        let chain = KeyChain::new("salt").with_default_secret("default");
        let err = chain.locate(&hints(&[("key", "missing")])).unwrap_err();
        assert!(matches!(err, Error::KeyNotAvailable { ref name } if name == "missing"));
    }

    #[test]
    fn secret_hint_builds_ad_hoc_key() {
        let chain = KeyChain::new("salt");
        let cipher = chain
            .locate(&hints(&[("secret", "adhoc")]))
            .unwrap()
            .encrypt("x")
            .unwrap();
        assert_eq!(AesGcmEncryptor::new("adhoc", "salt").decrypt(&cipher).unwrap(), "x");
    }

    #[test]
    fn empty_chain_has_no_key() {
        let chain = KeyChain::new("salt");
        assert!(chain.is_empty());
        assert!(matches!(chain.locate(&KeyHints::new()), Err(Error::KeyNotInstalled)));
    }

    #[test]
    fn name_and_profile_hints_do_not_affect_default_selection() {
        let chain = KeyChain::noop();
        let encryptor = chain.locate(&hints(&[("name", "foo"), ("profiles", "dev")])).unwrap();
        assert!(encryptor.is_noop());
    }
}
