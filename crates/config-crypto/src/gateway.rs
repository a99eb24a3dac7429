//! Decrypting documents and serving single-value encrypt/decrypt requests

use std::sync::Arc;

use config_env::{Environment, PropertyMap, PropertySource};

use crate::cipher::{CIPHER_MARKER, CipherValue, KeyHints, format_hints, is_encrypted, split_hints};
use crate::encryptor::TextEncryptor;
use crate::form::strip_form_data;
use crate::locator::{EncryptorLocator, NAME_HINT, PROFILES_HINT};
use crate::{Error, Result};

/// Prefix added to the key of a value that failed to decrypt.
pub const INVALID_PREFIX: &str = "invalid.";

/// Value substituted for one that failed to decrypt.
pub const NOT_AVAILABLE: &str = "<n/a>";

/// One encrypt or decrypt call as received from a client.
#[derive(Debug, Clone, Copy, Default)]
pub struct CipherRequest<'a> {
    /// Verb the request arrived with; read-only verbs may not decrypt
    pub method: &'a str,
    pub text: &'a str,
    pub content_type: Option<&'a str>,
    pub application: Option<&'a str>,
    pub profiles: Option<&'a str>,
}

/// Rewrites cipher-tagged values using encryptors chosen per value.
#[derive(Debug, Clone, Default)]
pub struct EncryptionGateway {
    locator: Option<Arc<dyn EncryptorLocator>>,
    fail_on_error: bool,
}

impl EncryptionGateway {
    /// A gateway with no encryptor; decryption of tagged values is refused.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(locator: Arc<dyn EncryptorLocator>) -> Self {
        Self {
            locator: Some(locator),
            fail_on_error: false,
        }
    }

    /// Abort the whole document instead of marking undecryptable values.
    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    /// Whether encryption is usable with default hints.
    pub fn status(&self) -> Result<()> {
        self.encryptor(&KeyHints::new()).map(|_| ())
    }

    /// Replace every tagged value in `env` with its plaintext.
    ///
    /// Values that fail to decrypt (wrong key, corrupt cipher text, unknown
    /// key name) become `invalid.<key>` = `<n/a>` and the rest of the document
    /// is still decrypted. A missing or pass-through encryptor fails the
    /// whole request. Documents without tagged values pass through untouched.
    pub fn decrypt(&self, mut env: Environment) -> Result<Environment> {
        let has_cipher = env
            .property_sources
            .iter()
            .flat_map(|ps| ps.source.iter())
            .any(|(key, value)| is_encrypted(key) || is_encrypted(value));
        if !has_cipher {
            return Ok(env);
        }

        let defaults = default_hints(Some(&env.name), Some(&env.profiles.join(",")));
        for source in &mut env.property_sources {
            let values = std::mem::take(&mut source.source);
            source.source = self.decrypt_source(&source.name, values, &defaults)?;
        }
        Ok(env)
    }

    fn decrypt_source(
        &self,
        source_name: &str,
        values: PropertyMap,
        defaults: &KeyHints,
    ) -> Result<PropertyMap> {
        let mut out = PropertyMap::with_capacity(values.len());
        for (key, value) in values {
            let (key, cipher) = match key.strip_prefix(CIPHER_MARKER) {
                Some(stripped) => (stripped.to_string(), Some(value.as_str())),
                None => {
                    let cipher = value.strip_prefix(CIPHER_MARKER);
                    (key, cipher)
                }
            };
            let Some(cipher) = cipher else {
                out.insert(key, value);
                continue;
            };

            match self.decrypt_tagged(cipher, defaults) {
                Ok(plain) => {
                    out.insert(key, plain);
                }
                Err(e) if e.is_value_scoped() && !self.fail_on_error => {
                    tracing::warn!(
                        source = %source_name,
                        key = %key,
                        error = %e,
                        "Cannot decrypt value; marking it invalid"
                    );
                    out.insert(format!("{INVALID_PREFIX}{key}"), NOT_AVAILABLE.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Decrypt cipher text with its tag already removed; inline hints win.
    fn decrypt_tagged(&self, body: &str, defaults: &KeyHints) -> Result<String> {
        let (inline, ciphertext) = split_hints(body);
        let hints = merge_hints(defaults, &inline);
        self.encryptor(&hints)?.decrypt(ciphertext)
    }

    /// Decrypt a full `{cipher}...` value.
    pub fn decrypt_value(&self, value: &str, defaults: &KeyHints) -> Result<String> {
        match CipherValue::parse(value) {
            Some(parsed) => {
                let hints = merge_hints(defaults, &parsed.hints);
                self.encryptor(&hints)?.decrypt(parsed.ciphertext)
            }
            None => Ok(value.to_string()),
        }
    }

    /// Encrypt `plaintext` with the encryptor `hints` select.
    ///
    /// Returns the bare cipher text; callers storing it prepend
    /// [`CIPHER_MARKER`] and any hint prefix themselves.
    pub fn encrypt(&self, plaintext: &str, hints: &KeyHints) -> Result<String> {
        self.encryptor(hints)?.encrypt(plaintext)
    }

    /// Handle an encrypt request body.
    ///
    /// Form residue is stripped first. A `{k:v}` prefix on the text selects
    /// the key and is repeated on the output so it can be stored verbatim
    /// after `{cipher}`.
    pub fn encrypt_text(&self, request: &CipherRequest<'_>) -> Result<String> {
        let data = strip_form_data(request.text, request.content_type, false);
        let (inline, plaintext) = split_hints(&data);
        let hints = merge_hints(&default_hints(request.application, request.profiles), &inline);
        let ciphertext = self.encrypt(plaintext, &hints)?;
        Ok(format!("{}{ciphertext}", format_hints(&inline)))
    }

    /// Handle a decrypt request body.
    pub fn decrypt_text(&self, request: &CipherRequest<'_>) -> Result<String> {
        if is_read_only(request.method) {
            return Err(Error::DecryptNotAllowed {
                method: request.method.to_ascii_uppercase(),
            });
        }
        let data = strip_form_data(request.text, request.content_type, true);
        let data = data.strip_prefix(CIPHER_MARKER).unwrap_or(&data);
        let (inline, ciphertext) = split_hints(data);
        if ciphertext.is_empty() {
            return Err(Error::InvalidCipher {
                message: "no cipher text".to_string(),
            });
        }
        let hints = merge_hints(&default_hints(request.application, request.profiles), &inline);
        self.encryptor(&hints)?.decrypt(ciphertext)
    }

    fn encryptor(&self, hints: &KeyHints) -> Result<Arc<dyn TextEncryptor>> {
        let locator = self.locator.as_ref().ok_or(Error::KeyNotInstalled)?;
        let encryptor = locator.locate(hints)?;
        if encryptor.is_noop() {
            return Err(Error::EncryptionTooWeak);
        }
        Ok(encryptor)
    }
}

/// Hints derived from the request: `name` and `profiles`.
pub fn default_hints(application: Option<&str>, profiles: Option<&str>) -> KeyHints {
    let mut hints = KeyHints::new();
    if let Some(name) = application.filter(|n| !n.is_empty()) {
        hints.insert(NAME_HINT.to_string(), name.to_string());
    }
    if let Some(profiles) = profiles.filter(|p| !p.is_empty()) {
        hints.insert(PROFILES_HINT.to_string(), profiles.to_string());
    }
    hints
}

fn merge_hints(defaults: &KeyHints, inline: &KeyHints) -> KeyHints {
    let mut merged = defaults.clone();
    for (name, value) in inline {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

fn is_read_only(method: &str) -> bool {
    ["GET", "HEAD", "OPTIONS"]
        .iter()
        .any(|verb| verb.eq_ignore_ascii_case(method))
}

/// Build a `{cipher}`-tagged property value.
pub fn tagged(ciphertext: &str, hints: &KeyHints) -> String {
    format!("{CIPHER_MARKER}{}{ciphertext}", format_hints(hints))
}

/// Property source with every value encrypted, for tests and tooling.
pub fn encrypt_source(
    gateway: &EncryptionGateway,
    name: &str,
    plain: &PropertyMap,
    hints: &KeyHints,
) -> Result<PropertySource> {
    let mut source = PropertyMap::with_capacity(plain.len());
    for (key, value) in plain {
        source.insert(key.clone(), tagged(&gateway.encrypt(value, hints)?, hints));
    }
    Ok(PropertySource::new(name, source))
}
