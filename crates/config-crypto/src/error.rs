//! Error types for config-crypto

/// Result type for config-crypto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the encryption layer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No encryptor is configured at all.
    #[error("No key was installed for encryption service")]
    KeyNotInstalled,

    /// Only a pass-through encryptor is configured.
    #[error("The encryption algorithm is not strong enough")]
    EncryptionTooWeak,

    /// A key hint named a key that is not configured.
    #[error("No key named '{name}' is available")]
    KeyNotAvailable { name: String },

    #[error("Invalid cipher text: {message}")]
    InvalidCipher { message: String },

    #[error("Decryption failed: {message}")]
    DecryptionFailed { message: String },

    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    /// Decryption was requested through a read-only verb.
    #[error("Decryption is not allowed through {method}")]
    DecryptNotAllowed { method: String },
}

impl Error {
    /// Whether the error concerns one value rather than the whole request.
    ///
    /// Value-scoped failures are isolated when decrypting a document.
    pub fn is_value_scoped(&self) -> bool {
        matches!(
            self,
            Self::InvalidCipher { .. }
                | Self::DecryptionFailed { .. }
                | Self::KeyNotAvailable { .. }
        )
    }
}
