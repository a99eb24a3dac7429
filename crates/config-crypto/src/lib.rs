//! Encryption of configuration values
//!
//! Values stored as `{cipher}<hints><ciphertext>` are decrypted before a
//! document is served. [`EncryptionGateway`] walks a resolved
//! [`config_env::Environment`] and replaces each tagged value, isolating
//! failures to the value that caused them. Key selection is pluggable
//! through [`EncryptorLocator`]; [`KeyChain`] is the built-in AES-GCM one.

pub mod cipher;
pub mod encryptor;
pub mod error;
pub mod form;
pub mod gateway;
pub mod locator;

pub use cipher::{CIPHER_MARKER, CipherValue, KeyHints};
pub use encryptor::{AesGcmEncryptor, NoOpEncryptor, TextEncryptor};
pub use error::{Error, Result};
pub use gateway::{CipherRequest, EncryptionGateway, INVALID_PREFIX, NOT_AVAILABLE};
pub use locator::{EncryptorLocator, KeyChain};
