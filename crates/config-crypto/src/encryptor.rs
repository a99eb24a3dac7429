//! Text encryptors

use std::fmt;

use aes_gcm::Aes256Gcm;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use base64::Engine;
use sha2::Sha256;

use crate::{Error, Result};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// PBKDF2 iteration count for passphrase keys.
pub const KDF_ROUNDS: u32 = 100_000;

/// Encrypts and decrypts individual string values.
pub trait TextEncryptor: Send + Sync + fmt::Debug {
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    fn decrypt(&self, ciphertext: &str) -> Result<String>;

    /// Whether this encryptor passes text through unchanged.
    fn is_noop(&self) -> bool {
        false
    }
}

/// AES-256-GCM with a key derived from a passphrase and salt.
///
/// Output is hex of `nonce || ciphertext || tag`. Decryption also accepts
/// the same bytes in standard base64.
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
}

impl AesGcmEncryptor {
    pub fn new(secret: &str, salt: &str) -> Self {
        let key = derive_key(secret, salt);
        Self {
            cipher: Aes256Gcm::new(GenericArray::from_slice(&key)),
        }
    }
}

impl fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryptor").finish_non_exhaustive()
    }
}

fn derive_key(secret: &str, salt: &str) -> [u8; 32] {
    stretch(secret, salt, KDF_ROUNDS)
}

/// PBKDF2-HMAC-SHA256 of the passphrase over the salt.
fn stretch(secret: &str, salt: &str, rounds: u32) -> [u8; 32] {
    pbkdf2::pbkdf2_hmac_array::<Sha256, 32>(secret.as_bytes(), salt.as_bytes(), rounds)
}

fn decode_ciphertext(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if let Ok(bytes) = hex::decode(text) {
        return Ok(bytes);
    }
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|_| Error::InvalidCipher {
            message: "cipher text is neither hex nor base64".to_string(),
        })
}

impl TextEncryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::EncryptionFailed {
                message: e.to_string(),
            })?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(hex::encode(combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let data = decode_ciphertext(ciphertext)?;
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::InvalidCipher {
                message: "cipher text is too short".to_string(),
            });
        }

        let (nonce, body) = data.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(GenericArray::from_slice(nonce), body)
            .map_err(|_| Error::DecryptionFailed {
                message: "authentication failed; wrong key or corrupt cipher text".to_string(),
            })?;

        String::from_utf8(plain).map_err(|_| Error::DecryptionFailed {
            message: "plaintext is not valid UTF-8".to_string(),
        })
    }
}

/// Pass-through encryptor, only useful to detect a missing real key.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEncryptor;

impl TextEncryptor for NoOpEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt() {
        let encryptor = AesGcmEncryptor::new("passphrase", "salt");
        let cipher = encryptor.encrypt("s3cr3t").unwrap();
        assert!(hex::decode(&cipher).is_ok());
        assert_eq!(encryptor.decrypt(&cipher).unwrap(), "s3cr3t");
    }

    #[test]
    fn nonces_differ_between_encryptions() {
        let encryptor = AesGcmEncryptor::new("passphrase", "salt");
        assert_ne!(encryptor.encrypt("x").unwrap(), encryptor.encrypt("x").unwrap());
    }

    #[test]
    fn base64_cipher_text_is_accepted() {
        let encryptor = AesGcmEncryptor::new("passphrase", "salt");
        let hex_text = encryptor.encrypt("value").unwrap();
        let b64 = base64::engine::general_purpose::STANDARD.encode(hex::decode(hex_text).unwrap());
        assert_eq!(encryptor.decrypt(&b64).unwrap(), "value");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let cipher = AesGcmEncryptor::new("one", "salt").encrypt("value").unwrap();
        let err = AesGcmEncryptor::new("two", "salt").decrypt(&cipher).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed { .. }));
    }

    #[test]
    fn salt_changes_the_key() {
        let cipher = AesGcmEncryptor::new("same", "a").encrypt("value").unwrap();
        assert!(AesGcmEncryptor::new("same", "b").decrypt(&cipher).is_err());
    }

    #[test]
    fn passphrase_is_stretched_with_pbkdf2() {
        assert_eq!(
            hex::encode(stretch("password", "salt", 1)),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
        assert_eq!(
            hex::encode(stretch("password", "salt", 2)),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
        assert!(KDF_ROUNDS >= 100_000);
        assert_ne!(derive_key("password", "salt"), stretch("password", "salt", 1));
    }

    #[test]
    fn garbage_is_invalid_cipher() {
        let encryptor = AesGcmEncryptor::new("passphrase", "salt");
        assert!(matches!(encryptor.decrypt("not*cipher"), Err(Error::InvalidCipher { .. })));
        assert!(matches!(encryptor.decrypt("abcd"), Err(Error::InvalidCipher { .. })));
    }

    #[test]
    fn noop_passes_through() {
        assert_eq!(NoOpEncryptor.encrypt("x").unwrap(), "x");
        assert_eq!(NoOpEncryptor.decrypt("x").unwrap(), "x");
        assert!(NoOpEncryptor.is_noop());
        assert!(!AesGcmEncryptor::new("k", "s").is_noop());
    }
}
