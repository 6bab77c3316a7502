#![deny(missing_docs)]
//! AEAD envelope encryption for MemStack secret-at-rest fields.
//!
//! Tool environment-variable values marked `secret: true` (spec.md §6) are
//! encrypted before they reach [`memstack_core::traits::RelationalStore`].
//! Grounded on `neuron-crypto::CryptoProvider`'s trait boundary (the key
//! never leaves the provider), generalized here to a concrete symmetric
//! AEAD provider since spec.md calls for "a process-level encryption
//! service" rather than an external KMS/HSM — there is no teacher crate
//! for this, so the construction follows `aes-gcm`'s own recommended usage
//! directly.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

/// Errors from envelope encryption/decryption.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key material was the wrong length or otherwise malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    /// Decryption failed (wrong key, tampered ciphertext, truncated envelope).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// A 256-bit AES-GCM key. Zeroized on drop; never `Debug`/`Display`/`Clone`d
/// into logs (mirrors `neuron-secret::SecretValue`'s scoped-exposure
/// discipline, generalized from "decrypt once inside a closure" to "hold
/// for the process lifetime, never print").
pub struct EncryptionKey(Zeroizing<[u8; 32]>);

impl EncryptionKey {
    /// Build a key from exactly 32 raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Decode a key from a base64-encoded 32-byte string, as it would be
    /// read from deployment configuration.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("key must be exactly 32 bytes".into()))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Generate a fresh random key (for local/dev use — deployments should
    /// provision a key through their secret manager, not this path).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// A process-level AEAD envelope encryption service.
///
/// `encrypt` generates a fresh random nonce per call and serializes
/// `nonce || ciphertext` (ciphertext includes the GCM authentication tag)
/// into one opaque byte vector; `decrypt` is the exact inverse. The key
/// never leaves this type (spec.md §6, `neuron-crypto::CryptoProvider`'s
/// boundary).
pub struct EnvelopeCipher {
    cipher: Aes256Gcm,
}

impl EnvelopeCipher {
    /// Construct a cipher bound to one key for this process's lifetime.
    pub fn new(key: &EncryptionKey) -> Result<Self, CryptoError> {
        let key = Key::<Aes256Gcm>::from_slice(key.0.as_slice());
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext+tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`Self::encrypt`].
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if envelope.len() < NONCE_LEN {
            return Err(CryptoError::DecryptionFailed(
                "envelope shorter than nonce".into(),
            ));
        }
        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Convenience: encrypt a UTF-8 string, as used for tool env-var values.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Convenience: decrypt back to a UTF-8 string.
    pub fn decrypt_str(&self, envelope: &[u8]) -> Result<Zeroizing<String>, CryptoError> {
        let bytes = self.decrypt(envelope)?;
        let s = String::from_utf8(bytes.to_vec())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        Ok(Zeroizing::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let key = EncryptionKey::generate();
        let cipher = EnvelopeCipher::new(&key).unwrap();
        let envelope = cipher.encrypt_str("sk-super-secret").unwrap();
        assert_ne!(envelope, b"sk-super-secret");
        let recovered = cipher.decrypt_str(&envelope).unwrap();
        assert_eq!(&*recovered, "sk-super-secret");
    }

    #[test]
    fn nonce_differs_across_calls() {
        let key = EncryptionKey::generate();
        let cipher = EnvelopeCipher::new(&key).unwrap();
        let a = cipher.encrypt_str("same plaintext").unwrap();
        let b = cipher.encrypt_str("same plaintext").unwrap();
        assert_ne!(a, b, "nonce reuse would make ciphertexts identical");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let cipher_a = EnvelopeCipher::new(&EncryptionKey::generate()).unwrap();
        let cipher_b = EnvelopeCipher::new(&EncryptionKey::generate()).unwrap();
        let envelope = cipher_a.encrypt_str("top secret").unwrap();
        assert!(cipher_b.decrypt_str(&envelope).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let key = EncryptionKey::generate();
        let cipher = EnvelopeCipher::new(&key).unwrap();
        let mut envelope = cipher.encrypt_str("top secret").unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(cipher.decrypt_str(&envelope).is_err());
    }

    #[test]
    fn from_base64_rejects_wrong_length() {
        let short = BASE64.encode([0u8; 16]);
        assert!(EncryptionKey::from_base64(&short).is_err());
    }
}
