//! Symmetric helpers for tenant secrets stored in tenant databases.
//!
//! A tenant without a configured key gets a pass-through cipher: callers must not assume
//! ciphertext is produced unconditionally.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use sha2::{Digest, Sha256};

use crate::error::BotfleetError;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct TenantCipher {
    cipher: Option<Aes256Gcm>,
}

impl std::fmt::Debug for TenantCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TenantCipher {
    /// Derives an AES-256 key from the secret via SHA-256. `None` or a blank secret disables
    /// encryption.
    pub fn new(secret: Option<&str>) -> Self {
        let cipher = secret.filter(|s| !s.trim().is_empty()).map(|secret| {
            let digest = Sha256::digest(secret.as_bytes());
            Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest))
        });
        Self { cipher }
    }

    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Returns hex(nonce || ciphertext), or `plaintext` unchanged when no key is configured.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, BotfleetError> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| BotfleetError::Encryption(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Inverse of [`TenantCipher::encrypt`]; pass-through when no key is configured.
    pub fn decrypt(&self, encoded: &str) -> Result<String, BotfleetError> {
        let Some(cipher) = &self.cipher else {
            return Ok(encoded.to_string());
        };

        let raw = hex::decode(encoded.trim())
            .map_err(|e| BotfleetError::Encryption(format!("invalid hex payload: {e}")))?;
        if raw.len() <= NONCE_LEN {
            return Err(BotfleetError::Encryption(
                "payload shorter than nonce".to_string(),
            ));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| BotfleetError::Encryption(format!("decrypt failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| BotfleetError::Encryption(format!("plaintext is not UTF-8: {e}")))
    }
}
