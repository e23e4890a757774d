//! AES-256-GCM encryption of agent passwords at rest
//!
//! Ciphertexts are `base64(nonce || ciphertext || tag)`. The owning user's
//! ID is bound as additional authenticated data, so a ciphertext copied
//! onto another user's entry fails to decrypt.

use std::fmt;
use std::sync::Arc;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Encryption key must be base64 of 32 bytes")]
    InvalidKey,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed (tampered data, wrong key or wrong owner)")]
    Decrypt,

    #[error("Ciphertext is not valid base64 or is truncated")]
    Encoding,
}

#[derive(Clone)]
pub struct CredentialCipher {
    key: Arc<[u8; KEY_LEN]>,
    rng: SystemRandom,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Accepts standard or URL-safe base64 (padded), so keys produced by
    /// common key generators both work.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let encoded = encoded.trim();
        let bytes = STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .map_err(|_| CipherError::InvalidKey)?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Ok(Self {
            key: Arc::new(key),
            rng: SystemRandom::new(),
        })
    }

    /// Fresh random key, base64-encoded
    pub fn generate_key() -> Result<String, CipherError> {
        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| CipherError::Encrypt)?;
        Ok(STANDARD.encode(key))
    }

    fn sealing_key(&self) -> Result<LessSafeKey, CipherError> {
        let unbound = UnboundKey::new(&AES_256_GCM, self.key.as_slice()).map_err(|_| CipherError::InvalidKey)?;
        Ok(LessSafeKey::new(unbound))
    }

    pub fn encrypt(&self, plaintext: &str, aad: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Encrypt)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.sealing_key()?
            .seal_in_place_append_tag(nonce, Aad::from(aad.as_bytes()), &mut in_out)
            .map_err(|_| CipherError::Encrypt)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(in_out);
        Ok(STANDARD.encode(combined))
    }

    pub fn decrypt(&self, ciphertext: &str, aad: &str) -> Result<String, CipherError> {
        let combined = STANDARD.decode(ciphertext).map_err(|_| CipherError::Encoding)?;
        if combined.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CipherError::Encoding);
        }

        let (nonce_bytes, sealed) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CipherError::Encoding)?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .sealing_key()?
            .open_in_place(nonce, Aad::from(aad.as_bytes()), &mut in_out)
            .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::Decrypt)
    }

    /// Re-encrypt a ciphertext of this cipher under `next`
    pub fn rotate(&self, ciphertext: &str, aad: &str, next: &CredentialCipher) -> Result<String, CipherError> {
        let plaintext = self.decrypt(ciphertext, aad)?;
        next.encrypt(&plaintext, aad)
    }
}
