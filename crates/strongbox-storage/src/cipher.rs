//! AES-256-GCM sealing for catalog and payload blobs.
//!
//! Sealed layout: `[12-byte nonce][ciphertext][16-byte tag]`. Every call draws a
//! fresh random nonce, so sealing the same plaintext twice never repeats bytes.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use strongbox_core::storage::StoreError;
use thiserror::Error;

use crate::kdf::DerivedKey;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Bytes added to every sealed buffer.
pub const SEAL_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Wrong key, or the sealed bytes were modified.
    #[error("authentication failed")]
    Authentication,
    #[error("encryption failed: {0}")]
    Encrypt(String),
}

impl From<CipherError> for StoreError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::Authentication => StoreError::AuthenticationFailure,
            CipherError::Encrypt(reason) => StoreError::Crypto { reason },
        }
    }
}

pub fn seal(key: &DerivedKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CipherError::Encrypt(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Fails closed: any mismatch is `Authentication`, never partial plaintext.
pub fn open(key: &DerivedKey, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CipherError::Authentication);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = build_cipher(key)?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CipherError::Authentication)
}

fn build_cipher(key: &DerivedKey) -> Result<Aes256Gcm, CipherError> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::Encrypt(format!("cipher init failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KEY_LEN;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes([byte; KEY_LEN])
    }

    #[test]
    fn seal_then_open_returns_plaintext() {
        let sealed = seal(&key(1), b"hello-strongbox", b"aad").expect("seal");
        assert_eq!(sealed.len(), b"hello-strongbox".len() + SEAL_OVERHEAD);
        assert!(!sealed
            .windows(b"hello-strongbox".len())
            .any(|w| w == b"hello-strongbox"));

        let opened = open(&key(1), &sealed, b"aad").expect("open");
        assert_eq!(opened, b"hello-strongbox");
    }

    #[test]
    fn nonces_are_fresh_per_seal() {
        let first = seal(&key(1), b"same", b"").expect("seal");
        let second = seal(&key(1), b"same", b"").expect("seal");
        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let sealed = seal(&key(1), b"secret", b"").expect("seal");
        assert_eq!(
            open(&key(2), &sealed, b""),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn tampered_bytes_or_aad_fail_closed() {
        let sealed = seal(&key(1), b"secret", b"header").expect("seal");

        for index in [0, NONCE_LEN, sealed.len() - 1] {
            let mut tampered = sealed.clone();
            tampered[index] ^= 0x01;
            assert_eq!(
                open(&key(1), &tampered, b"header"),
                Err(CipherError::Authentication)
            );
        }
        assert_eq!(
            open(&key(1), &sealed, b"other"),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert_eq!(
            open(&key(1), &[0u8; SEAL_OVERHEAD - 1], b""),
            Err(CipherError::Authentication)
        );
    }
}
