//! Key derivation: Argon2id passphrase -> container key

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strongbox_core::storage::StoreError;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a derived key in bytes (256-bit).
pub const KEY_LEN: usize = 32;

/// Size of the per-container salt.
pub const SALT_LEN: usize = 16;

/// Upper bound on memory cost accepted from a container header (2 GiB).
pub const MAX_MEM_COST_KIB: u32 = 2 * 1024 * 1024;

pub type Salt = [u8; SALT_LEN];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KdfError {
    #[error("invalid Argon2id params: {0}")]
    Params(String),
    #[error("Argon2id KDF failed: {0}")]
    Derive(String),
}

impl From<KdfError> for StoreError {
    fn from(err: KdfError) -> Self {
        StoreError::Crypto {
            reason: err.to_string(),
        }
    }
}

/// A 256-bit key derived from a passphrase and the container salt.
///
/// Never persisted. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters. Stored in the container header, so changing the
/// defaults only affects containers created afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    pub fn validate(&self) -> Result<(), KdfError> {
        if self.mem_cost_kib > MAX_MEM_COST_KIB {
            return Err(KdfError::Params(format!(
                "memory cost {} KiB exceeds limit of {MAX_MEM_COST_KIB} KiB",
                self.mem_cost_kib
            )));
        }
        self.to_argon2().map(|_| ())
    }

    fn to_argon2(self) -> Result<Params, KdfError> {
        Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| KdfError::Params(e.to_string()))
    }
}

/// Derive the container key. Deterministic for a given passphrase, salt and params;
/// a wrong passphrase is only noticed later, when the container fails to authenticate.
pub fn derive_key(
    passphrase: &SecretString,
    salt: &Salt,
    params: &KdfParams,
) -> Result<DerivedKey, KdfError> {
    params.validate()?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| KdfError::Derive(e.to_string()))?;

    let derived = DerivedKey::from_bytes(key);
    key.zeroize();
    Ok(derived)
}

/// Fresh random salt for a new container. Salts are stored in clear.
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Move user input into secret memory. The same input always yields the same
/// key for a given container, which is what makes reopening work.
pub fn generate_password(passphrase: &str) -> SecretString {
    SecretString::from(passphrase.to_owned())
}
