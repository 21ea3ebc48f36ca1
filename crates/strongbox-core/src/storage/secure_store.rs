use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FileCategory;

/// Errors produced by secure file store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Integrity check failed: wrong passphrase, or the container was tampered with.
    #[error("authentication failed: wrong passphrase or corrupted container")]
    AuthenticationFailure,
    /// Container bytes do not parse.
    #[error("invalid container format: {reason}")]
    Format { reason: String },
    /// Container was written by a format version this build does not understand.
    #[error("unsupported container version: {version}")]
    UnsupportedVersion { version: u16 },
    /// Requested entry does not exist.
    #[error("entry not found: {name}")]
    NotFound { name: String },
    /// Target name is already taken.
    #[error("entry already exists: {name}")]
    DuplicateName { name: String },
    /// Entry exists but carries a different category than the caller asked for.
    #[error("entry {name} is {actual}, expected {expected}")]
    WrongCategory {
        name: String,
        expected: FileCategory,
        actual: FileCategory,
    },
    /// Entry name is empty or otherwise unusable.
    #[error("invalid entry name: {reason}")]
    InvalidName { reason: String },
    /// Passphrase could not be obtained from the provider.
    #[error("passphrase unavailable: {reason}")]
    Passphrase { reason: String },
    /// Key derivation or encryption could not run (bad parameters, allocation failure).
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Io { reason: String },
}

/// Metadata for one entry, available without decrypting its payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDetails {
    pub name: String,
    pub category: FileCategory,
    /// Length of the decrypted payload in bytes.
    pub size: u64,
    /// Set once when the entry is first created.
    pub create_date: DateTime<Utc>,
}

/// Filesystem-like contract over an encrypted container.
///
/// `store_object` overwrites unconditionally; callers wanting refusal semantics
/// check `exists` first (see the interactor crate).
pub trait SecureFileStore: Send + Sync {
    /// Insert or overwrite an entry. An overwrite keeps the original creation date.
    fn store_object(
        &self,
        name: &str,
        bytes: &[u8],
        category: FileCategory,
    ) -> Result<(), StoreError>;

    /// Decrypt and return an entry's payload.
    fn load_bytes_from_file(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Entry names in insertion order, optionally restricted to one category.
    fn list_files(&self, category: Option<FileCategory>) -> Result<Vec<String>, StoreError>;

    fn get_details(&self, name: &str) -> Result<FileDetails, StoreError>;

    /// Create an empty entry if `name` is absent; existing entries are left untouched.
    fn touch(&self, name: &str) -> Result<(), StoreError>;

    /// Relabel an entry, preserving category, payload and creation date.
    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError>;

    /// Remove an entry and its payload (idempotent).
    fn delete(&self, name: &str) -> Result<(), StoreError>;

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        match self.get_details(name) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Reject names no container can hold.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName {
            reason: "name must not be empty".to_string(),
        });
    }
    if name.chars().any(char::is_control) {
        return Err(StoreError::InvalidName {
            reason: format!("name contains control characters: {name:?}"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    details: FileDetails,
    masked: Vec<u8>,
}

/// In-memory store that simulates encryption for tests and smoke runs.
/// This is not cryptographically secure; use the container engine from
/// `strongbox-storage` for anything that touches disk.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecureStore {
    inner: Arc<Mutex<Vec<MemoryEntry>>>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, Vec<MemoryEntry>>, StoreError> {
        self.inner.lock().map_err(|err| StoreError::Io {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl SecureFileStore for InMemorySecureStore {
    fn store_object(
        &self,
        name: &str,
        bytes: &[u8],
        category: FileCategory,
    ) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut entries = self.entries()?;

        // XOR is a placeholder to avoid storing plaintext in tests.
        let masked = mask(bytes);
        match entries.iter_mut().find(|e| e.details.name == name) {
            Some(existing) => {
                existing.details.category = category;
                existing.details.size = bytes.len() as u64;
                existing.masked = masked;
            }
            None => entries.push(MemoryEntry {
                details: FileDetails {
                    name: name.to_string(),
                    category,
                    size: bytes.len() as u64,
                    create_date: Utc::now(),
                },
                masked,
            }),
        }
        Ok(())
    }

    fn load_bytes_from_file(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let entries = self.entries()?;
        entries
            .iter()
            .find(|e| e.details.name == name)
            .map(|e| unmask(&e.masked))
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    fn list_files(&self, category: Option<FileCategory>) -> Result<Vec<String>, StoreError> {
        let entries = self.entries()?;
        Ok(entries
            .iter()
            .filter(|e| category.is_none_or(|c| e.details.category == c))
            .map(|e| e.details.name.clone())
            .collect())
    }

    fn get_details(&self, name: &str) -> Result<FileDetails, StoreError> {
        let entries = self.entries()?;
        entries
            .iter()
            .find(|e| e.details.name == name)
            .map(|e| e.details.clone())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    fn touch(&self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut entries = self.entries()?;
        if entries.iter().any(|e| e.details.name == name) {
            return Ok(());
        }
        entries.push(MemoryEntry {
            details: FileDetails {
                name: name.to_string(),
                category: FileCategory::Data,
                size: 0,
                create_date: Utc::now(),
            },
            masked: Vec::new(),
        });
        Ok(())
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        validate_name(new_name)?;
        let mut entries = self.entries()?;
        let index = entries
            .iter()
            .position(|e| e.details.name == old_name)
            .ok_or_else(|| StoreError::NotFound {
                name: old_name.to_string(),
            })?;
        if old_name == new_name {
            return Ok(());
        }
        if entries.iter().any(|e| e.details.name == new_name) {
            return Err(StoreError::DuplicateName {
                name: new_name.to_string(),
            });
        }
        entries[index].details.name = new_name.to_string();
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        entries.retain(|e| e.details.name != name);
        Ok(())
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

fn unmask(input: &[u8]) -> Vec<u8> {
    mask(input) // XOR twice restores original.
}
