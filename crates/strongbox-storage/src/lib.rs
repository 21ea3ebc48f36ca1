//! Encrypted container engine for Strongbox.
//! A single file holds an Argon2id-keyed header, an AES-GCM sealed catalog and
//! the sealed payload of every entry; every mutation rewrites the file atomically.

pub mod catalog;
pub mod cipher;
pub mod container;
pub mod kdf;
pub mod key_provider;
pub mod secure_file_system;

pub use kdf::{generate_password, KdfParams};
pub use key_provider::{KeyringPassphraseProvider, PassphraseProvider, StaticPassphrase};
pub use secure_file_system::SecureFileSystem;
