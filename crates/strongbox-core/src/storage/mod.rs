//! Secure file store contract shared by the encrypted engine and test doubles.

mod secure_store;

pub use secure_store::{
    validate_name, FileDetails, InMemorySecureStore, SecureFileStore, StoreError,
};
