//! Core contracts for Strongbox: entry categories, the secure file store surface,
//! and the byte-source interface used to bring external data into a container.
//! This crate carries no cryptography; see `strongbox-storage` for the engine.

pub mod category;
pub mod importer;
pub mod storage;

pub use category::FileCategory;
