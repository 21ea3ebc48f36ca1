use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use strongbox_core::{
    storage::{validate_name, FileDetails, SecureFileStore, StoreError},
    FileCategory,
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::{
    container::{Container, ContainerHeader},
    kdf::{self, DerivedKey, KdfParams},
    key_provider::PassphraseProvider,
};

/// Password-protected container file implementing the shared `SecureFileStore` contract.
///
/// The key is derived once at open and kept (zeroized on drop) for the handle's
/// lifetime. Nothing else is cached: every call re-reads the container, and every
/// mutation rewrites it whole through a temp file that is atomically renamed into place.
/// One writer per container; callers serialize access across handles.
pub struct SecureFileSystem {
    path: PathBuf,
    key: DerivedKey,
    header: ContainerHeader,
}

impl std::fmt::Debug for SecureFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureFileSystem")
            .field("path", &self.path)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl SecureFileSystem {
    /// Open `path`, creating an empty container with default KDF params if absent.
    pub fn open<P>(path: impl Into<PathBuf>, provider: &P) -> Result<Self, StoreError>
    where
        P: PassphraseProvider + ?Sized,
    {
        Self::open_with_params(path, provider, KdfParams::default())
    }

    /// Like [`open`](Self::open); `params` only apply when a new container is created.
    /// Existing containers always use the params recorded in their header.
    #[instrument(skip_all)]
    pub fn open_with_params<P>(
        path: impl Into<PathBuf>,
        provider: &P,
        params: KdfParams,
    ) -> Result<Self, StoreError>
    where
        P: PassphraseProvider + ?Sized,
    {
        let path = path.into();
        let passphrase = provider.passphrase()?;

        match fs::read(&path) {
            Ok(bytes) => {
                let header = ContainerHeader::parse(&bytes)?;
                let key = kdf::derive_key(&passphrase, &header.salt, &header.kdf)?;
                let container = Container::decode(&bytes, &key)?;
                debug!(
                    path = %path.display(),
                    entries = container.catalog().len(),
                    "opened existing container"
                );
                Ok(Self { path, key, header })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let header = ContainerHeader::new(params, kdf::generate_salt());
                let key = kdf::derive_key(&passphrase, &header.salt, &header.kdf)?;
                let sfs = Self { path, key, header };
                sfs.commit(&Container::empty(header))?;
                debug!(path = %sfs.path.display(), "created new container");
                Ok(sfs)
            }
            Err(err) => Err(storage_err(err)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    fn load(&self) -> Result<Container, StoreError> {
        let bytes = fs::read(&self.path).map_err(storage_err)?;
        Container::decode(&bytes, &self.key)
    }

    fn commit(&self, container: &Container) -> Result<(), StoreError> {
        let bytes = container.encode(&self.key)?;
        write_container(&self.path, &bytes)
    }
}

impl SecureFileStore for SecureFileSystem {
    #[instrument(skip_all, fields(name = %name, category = %category, len = bytes.len()))]
    fn store_object(
        &self,
        name: &str,
        bytes: &[u8],
        category: FileCategory,
    ) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut container = self.load()?;
        let created = container.put(name, bytes, category, &self.key, Utc::now())?;
        self.commit(&container)?;
        debug!(created, "stored entry");
        Ok(())
    }

    #[instrument(skip_all, fields(name = %name))]
    fn load_bytes_from_file(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.load()?.read_payload(name, &self.key)
    }

    #[instrument(skip_all, fields(category = ?category))]
    fn list_files(&self, category: Option<FileCategory>) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.catalog().names(category))
    }

    #[instrument(skip_all, fields(name = %name))]
    fn get_details(&self, name: &str) -> Result<FileDetails, StoreError> {
        self.load()?
            .catalog()
            .get(name)
            .map(|record| record.details())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    #[instrument(skip_all, fields(name = %name))]
    fn touch(&self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut container = self.load()?;
        if container.catalog().contains(name) {
            return Ok(());
        }
        container.put(name, &[], FileCategory::Data, &self.key, Utc::now())?;
        self.commit(&container)
    }

    #[instrument(skip_all, fields(old_name = %old_name, new_name = %new_name))]
    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        validate_name(new_name)?;
        let mut container = self.load()?;
        container.rename(old_name, new_name)?;
        self.commit(&container)
    }

    #[instrument(skip_all, fields(name = %name))]
    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut container = self.load()?;
        if !container.remove(name) {
            return Ok(());
        }
        self.commit(&container)
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.catalog().contains(name))
    }
}

/// Stage the full container next to its destination, fsync, then rename over it.
/// A failure at any step leaves the previous file untouched.
fn write_container(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(StoreError::Io {
                reason: "invalid container path".to_string(),
            })
        }
    };
    fs::create_dir_all(parent).map_err(storage_err)?;
    replace_via(parent, path, bytes)
}

/// `staging` must share a filesystem with `path` for the rename to be atomic.
fn replace_via(staging: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(staging).map_err(storage_err)?;
    tmp.write_all(bytes).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.as_file().sync_all().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Io {
        reason: err.to_string(),
    }
}
