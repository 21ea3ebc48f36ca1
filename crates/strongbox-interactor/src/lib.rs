//! Orchestration over a `SecureFileStore`: refusing imports, typed save/load,
//! rename and metadata lookups.

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strongbox_core::{
    importer::ByteSource,
    storage::{SecureFileStore, StoreError},
    FileCategory,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// External source could not be read.
    #[error("could not read {source_name}: {reason}")]
    Source { source_name: String, reason: String },
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Progress reported while importing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Loading,
    Storing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { size: u64 },
    /// Target name already existed; nothing was read or written.
    Refused,
}

/// Caller-facing view of an entry's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    pub file_name: String,
    pub size: u64,
    pub create_date: DateTime<Utc>,
}

/// Entry operations layered over a `SecureFileStore` (encrypted at rest).
pub struct SecureFileSystemInteractor<S: SecureFileStore> {
    store: Arc<S>,
}

impl<S: SecureFileStore> Clone for SecureFileSystemInteractor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SecureFileStore> SecureFileSystemInteractor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Import external bytes under `target_name`. Returns `false` if the name is
    /// taken (the existing entry is not touched) or if anything fails.
    pub fn import_to_file(
        &self,
        source: &dyn ByteSource,
        target_name: &str,
        progress: Option<&dyn Fn(ImportStage)>,
    ) -> bool {
        let category = category_for(target_name);
        match self.try_import_to_file(source, target_name, category, progress) {
            Ok(ImportOutcome::Imported { .. }) => true,
            Ok(ImportOutcome::Refused) => false,
            Err(err) => {
                warn!(entry = target_name, error = %err, "import failed");
                false
            }
        }
    }

    /// Same contract as [`import_to_file`](Self::import_to_file) with the
    /// refusal and failure cases kept apart.
    #[instrument(skip(self, source, progress), fields(source = %source.describe()))]
    pub fn try_import_to_file(
        &self,
        source: &dyn ByteSource,
        target_name: &str,
        category: FileCategory,
        progress: Option<&dyn Fn(ImportStage)>,
    ) -> Result<ImportOutcome, InteractorError> {
        if self.store.exists(target_name)? {
            info!("target exists, refusing import");
            return Ok(ImportOutcome::Refused);
        }

        report(progress, ImportStage::Loading);
        let bytes = source.read_bytes().map_err(|e| InteractorError::Source {
            source_name: source.describe(),
            reason: e.to_string(),
        })?;

        report(progress, ImportStage::Storing);
        self.store.store_object(target_name, &bytes, category)?;

        report(progress, ImportStage::Complete);
        info!(size = bytes.len(), "imported");
        Ok(ImportOutcome::Imported {
            size: bytes.len() as u64,
        })
    }

    /// Serialize `payload` and store it, overwriting any entry of the same name.
    #[instrument(skip(self, payload))]
    pub fn save<T>(
        &self,
        payload: &T,
        name: &str,
        category: FileCategory,
    ) -> Result<(), InteractorError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(payload).map_err(|e| InteractorError::Serialization {
            reason: e.to_string(),
        })?;
        self.store.store_object(name, &bytes, category)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn load<T>(&self, name: &str, category: FileCategory) -> Result<T, InteractorError>
    where
        T: DeserializeOwned,
    {
        let details = self.store.get_details(name)?;
        if details.category != category {
            return Err(StoreError::WrongCategory {
                name: name.to_string(),
                expected: category,
                actual: details.category,
            }
            .into());
        }
        let bytes = self.store.load_bytes_from_file(name)?;
        serde_json::from_slice(&bytes).map_err(|e| InteractorError::Serialization {
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self))]
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<(), InteractorError> {
        self.store.rename(old_name, new_name)?;
        Ok(())
    }

    pub fn info(&self, name: &str) -> Result<FileInfo, InteractorError> {
        let details = self.store.get_details(name)?;
        Ok(FileInfo {
            file_name: details.name,
            size: details.size,
            create_date: details.create_date,
        })
    }

    pub fn touch(&self, name: &str) -> Result<(), InteractorError> {
        self.store.touch(name)?;
        Ok(())
    }

    pub fn list(&self, category: Option<FileCategory>) -> Result<Vec<String>, InteractorError> {
        Ok(self.store.list_files(category)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), InteractorError> {
        self.store.delete(name)?;
        Ok(())
    }
}

fn report(progress: Option<&dyn Fn(ImportStage)>, stage: ImportStage) {
    if let Some(callback) = progress {
        callback(stage);
    }
}

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "heic"];

/// Imports named like images land in the image category; everything else is data.
pub fn category_for(target: &str) -> FileCategory {
    let is_image = Path::new(target)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
    if is_image {
        FileCategory::Image
    } else {
        FileCategory::Data
    }
}
