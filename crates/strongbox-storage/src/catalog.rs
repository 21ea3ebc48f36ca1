//! In-memory index of a container: entry name -> metadata and blob location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strongbox_core::{
    storage::{FileDetails, StoreError},
    FileCategory,
};

use crate::cipher::SEAL_OVERHEAD;

/// Where a sealed blob lives, relative to the start of the payload region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayloadLocation {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryRecord {
    pub name: String,
    pub category: FileCategory,
    /// Plaintext length.
    pub size: u64,
    pub create_date: DateTime<Utc>,
    /// Random id sealed into the blob's AAD. Fixed for the life of the entry,
    /// so a blob only opens under the record it was written for.
    pub blob_id: u64,
    pub location: PayloadLocation,
}

impl EntryRecord {
    pub fn details(&self) -> FileDetails {
        FileDetails {
            name: self.name.clone(),
            category: self.category,
            size: self.size,
            create_date: self.create_date,
        }
    }
}

/// Ordered set of records with unique names. Order is insertion order and
/// survives overwrite and rename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<EntryRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from decoded records, rejecting duplicate names and blob ids.
    pub fn from_records(records: Vec<EntryRecord>) -> Result<Self, StoreError> {
        for (index, record) in records.iter().enumerate() {
            let earlier = &records[..index];
            if earlier.iter().any(|r| r.name == record.name) {
                return Err(layout_error(format!(
                    "duplicate catalog entry: {}",
                    record.name
                )));
            }
            if earlier.iter().any(|r| r.blob_id == record.blob_id) {
                return Err(layout_error(format!(
                    "entry {} reuses a blob id",
                    record.name
                )));
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&EntryRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self, category: Option<FileCategory>) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| category.is_none_or(|c| r.category == c))
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn contains_blob_id(&self, blob_id: u64) -> bool {
        self.records.iter().any(|r| r.blob_id == blob_id)
    }

    /// Insert a new record or repoint an existing one. Returns `true` when the
    /// name was new. Overwrites keep position, blob id and the original creation date.
    pub fn upsert(
        &mut self,
        name: &str,
        category: FileCategory,
        size: u64,
        location: PayloadLocation,
        blob_id: u64,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(existing) = self.records.iter_mut().find(|r| r.name == name) {
            existing.category = category;
            existing.size = size;
            existing.location = location;
            return false;
        }
        self.records.push(EntryRecord {
            name: name.to_string(),
            category,
            size,
            create_date: now,
            blob_id,
            location,
        });
        true
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        let index = self
            .records
            .iter()
            .position(|r| r.name == old_name)
            .ok_or_else(|| StoreError::NotFound {
                name: old_name.to_string(),
            })?;
        if old_name == new_name {
            return Ok(());
        }
        if self.contains(new_name) {
            return Err(StoreError::DuplicateName {
                name: new_name.to_string(),
            });
        }
        self.records[index].name = new_name.to_string();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<EntryRecord> {
        let index = self.records.iter().position(|r| r.name == name)?;
        Some(self.records.remove(index))
    }

    /// Blobs must tile the payload region exactly, in catalog order, each one
    /// the size of its sealed plaintext.
    pub fn validate_layout(&self, region_len: u64) -> Result<(), StoreError> {
        let mut cursor = 0u64;
        for record in &self.records {
            let PayloadLocation { offset, length } = record.location;
            if offset != cursor {
                return Err(layout_error(format!(
                    "entry {} starts at {offset}, expected {cursor}",
                    record.name
                )));
            }
            let expected = record.size.checked_add(SEAL_OVERHEAD as u64);
            if expected != Some(length) {
                return Err(layout_error(format!(
                    "entry {} has blob length {length} for size {}",
                    record.name, record.size
                )));
            }
            cursor = cursor
                .checked_add(length)
                .ok_or_else(|| layout_error("payload region overflows".to_string()))?;
        }
        if cursor != region_len {
            return Err(layout_error(format!(
                "catalog accounts for {cursor} payload bytes, container holds {region_len}"
            )));
        }
        Ok(())
    }
}

fn layout_error(reason: String) -> StoreError {
    StoreError::Format { reason }
}
