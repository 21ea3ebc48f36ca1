//! On-disk container codec.
//!
//! ```text
//! header  : "SBOX" | version u16 | mem_cost u32 | time_cost u32 | parallelism u32 | salt[16]
//! seal    : AES-GCM(key, "", aad = header)                      (28 bytes)
//! catalog : length u64 | AES-GCM(key, catalog json, aad = header)
//! payload : AES-GCM(key, bytes, aad = tag | header | blob_id), tiled in catalog order
//! ```
//! All integers are little-endian. The header travels in clear (the salt is
//! needed before a key exists) but is bound to the key by its seal. Each blob
//! is bound to its catalog record through the record's random `blob_id`, so
//! blobs moved between records fail to open.

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use strongbox_core::{storage::StoreError, FileCategory};
use tracing::debug;
use zeroize::Zeroize;

use crate::{
    catalog::{Catalog, EntryRecord, PayloadLocation},
    cipher::{self, SEAL_OVERHEAD},
    kdf::{DerivedKey, KdfParams, Salt, SALT_LEN},
};

pub const MAGIC: [u8; 4] = *b"SBOX";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 4 * 3 + SALT_LEN;

const CATALOG_LEN_BYTES: usize = 8;
const BLOB_AAD: &[u8] = b"strongbox/blob/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u16,
    pub kdf: KdfParams,
    pub salt: Salt,
}

impl ContainerHeader {
    pub fn new(kdf: KdfParams, salt: Salt) -> Self {
        Self {
            version: FORMAT_VERSION,
            kdf,
            salt,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..10].copy_from_slice(&self.kdf.mem_cost_kib.to_le_bytes());
        out[10..14].copy_from_slice(&self.kdf.time_cost.to_le_bytes());
        out[14..18].copy_from_slice(&self.kdf.parallelism.to_le_bytes());
        out[18..HEADER_LEN].copy_from_slice(&self.salt);
        out
    }

    /// Parse the clear header. Needs no key; rejects foreign files and future versions.
    pub fn parse(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(format_error(format!(
                "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        if bytes[0..4] != MAGIC {
            return Err(format_error("not a strongbox container".to_string()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion { version });
        }
        let kdf = KdfParams {
            mem_cost_kib: read_u32(&bytes[6..10]),
            time_cost: read_u32(&bytes[10..14]),
            parallelism: read_u32(&bytes[14..18]),
        };
        kdf.validate()
            .map_err(|e| format_error(format!("header kdf params: {e}")))?;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[18..HEADER_LEN]);
        Ok(Self { version, kdf, salt })
    }
}

/// Decrypted view of one container: header, catalog and the sealed payload region.
///
/// Payloads stay sealed in memory until asked for. Replaced blobs linger in
/// `region` until `encode`, which rebuilds the region from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    header: ContainerHeader,
    catalog: Catalog,
    region: Vec<u8>,
}

impl Container {
    pub fn empty(header: ContainerHeader) -> Self {
        Self {
            header,
            catalog: Catalog::new(),
            region: Vec::new(),
        }
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn decode(bytes: &[u8], key: &DerivedKey) -> Result<Self, StoreError> {
        let header = ContainerHeader::parse(bytes)?;
        let header_bytes = &bytes[..HEADER_LEN];
        let mut rest = &bytes[HEADER_LEN..];

        let seal = take(&mut rest, SEAL_OVERHEAD, "header seal")?;
        let sealed_empty = cipher::open(key, seal, header_bytes)?;
        if !sealed_empty.is_empty() {
            return Err(format_error("header seal carries data".to_string()));
        }

        let len_bytes = take(&mut rest, CATALOG_LEN_BYTES, "catalog length")?;
        let catalog_len = usize::try_from(read_u64(len_bytes))
            .map_err(|_| format_error("catalog length overflows".to_string()))?;
        let sealed_catalog = take(&mut rest, catalog_len, "catalog")?;

        let mut catalog_json = cipher::open(key, sealed_catalog, header_bytes)?;
        let parsed = serde_json::from_slice::<Vec<EntryRecord>>(&catalog_json);
        catalog_json.zeroize();
        let records = parsed.map_err(|e| format_error(format!("catalog: {e}")))?;
        let catalog = Catalog::from_records(records)?;
        catalog.validate_layout(rest.len() as u64)?;

        Ok(Self {
            header,
            catalog,
            region: rest.to_vec(),
        })
    }

    /// Serialize with fresh nonces for header and catalog. Payload blobs are
    /// copied sealed, compacted into catalog order.
    pub fn encode(&self, key: &DerivedKey) -> Result<Vec<u8>, StoreError> {
        let mut region = Vec::with_capacity(self.region.len());
        let mut records = Vec::with_capacity(self.catalog.len());
        for record in self.catalog.records() {
            let blob = self.blob(record)?;
            let mut moved = record.clone();
            moved.location = PayloadLocation {
                offset: region.len() as u64,
                length: blob.len() as u64,
            };
            region.extend_from_slice(blob);
            records.push(moved);
        }

        let header_bytes = self.header.to_bytes();
        let seal = cipher::seal(key, &[], &header_bytes)?;
        let mut catalog_json =
            serde_json::to_vec(&records).map_err(|e| format_error(format!("catalog: {e}")))?;
        let sealed_catalog = cipher::seal(key, &catalog_json, &header_bytes);
        catalog_json.zeroize();
        let sealed_catalog = sealed_catalog?;

        let mut out = Vec::with_capacity(
            HEADER_LEN + seal.len() + CATALOG_LEN_BYTES + sealed_catalog.len() + region.len(),
        );
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&seal);
        out.extend_from_slice(&(sealed_catalog.len() as u64).to_le_bytes());
        out.extend_from_slice(&sealed_catalog);
        out.extend_from_slice(&region);
        debug!(
            entries = records.len(),
            bytes = out.len(),
            "encoded container"
        );
        Ok(out)
    }

    pub fn read_payload(&self, name: &str, key: &DerivedKey) -> Result<Vec<u8>, StoreError> {
        let record = self.catalog.get(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })?;
        let aad = blob_aad(&self.header, record.blob_id);
        let plaintext = cipher::open(key, self.blob(record)?, &aad)?;
        if plaintext.len() as u64 != record.size {
            return Err(format_error(format!(
                "entry {name} decrypted to {} bytes, catalog says {}",
                plaintext.len(),
                record.size
            )));
        }
        Ok(plaintext)
    }

    /// Seal `bytes` and insert or overwrite `name`. Returns `true` for a new entry.
    pub fn put(
        &mut self,
        name: &str,
        bytes: &[u8],
        category: FileCategory,
        key: &DerivedKey,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let blob_id = match self.catalog.get(name) {
            Some(existing) => existing.blob_id,
            None => self.fresh_blob_id(),
        };
        let sealed = cipher::seal(key, bytes, &blob_aad(&self.header, blob_id))?;
        let location = PayloadLocation {
            offset: self.region.len() as u64,
            length: sealed.len() as u64,
        };
        self.region.extend_from_slice(&sealed);
        let size = bytes.len() as u64;
        Ok(self
            .catalog
            .upsert(name, category, size, location, blob_id, now))
    }

    fn fresh_blob_id(&self) -> u64 {
        loop {
            let candidate = OsRng.next_u64();
            if !self.catalog.contains_blob_id(candidate) {
                return candidate;
            }
        }
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        self.catalog.rename(old_name, new_name)
    }

    /// Drop an entry; its blob is reclaimed by the next `encode`.
    pub fn remove(&mut self, name: &str) -> bool {
        self.catalog.remove(name).is_some()
    }

    fn blob(&self, record: &EntryRecord) -> Result<&[u8], StoreError> {
        let PayloadLocation { offset, length } = record.location;
        let start = usize::try_from(offset).ok();
        let end = start
            .zip(usize::try_from(length).ok())
            .and_then(|(s, l)| s.checked_add(l));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.region.len() => Ok(&self.region[start..end]),
            _ => Err(format_error(format!(
                "entry {} points outside the payload region",
                record.name
            ))),
        }
    }
}

fn blob_aad(header: &ContainerHeader, blob_id: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(BLOB_AAD.len() + HEADER_LEN + 8);
    aad.extend_from_slice(BLOB_AAD);
    aad.extend_from_slice(&header.to_bytes());
    aad.extend_from_slice(&blob_id.to_le_bytes());
    aad
}

fn take<'a>(rest: &mut &'a [u8], len: usize, what: &str) -> Result<&'a [u8], StoreError> {
    if rest.len() < len {
        return Err(format_error(format!(
            "truncated {what}: need {len} bytes, have {}",
            rest.len()
        )));
    }
    let (head, tail) = rest.split_at(len);
    *rest = tail;
    Ok(head)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

fn format_error(reason: String) -> StoreError {
    StoreError::Format { reason }
}
