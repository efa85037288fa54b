//! Storage engines behind the [`RecordStore`](crate::store::RecordStore).
//!
//! A [`StorageBackend`] persists two collections: file records (binary,
//! versioned envelopes) and settings (JSON). Hosts plug in their own engine
//! by implementing the trait; this crate ships an ephemeral
//! [`MemoryBackend`] and a directory-backed
//! [`DirBackend`](crate::dir_backend::DirBackend).
//!
//! # Record envelope
//!
//! Every stored file is an 8-byte header (magic + schema version, both
//! little-endian `u32`) followed by a bitcode body. Bodies from older
//! versions are migrated forward through [`record_migrations`]; bodies from
//! a newer version are refused with [`BackendError::FutureVersion`] and left
//! untouched on disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::migration::{MigrationError, MigrationRegistry};
use crate::record::{FileMeta, FileRecord, SettingRecord, Timestamp, extension_of};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a stored file record.
pub const RECORD_MAGIC: u32 = 0x5245_5701;

/// Current record schema version. Increment when the body shape changes and
/// register a migration step from the previous version.
pub const SCHEMA_VERSION: u32 = 2;

const HEADER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by a storage engine. The record store absorbs all of them.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record too short for header")]
    TooShort,
    #[error("invalid record magic: expected 0x{:08X}, got 0x{:08X}", RECORD_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("record from future schema version {0} (this build supports up to {SCHEMA_VERSION})")]
    FutureVersion(u32),
    #[error("record encoding failed: {0}")]
    Encode(String),
    #[error("record decoding failed: {0}")]
    Decode(String),
    #[error("view of {len} bytes at offset {offset} exceeds a {buffer_len} byte buffer")]
    ViewOutOfRange {
        offset: u32,
        len: u32,
        buffer_len: usize,
    },
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("setting encoding failed: {0}")]
    Setting(#[from] serde_json::Error),
    #[error("metadata error: {0}")]
    Meta(String),
}

// ---------------------------------------------------------------------------
// Stored shapes
// ---------------------------------------------------------------------------

/// How a file's bytes are held in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredPayload {
    /// Tightly sized bytes.
    Exact(Vec<u8>),
    /// A window into a larger backing buffer. Written by older builds;
    /// normalized to [`StoredPayload::Exact`] on first load.
    View {
        buffer: Vec<u8>,
        offset: u32,
        len: u32,
    },
}

impl StoredPayload {
    /// The logical bytes of this payload.
    pub fn bytes(&self) -> Result<&[u8], BackendError> {
        match self {
            StoredPayload::Exact(data) => Ok(data),
            StoredPayload::View {
                buffer,
                offset,
                len,
            } => {
                let start = *offset as usize;
                let end = start.checked_add(*len as usize);
                match end {
                    Some(end) if end <= buffer.len() => Ok(&buffer[start..end]),
                    _ => Err(BackendError::ViewOutOfRange {
                        offset: *offset,
                        len: *len,
                        buffer_len: buffer.len(),
                    }),
                }
            }
        }
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        match self {
            StoredPayload::Exact(data) => data.len(),
            StoredPayload::View { len, .. } => *len as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this payload must be rewritten in exact form.
    pub fn needs_normalizing(&self) -> bool {
        matches!(self, StoredPayload::View { .. })
    }
}

/// The current-version body of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub name: String,
    pub date: Timestamp,
    pub extension: String,
    pub payload: StoredPayload,
}

impl StoredFile {
    /// Exact-form body for a record.
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            name: record.name.clone(),
            date: record.date,
            extension: record.extension.clone(),
            payload: StoredPayload::Exact(record.data.to_vec()),
        }
    }

    pub fn meta(&self) -> FileMeta {
        FileMeta {
            name: self.name.clone(),
            date: self.date,
            extension: self.extension.clone(),
            size: self.payload.len(),
        }
    }

    /// Copy out a tightly sized record.
    pub fn to_record(&self) -> Result<FileRecord, BackendError> {
        let bytes = self.payload.bytes()?;
        Ok(FileRecord {
            name: self.name.clone(),
            data: bytes.into(),
            date: self.date,
            extension: self.extension.clone(),
        })
    }
}

/// Version 1 body: no stored extension, bytes always held as a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyFileV1 {
    pub name: String,
    pub date: i64,
    pub buffer: Vec<u8>,
    pub offset: u32,
    pub len: u32,
}

// ---------------------------------------------------------------------------
// Envelope codec
// ---------------------------------------------------------------------------

fn with_header(version: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&RECORD_MAGIC.to_le_bytes());
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Read the `(magic-checked) version` and body of an envelope.
pub fn split_header(bytes: &[u8]) -> Result<(u32, &[u8]), BackendError> {
    if bytes.len() < HEADER_LEN {
        return Err(BackendError::TooShort);
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != RECORD_MAGIC {
        return Err(BackendError::InvalidMagic(magic));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Ok((version, body))
}

/// Encode a body at the current schema version.
pub fn encode_record(file: &StoredFile) -> Result<Vec<u8>, BackendError> {
    let body = bitcode::serialize(file).map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(with_header(SCHEMA_VERSION, &body))
}

/// Encode a version 1 envelope. Only older builds wrote these; kept so that
/// the upgrade path can be exercised.
pub fn encode_legacy_v1(file: &LegacyFileV1) -> Result<Vec<u8>, BackendError> {
    let body = bitcode::serialize(file).map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(with_header(1, &body))
}

/// A decoded envelope and the version it was stored at.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub file: StoredFile,
    pub stored_version: u32,
}

impl DecodedRecord {
    /// Whether the envelope predates [`SCHEMA_VERSION`].
    pub fn is_outdated(&self) -> bool {
        self.stored_version < SCHEMA_VERSION
    }
}

/// Decode an envelope, migrating older bodies forward.
pub fn decode_record(
    bytes: &[u8],
    migrations: &MigrationRegistry,
) -> Result<DecodedRecord, BackendError> {
    let (version, body) = split_header(bytes)?;
    if version > SCHEMA_VERSION {
        return Err(BackendError::FutureVersion(version));
    }
    let current = migrations.migrate(body, version, SCHEMA_VERSION)?;
    let file: StoredFile =
        bitcode::deserialize(&current).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(DecodedRecord {
        file,
        stored_version: version,
    })
}

fn migrate_v1_to_v2(body: &[u8]) -> Result<Vec<u8>, String> {
    let legacy: LegacyFileV1 = bitcode::deserialize(body).map_err(|e| e.to_string())?;
    let upgraded = StoredFile {
        extension: extension_of(&legacy.name),
        name: legacy.name,
        date: Timestamp(legacy.date),
        payload: StoredPayload::View {
            buffer: legacy.buffer,
            offset: legacy.offset,
            len: legacy.len,
        },
    };
    bitcode::serialize(&upgraded).map_err(|e| e.to_string())
}

/// The registry of record migrations known to this build.
pub fn record_migrations() -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    registry.register(1, "view-payload", migrate_v1_to_v2);
    registry
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// A durable storage engine with a file collection and a settings collection.
pub trait StorageBackend {
    /// Human-readable name for logs.
    fn describe(&self) -> String;

    /// Metadata for every readable file record.
    fn file_index(&self) -> Result<Vec<FileMeta>, BackendError>;

    /// Read one file record by name.
    fn read_file(&self, name: &str) -> Result<Option<StoredFile>, BackendError>;

    /// Upsert a file record.
    fn write_file(&mut self, file: &StoredFile) -> Result<(), BackendError>;

    /// Every stored setting.
    fn read_settings(&self) -> Result<Vec<SettingRecord>, BackendError>;

    /// Upsert a setting.
    fn write_setting(&mut self, setting: &SettingRecord) -> Result<(), BackendError>;
}

/// Opens a [`StorageBackend`]. Opening may fail (missing permissions, quota,
/// unsupported host); the store then runs without persistence.
pub trait BackendOpener {
    fn open(&self) -> Result<Box<dyn StorageBackend>, BackendError>;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    settings: BTreeMap<String, serde_json::Value>,
}

/// An in-process backend. Clones share the same contents, so reopening a
/// store on a clone observes earlier writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw envelope bytes under `name`, bypassing encoding.
    pub fn insert_raw(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.state.borrow_mut().files.insert(name.into(), bytes);
    }

    /// Raw envelope bytes stored under `name`.
    pub fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.state.borrow().files.get(name).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state.borrow().files.len()
    }

    fn decode(&self, name: &str, bytes: &[u8]) -> Option<StoredFile> {
        match decode_record(bytes, &record_migrations()) {
            Ok(decoded) => Some(decoded.file),
            Err(e) => {
                tracing::warn!(name, error = %e, "skipping unreadable record");
                None
            }
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn file_index(&self) -> Result<Vec<FileMeta>, BackendError> {
        let state = self.state.borrow();
        Ok(state
            .files
            .iter()
            .filter_map(|(name, bytes)| self.decode(name, bytes))
            .map(|file| file.meta())
            .collect())
    }

    fn read_file(&self, name: &str) -> Result<Option<StoredFile>, BackendError> {
        let state = self.state.borrow();
        match state.files.get(name) {
            Some(bytes) => Ok(Some(decode_record(bytes, &record_migrations())?.file)),
            None => Ok(None),
        }
    }

    fn write_file(&mut self, file: &StoredFile) -> Result<(), BackendError> {
        let bytes = encode_record(file)?;
        self.state
            .borrow_mut()
            .files
            .insert(file.name.clone(), bytes);
        Ok(())
    }

    fn read_settings(&self) -> Result<Vec<SettingRecord>, BackendError> {
        let state = self.state.borrow();
        Ok(state
            .settings
            .iter()
            .map(|(key, value)| SettingRecord::new(key.clone(), value.clone()))
            .collect())
    }

    fn write_setting(&mut self, setting: &SettingRecord) -> Result<(), BackendError> {
        self.state
            .borrow_mut()
            .settings
            .insert(setting.key.clone(), setting.value.clone());
        Ok(())
    }
}

impl BackendOpener for MemoryBackend {
    fn open(&self) -> Result<Box<dyn StorageBackend>, BackendError> {
        Ok(Box::new(self.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
