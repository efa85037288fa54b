//! Directory-backed storage engine.
//!
//! Layout below the root:
//!
//! ```text
//! meta.toml            schema_version = 2
//! files/<key>.rec      record envelope (see crate::backend)
//! settings/<key>.json  SettingRecord as JSON
//! ```
//!
//! Keys are URL-safe base64 of the record name so any name maps to a valid
//! path component. Writes go to a temporary file and are renamed into place.
//! Opening upgrades outdated envelopes in place and bumps `meta.toml`;
//! envelopes from a newer build are left alone.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::backend::{
    BackendError, BackendOpener, SCHEMA_VERSION, StorageBackend, StoredFile, decode_record,
    encode_record, record_migrations,
};
use crate::migration::MigrationRegistry;
use crate::record::{FileMeta, SettingRecord};

const FILES_DIR: &str = "files";
const SETTINGS_DIR: &str = "settings";
const META_FILE: &str = "meta.toml";
const RECORD_SUFFIX: &str = "rec";
const SETTING_SUFFIX: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    schema_version: u32,
}

/// A [`StorageBackend`] keeping one file per record under a root directory.
#[derive(Debug)]
pub struct DirBackend {
    root: PathBuf,
    migrations: MigrationRegistry,
    index: BTreeMap<String, FileMeta>,
}

impl DirBackend {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let root = root.into();
        fs::create_dir_all(root.join(FILES_DIR))?;
        fs::create_dir_all(root.join(SETTINGS_DIR))?;

        let mut backend = Self {
            root,
            migrations: record_migrations(),
            index: BTreeMap::new(),
        };
        let stored_version = backend.read_meta()?;
        if stored_version > SCHEMA_VERSION {
            return Err(BackendError::FutureVersion(stored_version));
        }
        backend.scan()?;
        if stored_version < SCHEMA_VERSION {
            tracing::info!(
                from = stored_version,
                to = SCHEMA_VERSION,
                root = %backend.root.display(),
                "store schema upgraded"
            );
        }
        backend.write_meta()?;
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_meta(&self) -> Result<u32, BackendError> {
        let path = self.root.join(META_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let meta: StoreMeta =
                    toml::from_str(&text).map_err(|e| BackendError::Meta(e.to_string()))?;
                Ok(meta.schema_version)
            }
            // A fresh directory starts at the current version.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SCHEMA_VERSION),
            Err(e) => Err(e.into()),
        }
    }

    fn write_meta(&self) -> Result<(), BackendError> {
        let meta = StoreMeta {
            schema_version: SCHEMA_VERSION,
        };
        let text = toml::to_string(&meta).map_err(|e| BackendError::Meta(e.to_string()))?;
        write_atomic(&self.root.join(META_FILE), text.as_bytes())
    }

    /// Build the in-memory index, upgrading outdated envelopes.
    fn scan(&mut self) -> Result<(), BackendError> {
        for entry in fs::read_dir(self.root.join(FILES_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_SUFFIX) {
                continue;
            }
            let bytes = fs::read(&path)?;
            match decode_record(&bytes, &self.migrations) {
                Ok(decoded) => {
                    if decoded.is_outdated() {
                        write_atomic(&path, &encode_record(&decoded.file)?)?;
                    }
                    let meta = decoded.file.meta();
                    self.index.insert(meta.name.clone(), meta);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                }
            }
        }
        Ok(())
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.root
            .join(FILES_DIR)
            .join(format!("{}.{RECORD_SUFFIX}", encode_key(name)))
    }

    fn setting_path(&self, key: &str) -> PathBuf {
        self.root
            .join(SETTINGS_DIR)
            .join(format!("{}.{SETTING_SUFFIX}", encode_key(key)))
    }
}

fn encode_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl StorageBackend for DirBackend {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn file_index(&self) -> Result<Vec<FileMeta>, BackendError> {
        Ok(self.index.values().cloned().collect())
    }

    fn read_file(&self, name: &str) -> Result<Option<StoredFile>, BackendError> {
        let bytes = match fs::read(self.file_path(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(decode_record(&bytes, &self.migrations)?.file))
    }

    fn write_file(&mut self, file: &StoredFile) -> Result<(), BackendError> {
        let bytes = encode_record(file)?;
        write_atomic(&self.file_path(&file.name), &bytes)?;
        self.index.insert(file.name.clone(), file.meta());
        Ok(())
    }

    fn read_settings(&self) -> Result<Vec<SettingRecord>, BackendError> {
        let mut settings = Vec::new();
        for entry in fs::read_dir(self.root.join(SETTINGS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SETTING_SUFFIX) {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            match serde_json::from_str::<SettingRecord>(&text) {
                Ok(setting) => settings.push(setting),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable setting");
                }
            }
        }
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    fn write_setting(&mut self, setting: &SettingRecord) -> Result<(), BackendError> {
        let text = serde_json::to_string_pretty(setting)?;
        write_atomic(&self.setting_path(&setting.key), text.as_bytes())
    }
}

/// Opens a [`DirBackend`] at a fixed root.
#[derive(Debug, Clone)]
pub struct DirOpener {
    pub root: PathBuf,
}

impl DirOpener {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BackendOpener for DirOpener {
    fn open(&self) -> Result<Box<dyn StorageBackend>, BackendError> {
        Ok(Box::new(DirBackend::open(self.root.clone())?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
