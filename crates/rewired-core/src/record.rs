//! Record types held by the [`RecordStore`](crate::store::RecordStore).
//!
//! Two durable collections exist: named binary files ([`FileRecord`]) and
//! named settings ([`SettingRecord`]). File kinds and compression are
//! derived from the name's extension; writers and readers both go through
//! [`FileKind::from_extension`] and [`is_compressed`] so the contract cannot
//! drift.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Sentinel date carried by built-in files. Older than any real record.
    pub const BUILTIN: Timestamp = Timestamp(i64::MIN);

    pub fn from_millis(ms: i64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Convert to a UTC date-time. Returns `None` for dates outside the
    /// range `time` can represent (including [`Timestamp::BUILTIN`]).
    pub fn to_datetime(self) -> Option<OffsetDateTime> {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }

    pub fn from_datetime(dt: OffsetDateTime) -> Self {
        let ms = dt.unix_timestamp_nanos() / 1_000_000;
        Timestamp(i64::try_from(ms).unwrap_or(i64::MAX))
    }

    pub fn is_builtin(self) -> bool {
        self == Self::BUILTIN
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) if !self.is_builtin() => write!(f, "{dt}"),
            _ => f.write_str("built-in"),
        }
    }
}

// ---------------------------------------------------------------------------
// File kinds
// ---------------------------------------------------------------------------

/// The content type signalled by a file name's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Saved Robotropolis game (`gsv`, `gsvz`).
    Game,
    /// Saved Innovation Lab (`lsv`, `lsvz`).
    Lab,
    /// Saved chip design (`csv`, `csvz`).
    Chip,
}

impl FileKind {
    /// Classify a lowercase extension. Unrecognized extensions yield `None`
    /// and are refused by the store.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "gsv" | "gsvz" => Some(FileKind::Game),
            "lsv" | "lsvz" => Some(FileKind::Lab),
            "csv" | "csvz" => Some(FileKind::Chip),
            _ => None,
        }
    }

    /// Base extension, without the compression suffix.
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Game => "gsv",
            FileKind::Lab => "lsv",
            FileKind::Chip => "csv",
        }
    }

    /// Extension for a file of this kind, `z`-suffixed when compressed.
    pub fn extension_for(self, compressed: bool) -> String {
        if compressed {
            format!("{}z", self.extension())
        } else {
            self.extension().to_string()
        }
    }
}

/// Lowercase extension of `name`: everything after the final `.`, or an
/// empty string when there is none.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Whether a file with this extension holds a packed (compressed) snapshot.
pub fn is_compressed(extension: &str) -> bool {
    FileKind::from_extension(extension).is_some() && extension.ends_with('z')
}

/// Archive container suffix, expanded on save.
pub const ARCHIVE_EXTENSION: &str = "zip";

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// A named binary file with its date and derived extension.
///
/// `data` is shared and always tightly sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub data: Arc<[u8]>,
    pub date: Timestamp,
    pub extension: String,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>, date: Timestamp) -> Self {
        let name = name.into();
        let extension = extension_of(&name);
        Self {
            name,
            data: data.into(),
            date,
            extension,
        }
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_extension(&self.extension)
    }

    pub fn is_compressed(&self) -> bool {
        is_compressed(&self.extension)
    }

    pub fn is_builtin(&self) -> bool {
        self.date.is_builtin()
    }

    /// Metadata-only view of this record.
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            name: self.name.clone(),
            date: self.date,
            extension: self.extension.clone(),
            size: self.data.len(),
        }
    }
}

/// Metadata for a stored file, without its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: String,
    pub date: Timestamp,
    pub extension: String,
    pub size: usize,
}

// ---------------------------------------------------------------------------
// SettingRecord
// ---------------------------------------------------------------------------

/// A user preference. Values are opaque structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub key: String,
    pub value: serde_json::Value,
}

impl SettingRecord {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Key of the active palette setting.
pub const PALETTE_SETTING: &str = "palette";

/// Settings present in the cache before storage is available.
pub fn default_settings() -> Vec<SettingRecord> {
    vec![SettingRecord::new(
        PALETTE_SETTING,
        serde_json::json!({ "name": "rewired" }),
    )]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
