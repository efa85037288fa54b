//! Archive bridge: durable records to and from a portable zip container.
//!
//! Export writes every durable record as a Deflate entry with its date.
//! Zip entry times have two-second resolution and no zone, so exact dates
//! are also written as a JSON manifest in the archive comment. Import
//! prefers the manifest, then the entry time, then leaves the date to the
//! store's clock.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Date, Month, PrimitiveDateTime, Time};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::record::{FileRecord, Timestamp};
use crate::store::RecordStore;

/// Errors from reading or writing an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("malformed archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Arc<[u8]>,
    pub date: Option<Timestamp>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DateManifest {
    #[serde(rename = "rewired-dates")]
    dates: BTreeMap<String, i64>,
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// A snapshot of durable records ready to be written as a zip.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|r| ArchiveEntry {
                name: r.name,
                data: r.data,
                date: Some(r.date),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a Deflate-compressed zip at `level` (0-9).
    pub fn to_zip(&self, level: i64) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut manifest = DateManifest::default();

        for entry in &self.entries {
            let mut options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(level));
            if let Some(date) = entry.date {
                options = options.last_modified_time(dos_time(date));
                manifest.dates.insert(entry.name.clone(), date.as_millis());
            }
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.data)?;
        }

        let comment = serde_json::to_string(&manifest).unwrap_or_default();
        writer.set_comment(comment);
        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

fn dos_time(date: Timestamp) -> DateTime {
    date.to_datetime()
        .and_then(|dt| {
            let year = u16::try_from(dt.year()).ok()?;
            DateTime::from_date_and_time(
                year,
                u8::from(dt.month()),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second(),
            )
            .ok()
        })
        .unwrap_or_default()
}

fn from_dos_time(dt: DateTime) -> Option<Timestamp> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(i32::from(dt.year()), month, dt.day()).ok()?;
    let time = Time::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    Some(Timestamp::from_datetime(
        PrimitiveDateTime::new(date, time).assume_utc(),
    ))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Decode every non-directory entry of a zip. Entries larger than
/// `max_entry_size` are skipped.
pub fn read_entries(bytes: &[u8], max_entry_size: usize) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let manifest: DateManifest = serde_json::from_slice(archive.comment()).unwrap_or_default();

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if file.size() > max_entry_size as u64 {
            tracing::debug!(name, size = file.size(), "skipping oversized archive entry");
            continue;
        }
        let date = manifest
            .dates
            .get(&name)
            .map(|ms| Timestamp(*ms))
            .or_else(|| file.last_modified().and_then(from_dos_time));

        let mut data = Vec::with_capacity(file.size() as usize);
        // The declared size can lie; never read past the limit.
        file.take(max_entry_size as u64 + 1).read_to_end(&mut data)?;
        if data.len() > max_entry_size {
            tracing::debug!(name, "skipping archive entry larger than declared");
            continue;
        }
        entries.push(ArchiveEntry {
            name,
            data: data.into(),
            date,
        });
    }
    Ok(entries)
}

/// Store every entry of a zip through [`RecordStore::save`]. Entries the
/// store refuses are left out of the result.
pub fn import_archive(store: &mut RecordStore, bytes: &[u8]) -> Result<Vec<FileRecord>, ArchiveError> {
    let entries = read_entries(bytes, store.max_file_size())?;
    let total = entries.len();
    let stored: Vec<FileRecord> = entries
        .into_iter()
        .filter_map(|entry| store.save(&entry.name, &entry.data, entry.date))
        .flat_map(|saved| saved.into_records())
        .collect();
    tracing::info!(entries = total, stored = stored.len(), "archive imported");
    Ok(stored)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
