//! The record store: durable files and settings with a degraded fallback.
//!
//! A [`RecordStore`] starts unopened. [`RecordStore::open`] asks a
//! [`BackendOpener`] for a storage engine; if that fails the store keeps
//! working without persistence. No operation here returns a storage error:
//! failures are logged and the single operation degrades to `None` or empty.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::archive::{self, Archive};
use crate::backend::{BackendOpener, StorageBackend, StoredFile};
use crate::catalog::BuiltinCatalog;
use crate::clock::WallClock;
use crate::record::{
    ARCHIVE_EXTENSION, FileKind, FileMeta, FileRecord, SettingRecord, Timestamp, default_settings,
    extension_of, is_compressed,
};

/// Default limit on a stored file's payload.
pub const MAX_FILE_SIZE: usize = 0x10000;

/// How deep archives nested inside archives are expanded.
const MAX_ARCHIVE_DEPTH: usize = 4;

/// Callback invoked with a setting's value.
pub type SettingWatcher = Box<dyn FnMut(&Value)>;

// ---------------------------------------------------------------------------
// Saved
// ---------------------------------------------------------------------------

/// The result of a successful [`RecordStore::save`]. `durable` is false
/// when the record only lives in memory: the store is degraded or the
/// backend write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saved {
    /// A single file was accepted.
    File { record: FileRecord, durable: bool },
    /// An archive was expanded; these are the records accepted from it.
    /// Durable only if every one of them was written.
    Expanded {
        records: Vec<FileRecord>,
        durable: bool,
    },
}

impl Saved {
    pub fn records(&self) -> &[FileRecord] {
        match self {
            Saved::File { record, .. } => std::slice::from_ref(record),
            Saved::Expanded { records, .. } => records,
        }
    }

    pub fn into_records(self) -> Vec<FileRecord> {
        match self {
            Saved::File { record, .. } => vec![record],
            Saved::Expanded { records, .. } => records,
        }
    }

    pub fn is_durable(&self) -> bool {
        match self {
            Saved::File { durable, .. } | Saved::Expanded { durable, .. } => *durable,
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Handle to a durable record whose bytes have not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    name: String,
}

impl FileRef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Bytes of a listed file, fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Unloaded(FileRef),
    Loaded(Arc<[u8]>),
}

/// One entry of [`RecordStore::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub meta: FileMeta,
    pub content: FileContent,
}

impl FileEntry {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_extension(&self.meta.extension)
    }

    pub fn is_compressed(&self) -> bool {
        is_compressed(&self.meta.extension)
    }

    pub fn is_builtin(&self) -> bool {
        self.meta.date.is_builtin()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.content, FileContent::Loaded(_))
    }

    /// Fetch the file's bytes, reading storage at most once per entry.
    pub fn load(&mut self, store: &mut RecordStore) -> Option<FileRecord> {
        let name = match &self.content {
            FileContent::Loaded(data) => return Some(self.record_with(Arc::clone(data))),
            FileContent::Unloaded(file_ref) => file_ref.name.clone(),
        };
        let record = store.load_file(&name)?;
        self.meta.size = record.data.len();
        self.content = FileContent::Loaded(Arc::clone(&record.data));
        Some(record)
    }

    fn record_with(&self, data: Arc<[u8]>) -> FileRecord {
        FileRecord {
            name: self.meta.name.clone(),
            data,
            date: self.meta.date,
            extension: self.meta.extension.clone(),
        }
    }
}

/// Iterator over listed files: built-ins, then durable records newest first.
#[derive(Debug)]
pub struct FileListing {
    entries: std::vec::IntoIter<FileEntry>,
}

impl Iterator for FileListing {
    type Item = FileEntry;

    fn next(&mut self) -> Option<FileEntry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for FileListing {}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Whether storage has been opened, and how that went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Unopened,
    Persistent,
    /// Opening failed. Writes are dropped, reads see only built-ins and the
    /// settings cache.
    Degraded,
}

pub struct RecordStore {
    backend: Option<Box<dyn StorageBackend>>,
    mode: StoreMode,
    catalog: BuiltinCatalog,
    max_file_size: usize,
    clock: Box<dyn WallClock>,
    settings: BTreeMap<String, Value>,
    /// Keys put before storage was opened, still to be written.
    unsynced: BTreeSet<String>,
    watchers: BTreeMap<String, Vec<SettingWatcher>>,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("mode", &self.mode)
            .field("builtins", &self.catalog.len())
            .field("max_file_size", &self.max_file_size)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    pub fn new(catalog: BuiltinCatalog, clock: impl WallClock + 'static) -> Self {
        let settings = default_settings()
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect();
        Self {
            backend: None,
            mode: StoreMode::Unopened,
            catalog,
            max_file_size: MAX_FILE_SIZE,
            clock: Box::new(clock),
            settings,
            unsynced: BTreeSet::new(),
            watchers: BTreeMap::new(),
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn is_persistent(&self) -> bool {
        self.mode == StoreMode::Persistent
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn catalog(&self) -> &BuiltinCatalog {
        &self.catalog
    }

    /// Current wall-clock time, as used for undated saves.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Open storage. Only the first call has any effect.
    pub fn open(&mut self, opener: &dyn BackendOpener) -> &mut Self {
        if self.mode != StoreMode::Unopened {
            return self;
        }
        let unsynced = std::mem::take(&mut self.unsynced);
        match opener.open() {
            Ok(mut backend) => {
                tracing::debug!(backend = %backend.describe(), "storage opened");
                match backend.read_settings() {
                    Ok(settings) => {
                        // Values put before open are newer than anything stored.
                        for SettingRecord { key, value } in settings {
                            if unsynced.contains(&key) {
                                continue;
                            }
                            notify(&mut self.watchers, &key, &value);
                            self.settings.insert(key, value);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to read settings"),
                }
                for key in unsynced {
                    let Some(value) = self.settings.get(&key) else {
                        continue;
                    };
                    if let Err(e) = backend.write_setting(&SettingRecord::new(key.clone(), value.clone())) {
                        tracing::warn!(key, error = %e, "failed to store setting");
                    }
                }
                self.backend = Some(backend);
                self.mode = StoreMode::Persistent;
            }
            Err(e) => {
                tracing::warn!(error = %e, "storage unavailable, continuing without persistence");
                self.mode = StoreMode::Degraded;
            }
        }
        self
    }

    // -- Files --------------------------------------------------------------

    /// Store a file, or every file inside a `.zip`. When `date` is `None`
    /// the current wall-clock time is used.
    pub fn save(&mut self, name: &str, data: &[u8], date: Option<Timestamp>) -> Option<Saved> {
        self.save_nested(name, data, date, 0)
    }

    fn save_nested(
        &mut self,
        name: &str,
        data: &[u8],
        date: Option<Timestamp>,
        depth: usize,
    ) -> Option<Saved> {
        let name = match base_name(name) {
            Some(name) => name,
            None => {
                tracing::debug!(name, "refusing hidden or empty file name");
                return None;
            }
        };
        let extension = extension_of(name);

        if extension == ARCHIVE_EXTENSION {
            if depth >= MAX_ARCHIVE_DEPTH {
                tracing::warn!(name, depth, "archive nested too deeply");
                return None;
            }
            let entries = match archive::read_entries(data, self.max_file_size) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(name, error = %e, "failed to expand archive");
                    return None;
                }
            };
            let mut records = Vec::new();
            let mut durable = true;
            for entry in entries {
                if let Some(saved) = self.save_nested(&entry.name, &entry.data, entry.date, depth + 1) {
                    durable &= saved.is_durable();
                    records.extend(saved.into_records());
                }
            }
            return Some(Saved::Expanded { records, durable });
        }

        if data.len() > self.max_file_size {
            tracing::debug!(name, size = data.len(), limit = self.max_file_size, "file too large");
            return None;
        }
        if FileKind::from_extension(&extension).is_none() {
            tracing::debug!(name, extension, "unrecognized file type");
            return None;
        }

        let record = FileRecord {
            name: name.to_string(),
            data: data.into(),
            date: date.unwrap_or_else(|| self.clock.now()),
            extension,
        };
        let durable = self.persist(&record);
        Some(Saved::File { record, durable })
    }

    /// Write `record` to the backend. Returns whether it landed.
    fn persist(&mut self, record: &FileRecord) -> bool {
        let Some(backend) = self.backend.as_mut() else {
            tracing::debug!(name = %record.name, "storage not open, file kept in memory only");
            return false;
        };
        match backend.write_file(&StoredFile::from_record(record)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(name = %record.name, error = %e, "failed to store file");
                false
            }
        }
    }

    /// Built-ins in catalog order, then durable records by date descending
    /// with ties broken by name. Durable bytes are not read until
    /// [`FileEntry::load`].
    pub fn list_files(&self) -> FileListing {
        let mut entries: Vec<FileEntry> = self
            .catalog
            .records()
            .map(|record| FileEntry {
                meta: record.meta(),
                content: FileContent::Loaded(record.data),
            })
            .collect();

        let mut durable = self.durable_index();
        durable.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        entries.extend(durable.into_iter().map(|meta| FileEntry {
            content: FileContent::Unloaded(FileRef {
                name: meta.name.clone(),
            }),
            meta,
        }));

        FileListing {
            entries: entries.into_iter(),
        }
    }

    fn durable_index(&self) -> Vec<FileMeta> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        backend.file_index().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to list stored files");
            Vec::new()
        })
    }

    fn read_stored(&self, name: &str) -> Option<StoredFile> {
        let backend = self.backend.as_ref()?;
        match backend.read_file(name) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(name, error = %e, "failed to read stored file");
                None
            }
        }
    }

    /// Read one durable record. Records held in the legacy view form are
    /// rewritten in exact form.
    pub fn load_file(&mut self, name: &str) -> Option<FileRecord> {
        let stored = self.read_stored(name)?;
        let record = match stored.to_record() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(name, error = %e, "stored file is corrupt");
                return None;
            }
        };
        if stored.payload.needs_normalizing() {
            tracing::debug!(name, "rewriting legacy record");
            self.persist(&record);
        }
        Some(record)
    }

    /// Snapshot every durable record (not built-ins) for export.
    pub fn create_archive(&self) -> Archive {
        let mut index = self.durable_index();
        index.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        let records = index.iter().filter_map(|meta| {
            let stored = self.read_stored(&meta.name)?;
            stored
                .to_record()
                .map_err(|e| tracing::warn!(name = %meta.name, error = %e, "skipping corrupt file"))
                .ok()
        });
        Archive::from_records(records)
    }

    // -- Settings -----------------------------------------------------------

    /// Register a callback for `key`. It fires now if the value is cached,
    /// then on every later change.
    pub fn watch(&mut self, key: impl Into<String>, mut callback: impl FnMut(&Value) + 'static) {
        let key = key.into();
        if let Some(value) = self.settings.get(&key) {
            callback(value);
        }
        self.watchers.entry(key).or_default().push(Box::new(callback));
    }

    /// Set a value: cache, notify, then persist.
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.settings.insert(key.clone(), value.clone());
        notify(&mut self.watchers, &key, &value);

        let Some(backend) = self.backend.as_mut() else {
            if self.mode == StoreMode::Unopened {
                self.unsynced.insert(key);
            }
            return;
        };
        if let Err(e) = backend.write_setting(&SettingRecord::new(key.clone(), value)) {
            tracing::warn!(key, error = %e, "failed to store setting");
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}

fn notify(watchers: &mut BTreeMap<String, Vec<SettingWatcher>>, key: &str, value: &Value) {
    if let Some(list) = watchers.get_mut(key) {
        for watcher in list.iter_mut() {
            watcher(value);
        }
    }
}

/// Final path segment of `name`, or `None` if it is empty or hidden.
fn base_name(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.is_empty() || base.starts_with('.') {
        None
    } else {
        Some(base)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::{LegacyFileV1, MemoryBackend, SCHEMA_VERSION, encode_legacy_v1, split_header};
    use crate::clock::ManualClock;
    use crate::record::PALETTE_SETTING;
    use crate::test_utils::{FailingOpener, builtin_catalog, fixed_clock};

    fn opened() -> (RecordStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let mut store = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        store.open(&backend);
        (store, backend)
    }

    fn names(store: &RecordStore) -> Vec<String> {
        store.list_files().map(|e| e.meta.name).collect()
    }

    #[test]
    fn save_then_load_returns_exact_bytes() {
        let (mut store, _backend) = opened();
        let saved = store.save("World.gsv", &[1, 2, 3], Some(Timestamp(10))).unwrap();
        assert_eq!(saved.records()[0].extension, "gsv");

        let mut entry = store.list_files().next().unwrap();
        assert!(!entry.is_loaded());
        let record = entry.load(&mut store).unwrap();
        assert_eq!(&*record.data, &[1, 2, 3]);
        assert_eq!(record.date, Timestamp(10));
        assert!(entry.is_loaded());
    }

    #[test]
    fn undated_saves_use_the_clock() {
        let clock = Rc::new(ManualClock::new(Timestamp(5_000)));
        let mut store = RecordStore::new(BuiltinCatalog::new(), Rc::clone(&clock));
        store.open(&MemoryBackend::new());
        let saved = store.save("a.lsv", &[0], None).unwrap();
        assert_eq!(saved.records()[0].date, Timestamp(5_000));
    }

    #[test]
    fn names_are_reduced_and_hidden_names_refused() {
        let (mut store, _backend) = opened();
        let saved = store.save("some/dir\\Lab.lsv", &[1], None).unwrap();
        assert_eq!(saved.records()[0].name, "Lab.lsv");
        assert!(store.save("", &[1], None).is_none());
        assert!(store.save("dir/", &[1], None).is_none());
        assert!(store.save("__MACOSX/.hidden.gsv", &[1], None).is_none());
        assert_eq!(names(&store), vec!["Lab.lsv"]);
    }

    #[test]
    fn size_limit_is_inclusive() {
        let (store, _backend) = opened();
        let mut store = store.with_max_file_size(4);
        assert!(store.save("a.gsv", &[0; 4], None).is_some());
        assert!(store.save("b.gsv", &[0; 5], None).is_none());
    }

    #[test]
    fn unrecognized_extensions_are_refused() {
        let (mut store, backend) = opened();
        assert!(store.save("notes.txt", &[1], None).is_none());
        assert!(store.save("noext", &[1], None).is_none());
        assert_eq!(backend.file_count(), 0);
    }

    #[test]
    fn last_write_wins() {
        let (mut store, _backend) = opened();
        store.save("x.csv", &[1], Some(Timestamp(1)));
        store.save("x.csv", &[2, 2], Some(Timestamp(2)));
        let mut entries: Vec<_> = store.list_files().collect();
        assert_eq!(entries.len(), 1);
        let record = entries[0].load(&mut store).unwrap();
        assert_eq!(&*record.data, &[2, 2]);
    }

    #[test]
    fn zip_saves_expand_recursively() {
        let inner = Archive::from_records(vec![FileRecord::new(
            "inner.csv",
            vec![7u8],
            Timestamp(300),
        )])
        .to_zip(6)
        .unwrap();
        let outer = Archive::from_records(vec![
            FileRecord::new("one.gsv", vec![1u8], Timestamp(100)),
            FileRecord::new("skip.txt", vec![1u8], Timestamp(100)),
            FileRecord::new("nested.zip", inner, Timestamp(200)),
        ])
        .to_zip(6)
        .unwrap();

        let (mut store, _backend) = opened();
        let saved = store.save("bundle.ZIP", &outer, None).unwrap();
        let Saved::Expanded { records, .. } = saved else {
            panic!("expected expansion");
        };
        let stored: Vec<_> = records.iter().map(|r| (r.name.as_str(), r.date)).collect();
        assert_eq!(stored, vec![("one.gsv", Timestamp(100)), ("inner.csv", Timestamp(300))]);
    }

    #[test]
    fn malformed_zip_is_refused() {
        let (mut store, _backend) = opened();
        assert!(store.save("broken.zip", b"PK nope", None).is_none());
    }

    #[test]
    fn listing_orders_builtins_then_newest_first() {
        let backend = MemoryBackend::new();
        let mut store = RecordStore::new(builtin_catalog(), fixed_clock());
        store.open(&backend);
        store.save("old.gsv", &[1], Some(Timestamp(1)));
        store.save("b.lsv", &[1], Some(Timestamp(5)));
        store.save("a.lsv", &[1], Some(Timestamp(5)));

        let listed = names(&store);
        let builtins: Vec<String> = builtin_catalog().records().map(|r| r.name).collect();
        assert_eq!(listed[..builtins.len()], builtins[..]);
        assert_eq!(listed[builtins.len()..], ["a.lsv", "b.lsv", "old.gsv"]);
        assert!(store.list_files().next().unwrap().is_builtin());
    }

    #[test]
    fn legacy_view_records_are_normalized_on_load() {
        let backend = MemoryBackend::new();
        let legacy = LegacyFileV1 {
            name: "Legacy.gsv".into(),
            date: 42,
            buffer: vec![0xAA; 64],
            offset: 8,
            len: 4,
        };
        backend.insert_raw("Legacy.gsv", encode_legacy_v1(&legacy).unwrap());

        let mut store = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        store.open(&backend);
        let mut entry = store.list_files().next().unwrap();
        assert_eq!(entry.meta.size, 4);
        let record = entry.load(&mut store).unwrap();
        assert_eq!(record.data.len(), 4);

        let raw = backend.raw("Legacy.gsv").unwrap();
        let (version, _) = split_header(&raw).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let again = store.load_file("Legacy.gsv").unwrap();
        assert_eq!(again, record);
    }

    #[test]
    fn future_records_are_skipped_not_deleted() {
        let (mut store, backend) = opened();
        store.save("keep.gsv", &[1], Some(Timestamp(1)));
        let mut future = backend.raw("keep.gsv").unwrap();
        future[4..8].copy_from_slice(&(SCHEMA_VERSION + 1).to_le_bytes());
        backend.insert_raw("future.gsv", future.clone());

        assert_eq!(names(&store), vec!["keep.gsv"]);
        assert_eq!(backend.raw("future.gsv"), Some(future));
    }

    #[test]
    fn degraded_store_keeps_working_in_memory() {
        let mut store = RecordStore::new(builtin_catalog(), fixed_clock());
        store.open(&FailingOpener);
        assert_eq!(store.mode(), StoreMode::Degraded);

        let saved = store.save("x.gsv", &[1, 2], Some(Timestamp(9))).unwrap();
        assert_eq!(&*saved.records()[0].data, &[1, 2]);
        assert_eq!(store.list_files().len(), builtin_catalog().len());
        assert!(store.create_archive().is_empty());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.watch("palette", move |v| sink.borrow_mut().push(v.clone()));
        store.put("palette", serde_json::json!({"name": "classic"}));
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(store.get("palette").unwrap()["name"], "classic");
    }

    #[test]
    fn open_is_idempotent() {
        let (mut store, backend) = opened();
        store.open(&FailingOpener);
        assert!(store.is_persistent());
        store.save("a.gsv", &[1], None);
        assert_eq!(backend.file_count(), 1);
    }

    #[test]
    fn watchers_fire_on_open_put_and_in_order() {
        let backend = MemoryBackend::new();
        {
            let mut seed = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
            seed.open(&backend);
            seed.put("speed", serde_json::json!(2));
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut store = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        let (first, second) = (Rc::clone(&log), Rc::clone(&log));
        store.watch("speed", move |v| first.borrow_mut().push(format!("1:{v}")));
        store.watch("speed", move |v| second.borrow_mut().push(format!("2:{v}")));
        assert!(log.borrow().is_empty(), "nothing cached before open");

        store.open(&backend);
        store.put("speed", serde_json::json!(3));
        assert_eq!(*log.borrow(), vec!["1:2", "2:2", "1:3", "2:3"]);
    }

    #[test]
    fn put_before_open_wins_over_stored_value() {
        let backend = MemoryBackend::new();
        {
            let mut seed = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
            seed.open(&backend);
            seed.put(PALETTE_SETTING, serde_json::json!({"name": "old"}));
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut store = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        let seen = Rc::clone(&log);
        store.put(PALETTE_SETTING, serde_json::json!({"name": "new"}));
        store.watch(PALETTE_SETTING, move |v| seen.borrow_mut().push(v["name"].to_string()));
        store.open(&backend);
        assert_eq!(store.get(PALETTE_SETTING), Some(&serde_json::json!({"name": "new"})));
        assert_eq!(*log.borrow(), vec!["\"new\""], "stored value never surfaces");

        let mut reopened = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        reopened.open(&backend);
        assert_eq!(reopened.get(PALETTE_SETTING), Some(&serde_json::json!({"name": "new"})));
    }

    #[test]
    fn saves_report_whether_they_reached_storage() {
        let (mut store, _backend) = opened();
        assert!(store.save("World.gsv", &[1], None).unwrap().is_durable());

        let mut degraded = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        degraded.open(&FailingOpener);
        assert!(!degraded.save("World.gsv", &[1], None).unwrap().is_durable());

        let mut unopened = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        assert!(!unopened.save("World.gsv", &[1], None).unwrap().is_durable());
    }

    #[test]
    fn create_archive_excludes_builtins() {
        let backend = MemoryBackend::new();
        let mut store = RecordStore::new(builtin_catalog(), fixed_clock());
        store.open(&backend);
        store.save("mine.lsv", &[4, 5], Some(Timestamp(77)));
        let archive = store.create_archive();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.entries()[0].name, "mine.lsv");
        assert_eq!(archive.entries()[0].date, Some(Timestamp(77)));
    }
}
