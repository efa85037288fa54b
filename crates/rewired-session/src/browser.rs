//! File browser over the record store.
//!
//! The browser shows listed files of the kinds a menu choice asks for.
//! It never owns file bytes beyond the lazily loaded [`FileEntry`] slots,
//! and it only opens when at least one file matches.

use rewired_core::config::ExecTarget;
use rewired_core::engine::Engine;
use rewired_core::record::FileKind;
use rewired_core::store::{FileEntry, RecordStore};

use crate::session::SessionState;

/// Why a selection did not load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("the file browser is not open")]
    NotOpen,
    #[error("no file at position {0}")]
    NoSuchEntry(usize),
    #[error("FAILED to read {0}")]
    Unreadable(String),
    #[error("FAILED to load {0}")]
    Rejected(String),
    #[error("no chip slot chosen for {0}")]
    NoChipSlot(String),
}

#[derive(Debug, Default)]
pub struct FileBrowser {
    open: bool,
    modes: Vec<FileKind>,
    entries: Vec<FileEntry>,
    resume: Option<SessionState>,
    exec: Option<ExecTarget>,
    chip_slot: Option<u8>,
}

impl FileBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn modes(&self) -> &[FileKind] {
        &self.modes
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn chip_slot(&self) -> Option<u8> {
        self.chip_slot
    }

    /// Target chip slot for chip selections, zero-based.
    pub fn set_chip_slot(&mut self, slot: u8) {
        self.chip_slot = Some(slot);
    }

    /// Collect listed files of the given kinds. Returns whether any matched;
    /// the browser stays closed otherwise.
    pub fn open(
        &mut self,
        store: &RecordStore,
        modes: &[FileKind],
        exec: Option<ExecTarget>,
        resume: SessionState,
    ) -> bool {
        let entries: Vec<FileEntry> = store
            .list_files()
            .filter(|entry| entry.kind().is_some_and(|kind| modes.contains(&kind)))
            .collect();
        tracing::debug!(?modes, matches = entries.len(), "file browser listing");
        if entries.is_empty() {
            self.close();
            return false;
        }
        self.open = true;
        self.modes = modes.to_vec();
        self.entries = entries;
        self.exec = exec;
        self.resume = Some(resume);
        true
    }

    /// Load the chosen file into the engine. On success returns the state to
    /// close into; the browser itself stays open until [`Self::close`].
    pub fn select<E: Engine + ?Sized>(
        &mut self,
        index: usize,
        store: &mut RecordStore,
        engine: &mut E,
    ) -> Result<SessionState, SelectError> {
        if !self.open {
            return Err(SelectError::NotOpen);
        }
        let chip_slot = self.chip_slot;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(SelectError::NoSuchEntry(index))?;
        let record = entry
            .load(store)
            .ok_or_else(|| SelectError::Unreadable(entry.meta.name.clone()))?;

        let loaded = match record.kind() {
            Some(FileKind::Chip) => {
                let slot = chip_slot.ok_or_else(|| SelectError::NoChipSlot(record.name.clone()))?;
                engine.set_save_buffer(&record.data, record.is_compressed()) && engine.load_chip(slot)
            }
            _ => {
                engine.set_save_buffer(&record.data, record.is_compressed())
                    && engine.load_from_buffer()
            }
        };
        if !loaded {
            tracing::warn!(name = %record.name, "engine rejected selected file");
            return Err(SelectError::Rejected(record.name));
        }
        tracing::debug!(name = %record.name, "loaded selected file");
        Ok(SessionState::Exec)
    }

    /// Leave the browser to start fresh with the menu choice's program.
    /// Stays open when the choice has no program.
    pub fn start_new(&mut self) -> Option<ExecTarget> {
        if !self.open {
            return None;
        }
        let exec = self.exec.take()?;
        self.close();
        Some(exec)
    }

    /// Close without choosing. Returns the state to go back to.
    pub fn cancel(&mut self) -> Option<SessionState> {
        if !self.open {
            return None;
        }
        let resume = self.resume.take();
        self.close();
        resume
    }

    pub fn close(&mut self) {
        self.open = false;
        self.entries.clear();
        self.resume = None;
        self.exec = None;
        self.chip_slot = None;
    }
}

#[cfg(test)]
mod tests {
    use rewired_core::backend::MemoryBackend;
    use rewired_core::record::Timestamp;
    use rewired_core::test_utils::*;

    use super::*;

    fn store() -> RecordStore {
        let mut store = RecordStore::new(builtin_catalog(), fixed_clock());
        store.open(&MemoryBackend::new());
        store.save("World 1.gsv", &world_save(0), Some(Timestamp(10)));
        store.save("Autosave.gsvz", &[PACK_MARKER, 1, 2], Some(Timestamp(20)));
        store
    }

    #[test]
    fn open_filters_by_kind() {
        let store = store();
        let mut browser = FileBrowser::new();
        assert!(browser.open(&store, &[FileKind::Game], None, SessionState::MenuTransition));
        let names: Vec<_> = browser.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Autosave.gsvz", "World 1.gsv"]);

        assert!(browser.open(&store, &[FileKind::Lab, FileKind::Chip], None, SessionState::Exec));
        assert_eq!(browser.entries().len(), 2, "both built-ins");
    }

    #[test]
    fn no_matches_leaves_browser_closed() {
        let mut store = RecordStore::new(Default::default(), fixed_clock());
        store.open(&MemoryBackend::new());
        let mut browser = FileBrowser::new();
        assert!(!browser.open(&store, &[FileKind::Game], None, SessionState::MenuTransition));
        assert!(!browser.is_open());
    }

    #[test]
    fn selecting_a_game_loads_with_compression_flag() {
        let mut store = store();
        let mut engine = FakeEngine::new();
        let mut browser = FileBrowser::new();
        browser.open(&store, &[FileKind::Game], None, SessionState::MenuTransition);

        let next = browser.select(0, &mut store, &mut engine).unwrap();
        assert_eq!(next, SessionState::Exec);
        assert_eq!(
            engine.calls[0],
            EngineCall::SetSaveBuffer {
                bytes: vec![PACK_MARKER, 1, 2],
                compressed: true
            }
        );
        assert_eq!(engine.calls[1], EngineCall::LoadFromBuffer);
        assert!(browser.entries()[0].is_loaded());
    }

    #[test]
    fn rejected_load_keeps_browser_open() {
        let mut store = store();
        let mut engine = FakeEngine::new();
        engine.accept_load = false;
        let mut browser = FileBrowser::new();
        browser.open(&store, &[FileKind::Game], None, SessionState::MenuTransition);
        let err = browser.select(1, &mut store, &mut engine).unwrap_err();
        assert_eq!(err, SelectError::Rejected("World 1.gsv".into()));
        assert!(browser.is_open());
        assert_eq!(
            browser.select(9, &mut store, &mut engine),
            Err(SelectError::NoSuchEntry(9))
        );
    }

    #[test]
    fn chips_load_into_the_chosen_slot() {
        let mut store = store();
        let mut engine = FakeEngine::new();
        let mut browser = FileBrowser::new();
        browser.open(&store, &[FileKind::Chip], None, SessionState::Exec);
        assert_eq!(
            browser.select(0, &mut store, &mut engine),
            Err(SelectError::NoChipSlot("Counter.csv".into()))
        );

        browser.set_chip_slot(2);
        assert_eq!(browser.select(0, &mut store, &mut engine), Ok(SessionState::Exec));
        assert_eq!(engine.calls.last(), Some(&EngineCall::LoadChip(2)));
    }

    #[test]
    fn cancel_and_start_new_close() {
        let store = store();
        let mut browser = FileBrowser::new();
        browser.open(
            &store,
            &[FileKind::Game],
            Some(ExecTarget::new("game.exe", "")),
            SessionState::MenuTransition,
        );
        assert_eq!(browser.cancel(), Some(SessionState::MenuTransition));
        assert!(!browser.is_open());
        assert_eq!(browser.cancel(), None);

        browser.open(
            &store,
            &[FileKind::Game],
            Some(ExecTarget::new("game.exe", "")),
            SessionState::MenuTransition,
        );
        assert_eq!(browser.start_new(), Some(ExecTarget::new("game.exe", "")));
        assert!(!browser.is_open());
    }

    #[test]
    fn chip_slot_does_not_outlive_the_browser() {
        let mut store = store();
        let mut engine = FakeEngine::new();
        let mut browser = FileBrowser::new();
        browser.set_chip_slot(1);
        browser.open(&store, &[FileKind::Chip], None, SessionState::Exec);
        assert_eq!(browser.chip_slot(), Some(1));
        assert_eq!(browser.cancel(), Some(SessionState::Exec));
        assert_eq!(browser.chip_slot(), None);

        // A later chip listing without a slot must not reuse the old one.
        browser.open(&store, &[FileKind::Chip], None, SessionState::Exec);
        assert_eq!(
            browser.select(0, &mut store, &mut engine),
            Err(SelectError::NoChipSlot("Counter.csv".into()))
        );
        browser.close();
        assert_eq!(browser.chip_slot(), None);
    }
}
