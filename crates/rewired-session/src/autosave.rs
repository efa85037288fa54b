//! Autosave controller.
//!
//! Qualifying input re-arms a single debounce deadline. When it passes, the
//! frontend runs [`AutosaveController::capture`], which asks the engine for a
//! snapshot under a [`CaptureGuard`] so the user's own save buffer and save
//! callback come back untouched. Successful snapshots are stored and
//! published as the page locator; the controller remembers what it
//! published so the echo of its own write is not mistaken for navigation.

use std::ops::{Deref, DerefMut};

use rewired_core::engine::{Engine, SaveCallback, SaveStatus};
use rewired_core::location::PageLocation;
use rewired_core::locator::{self, DecodeError};
use rewired_core::naming::filename_for_autosave;
use rewired_core::record::Timestamp;
use rewired_core::store::RecordStore;
use rewired_core::timer::{Millis, Timer};

// ---------------------------------------------------------------------------
// CaptureGuard
// ---------------------------------------------------------------------------

/// Borrows the engine for a capture. Snapshots the save buffer and swaps in
/// a no-op save callback; dropping the guard puts both back.
pub struct CaptureGuard<'a, E: Engine + ?Sized> {
    engine: &'a mut E,
    saved_buffer: Vec<u8>,
    saved_callback: Option<SaveCallback>,
}

impl<'a, E: Engine + ?Sized> CaptureGuard<'a, E> {
    pub fn begin(engine: &'a mut E) -> Self {
        let saved_buffer = engine.save_buffer();
        let saved_callback = engine.replace_save_callback(Some(Box::new(|_: &[u8]| {})));
        Self {
            engine,
            saved_buffer,
            saved_callback,
        }
    }
}

impl<E: Engine + ?Sized> Deref for CaptureGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine
    }
}

impl<E: Engine + ?Sized> DerefMut for CaptureGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine
    }
}

impl<E: Engine + ?Sized> Drop for CaptureGuard<'_, E> {
    fn drop(&mut self) {
        self.engine.replace_save_callback(self.saved_callback.take());
        if !self.engine.set_save_buffer(&self.saved_buffer, false) {
            tracing::warn!("engine refused the restored save buffer");
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A snapshot was published. `stored` is false when no durable copy was
    /// written: the store refused it, is degraded, or the write failed.
    Saved {
        name: String,
        locator: String,
        stored: bool,
    },
    /// The engine could not save right now. Nothing happened.
    Blocked,
    /// Nothing autosavable is running. The locator was cleared.
    NotSupported,
}

/// What the current page locator asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorCheck {
    /// No fragment.
    Absent,
    /// The fragment is the one this controller last published.
    Echo,
    /// A different locator; these are its snapshot bytes.
    Load(Vec<u8>),
    Invalid(DecodeError),
}

// ---------------------------------------------------------------------------
// AutosaveController
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AutosaveController {
    delay_ms: u64,
    timer: Timer,
    last_published: Option<String>,
}

impl AutosaveController {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            timer: Timer::new(),
            last_published: None,
        }
    }

    /// The last locator published. `Some("")` means the fragment was
    /// cleared.
    pub fn last_published(&self) -> Option<&str> {
        self.last_published.as_deref()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.timer.deadline()
    }

    /// Qualifying input: push the deadline back to a full delay from `now`.
    pub fn note_input(&mut self, now: Millis) {
        self.timer.rearm(now, self.delay_ms);
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    /// True exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Millis) -> bool {
        let due = self.timer.fire_if_due(now);
        if due {
            tracing::debug!(?now, "autosave deadline reached");
        }
        due
    }

    /// Snapshot, store, and publish the engine's current state.
    pub fn capture<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        store: &mut RecordStore,
        location: &mut dyn PageLocation,
        date: Timestamp,
    ) -> CaptureOutcome {
        let mut guard = CaptureGuard::begin(engine);
        match guard.save_to_buffer() {
            SaveStatus::Ok => {
                let packed = guard.pack_save_buffer();
                let identity = guard.identify(&guard.save_buffer());
                let Some(name) = filename_for_autosave(identity.as_ref(), date) else {
                    return self.publish_nothing(location);
                };
                let stored = store
                    .save(&name, &packed, Some(date))
                    .is_some_and(|saved| saved.is_durable());
                let encoded = locator::encode(&packed);
                location.set_fragment(Some(&encoded));
                self.last_published = Some(encoded.clone());
                tracing::info!(name, stored, bytes = packed.len(), "autosaved");
                CaptureOutcome::Saved {
                    name,
                    locator: encoded,
                    stored,
                }
            }
            SaveStatus::Blocked => {
                tracing::debug!("autosave blocked");
                CaptureOutcome::Blocked
            }
            SaveStatus::NotSupported => self.publish_nothing(location),
        }
    }

    fn publish_nothing(&mut self, location: &mut dyn PageLocation) -> CaptureOutcome {
        tracing::debug!("nothing to autosave, clearing locator");
        location.set_fragment(None);
        self.last_published = Some(String::new());
        CaptureOutcome::NotSupported
    }

    /// Classify the current page locator.
    pub fn check_locator(&self, location: &dyn PageLocation) -> LocatorCheck {
        let fragment = match location.fragment() {
            Some(f) if !f.is_empty() => f,
            _ => return LocatorCheck::Absent,
        };
        if self.last_published.as_deref() == Some(fragment.as_str()) {
            return LocatorCheck::Echo;
        }
        match locator::decode(&fragment) {
            Ok(bytes) => LocatorCheck::Load(bytes),
            Err(e) => LocatorCheck::Invalid(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rewired_core::backend::MemoryBackend;
    use rewired_core::catalog::BuiltinCatalog;
    use rewired_core::test_utils::*;

    use super::*;

    fn fixture() -> (AutosaveController, FakeEngine, RecordStore, MemoryLocation) {
        let mut store = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        store.open(&MemoryBackend::new());
        (
            AutosaveController::new(10_000),
            FakeEngine::new(),
            store,
            MemoryLocation::new(),
        )
    }

    #[test]
    fn rapid_inputs_leave_one_deadline() {
        let mut autosave = AutosaveController::new(10_000);
        for t in [0, 1_000, 2_500, 9_999] {
            autosave.note_input(Millis(t));
        }
        assert_eq!(autosave.deadline(), Some(Millis(19_999)));
        assert!(!autosave.poll(Millis(19_998)));
        assert!(autosave.poll(Millis(19_999)));
        assert!(!autosave.poll(Millis(40_000)));
    }

    #[test]
    fn ok_capture_stores_and_publishes() {
        let (mut autosave, mut engine, mut store, mut location) = fixture();
        engine.program_state = world_save(2);
        let outcome = autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);

        let CaptureOutcome::Saved { name, locator: published, stored } = outcome else {
            panic!("expected a stored autosave");
        };
        assert_eq!(name, "Autosave (2026-10-18 14.03.04).gsvz");
        assert!(stored);
        let mut packed = vec![PACK_MARKER];
        packed.extend(world_save(2));
        assert_eq!(locator::decode(&published).unwrap(), packed);
        assert_eq!(location.fragment(), Some(published.clone()));
        assert_eq!(autosave.last_published(), Some(published.as_str()));

        let mut entry = store.list_files().next().unwrap();
        assert_eq!(entry.load(&mut store).unwrap().data.to_vec(), packed);
    }

    #[test]
    fn capture_restores_buffer_and_callback() {
        let (mut autosave, mut engine, mut store, mut location) = fixture();
        let user_saves = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&user_saves);
        engine.replace_save_callback(Some(Box::new(move |_: &[u8]| *counter.borrow_mut() += 1)));
        engine.buffer = chip_save("Adder");

        autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);
        assert_eq!(engine.save_buffer(), chip_save("Adder"));
        assert_eq!(*user_saves.borrow(), 0, "foreground handler silenced");

        engine.program_saves(&lab_save());
        assert_eq!(*user_saves.borrow(), 1, "foreground handler restored");
    }

    #[test]
    fn degraded_store_publishes_without_durable_copy() {
        let mut store = RecordStore::new(BuiltinCatalog::new(), fixed_clock());
        store.open(&FailingOpener);
        let mut autosave = AutosaveController::new(10_000);
        let mut engine = FakeEngine::new();
        let mut location = MemoryLocation::new();

        let outcome = autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);
        let CaptureOutcome::Saved { locator: published, stored, .. } = outcome else {
            panic!("expected a published snapshot");
        };
        assert!(!stored);
        assert_eq!(location.fragment(), Some(published));
        assert_eq!(store.list_files().len(), 0);
    }

    #[test]
    fn not_supported_clears_locator() {
        let (mut autosave, mut engine, mut store, _) = fixture();
        let mut location = MemoryLocation::with_fragment("abc");
        engine.save_status = SaveStatus::NotSupported;
        let outcome = autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);
        assert_eq!(outcome, CaptureOutcome::NotSupported);
        assert_eq!(location.fragment(), None);
        assert_eq!(autosave.last_published(), Some(""));
        assert_eq!(store.list_files().len(), 0);
    }

    #[test]
    fn unnameable_snapshot_is_not_supported() {
        let (mut autosave, mut engine, mut store, mut location) = fixture();
        engine.program_state = chip_save("Adder");
        let outcome = autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);
        assert_eq!(outcome, CaptureOutcome::NotSupported);
        assert_eq!(store.list_files().len(), 0);
    }

    #[test]
    fn blocked_does_nothing() {
        let (mut autosave, mut engine, mut store, _) = fixture();
        let mut location = MemoryLocation::with_fragment("keep");
        engine.save_status = SaveStatus::Blocked;
        engine.buffer = lab_save();
        let outcome = autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);
        assert_eq!(outcome, CaptureOutcome::Blocked);
        assert_eq!(location.writes(), 0);
        assert_eq!(autosave.last_published(), None);
        assert_eq!(engine.save_buffer(), lab_save());
        assert!(autosave.deadline().is_none(), "no retry is scheduled");
    }

    #[test]
    fn locator_checks() {
        let (mut autosave, mut engine, mut store, mut location) = fixture();
        assert_eq!(autosave.check_locator(&location), LocatorCheck::Absent);

        autosave.capture(&mut engine, &mut store, &mut location, FIXED_NOW);
        assert_eq!(autosave.check_locator(&location), LocatorCheck::Echo);

        let other = MemoryLocation::with_fragment(&locator::encode(&[1, 2, 3]));
        assert_eq!(autosave.check_locator(&other), LocatorCheck::Load(vec![1, 2, 3]));

        let bad = MemoryLocation::with_fragment("not*base64!");
        assert!(matches!(autosave.check_locator(&bad), LocatorCheck::Invalid(_)));
    }
}
