//! The frontend context: one object owning every collaborator.
//!
//! The host constructs a [`Frontend`] once and forwards its events to the
//! entry points here. Nothing is global; time only moves when the host calls
//! [`Frontend::advance`].
//!
//! Work that needs a ready engine (restoring a locator, invoking a menu
//! choice before startup finishes) is parked as a single pending task with
//! a [`CancelToken`] and resumed by [`Frontend::engine_ready`]. A newer
//! request cancels the older one.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rewired_core::archive::{self, ArchiveError};
use rewired_core::backend::BackendOpener;
use rewired_core::config::{ExecTarget, FrontendConfig};
use rewired_core::engine::Engine;
use rewired_core::location::PageLocation;
use rewired_core::naming::{archive_file_name, filename_for_save_data};
use rewired_core::record::{FileKind, FileRecord};
use rewired_core::store::RecordStore;
use rewired_core::timer::Millis;

use crate::autosave::{AutosaveController, CaptureOutcome, LocatorCheck};
use crate::browser::FileBrowser;
use crate::session::{MessageTicket, Session, SessionState, SessionTimings};

/// Notice shown when a locator snapshot cannot be restored.
pub const RESTORE_FAILED: &str = "FAILED to load packed saved game";

/// Notice shown when a picked save file cannot be loaded.
pub const LOAD_FAILED: &str = "FAILED to load saved file";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Space,
    Enter,
    Other,
}

/// User input as the frontend sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    Pointer,
    Key(Key),
    JoystickButton(bool),
    /// Vertical axis, -1.0 (up) to 1.0 (down).
    JoystickAxis(f32),
}

// ---------------------------------------------------------------------------
// Pending work
// ---------------------------------------------------------------------------

/// Shared cancellation flag for a pending task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[derive(Debug)]
enum PendingAction {
    Load {
        bytes: Vec<u8>,
        compressed: bool,
        failure: &'static str,
    },
    InvokeChoice(usize),
}

#[derive(Debug)]
struct PendingTask {
    token: CancelToken,
    action: PendingAction,
}

/// A save the running program wrote, to be offered to the user as a
/// download. `stored` is false when the store did not keep a durable copy,
/// as for unidentified `.bin` saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSave {
    pub name: String,
    pub bytes: Vec<u8>,
    pub stored: bool,
}

/// A zip of all durable files, ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Frontend
// ---------------------------------------------------------------------------

pub struct Frontend<E: Engine, L: PageLocation> {
    engine: E,
    store: RecordStore,
    location: L,
    config: FrontendConfig,
    session: Session,
    browser: FileBrowser,
    autosave: AutosaveController,
    engine_ready: bool,
    pending: Option<PendingTask>,
    user_saves: Rc<RefCell<Vec<Vec<u8>>>>,
    downloads: Vec<UserSave>,
}

impl<E: Engine, L: PageLocation> Frontend<E, L> {
    pub fn new(engine: E, store: RecordStore, location: L, config: FrontendConfig) -> Self {
        let session = Session::new(SessionTimings::from_config(&config), config.menu.len());
        let autosave = AutosaveController::new(config.autosave_delay_ms);
        Self {
            engine,
            store: store.with_max_file_size(config.max_file_size),
            location,
            session,
            browser: FileBrowser::new(),
            autosave,
            config,
            engine_ready: false,
            pending: None,
            user_saves: Rc::new(RefCell::new(Vec::new())),
            downloads: Vec::new(),
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn location_mut(&mut self) -> &mut L {
        &mut self.location
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn browser(&self) -> &FileBrowser {
        &self.browser
    }

    pub fn autosave(&self) -> &AutosaveController {
        &self.autosave
    }

    pub fn is_engine_ready(&self) -> bool {
        self.engine_ready
    }

    /// Token of the task waiting for the engine, if any.
    pub fn pending_token(&self) -> Option<CancelToken> {
        self.pending.as_ref().map(|task| task.token.clone())
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Open storage and act on the initial page locator.
    pub fn start(&mut self, opener: &dyn BackendOpener, now: Millis) {
        self.store.open(opener);
        self.location_changed(now);
    }

    /// The engine finished initializing. Installs the user save handler and
    /// resumes the pending task.
    pub fn engine_ready(&mut self, now: Millis) {
        if self.engine_ready || self.session.is_halted() {
            return;
        }
        self.engine_ready = true;
        tracing::debug!("engine ready");

        let queue = Rc::clone(&self.user_saves);
        self.engine.replace_save_callback(Some(Box::new(move |bytes: &[u8]| {
            queue.borrow_mut().push(bytes.to_vec());
        })));

        if let Some(task) = self.pending.take() {
            if task.token.is_cancelled() {
                tracing::debug!("pending task was cancelled");
            } else {
                self.run(task.action, now);
            }
        }
    }

    /// The engine could not start. Halts the session for good.
    pub fn engine_failed(&mut self, error: &str) {
        self.session.halt(format!("Fail.\n\n{error}"));
        self.autosave.cancel();
        if let Some(task) = self.pending.take() {
            task.token.cancel();
        }
    }

    /// Run due timers, store saves the program made, and autosave when the
    /// debounce deadline has passed. Program saves are queued for
    /// [`Self::take_user_saves`].
    pub fn advance(&mut self, now: Millis) -> Option<CaptureOutcome> {
        self.session.advance(&mut self.engine, now);

        let saves = std::mem::take(&mut *self.user_saves.borrow_mut());
        for bytes in saves {
            let save = self.save_written(&bytes);
            self.downloads.push(save);
        }

        if !self.autosave.poll(now) {
            return None;
        }
        if !self.engine_ready || self.session.is_halted() {
            tracing::debug!("engine unavailable, skipping autosave");
            return None;
        }
        let date = self.store.now();
        Some(
            self.autosave
                .capture(&mut self.engine, &mut self.store, &mut self.location, date),
        )
    }

    // -- Input --------------------------------------------------------------

    pub fn input(&mut self, input: Input, now: Millis) {
        match self.session.state() {
            SessionState::Splash => {
                if !matches!(input, Input::JoystickAxis(_) | Input::JoystickButton(false)) {
                    self.session.splash_input(&mut self.engine, now);
                }
            }
            SessionState::MenuActive => match input {
                Input::Key(Key::Down | Key::Space) => self.session.menu_next(),
                Input::Key(Key::Up) => self.session.menu_previous(),
                Input::Key(Key::Enter) | Input::JoystickButton(true) => self.menu_invoke(now),
                Input::JoystickAxis(y) => self.session.set_joystick_axis(y, now),
                _ => {}
            },
            SessionState::Exec => self.autosave.note_input(now),
            _ => {}
        }
    }

    pub fn splash_animation_ended(&mut self, now: Millis) {
        self.session.splash_animation_ended(now);
    }

    // -- Menu ---------------------------------------------------------------

    pub fn menu_next(&mut self) {
        self.session.menu_next();
    }

    pub fn menu_previous(&mut self) {
        self.session.menu_previous();
    }

    pub fn menu_hover(&mut self, choice: usize) {
        self.session.menu_hover(choice);
    }

    pub fn menu_click(&mut self, choice: usize, now: Millis) {
        if self.session.state() == SessionState::MenuActive {
            self.session.set_choice(choice as i64);
            self.menu_invoke(now);
        }
    }

    /// Invoke the selected choice, waiting for the engine if needed.
    pub fn menu_invoke(&mut self, now: Millis) {
        if self.session.state() != SessionState::MenuActive {
            return;
        }
        let index = self.session.choice();
        if self.engine_ready {
            self.invoke_choice(index, now);
        } else {
            self.schedule(PendingAction::InvokeChoice(index), now);
        }
    }

    fn invoke_choice(&mut self, index: usize, now: Millis) {
        let Some(choice) = self.config.menu.get(index).cloned() else {
            return;
        };
        tracing::debug!(label = %choice.label, "menu choice invoked");
        let resume = SessionState::MenuTransition;
        if !choice.files.is_empty()
            && self
                .browser
                .open(&self.store, &choice.files, choice.exec.clone(), resume)
        {
            self.go(SessionState::ModalFileBrowser, now);
        } else if let Some(exec) = choice.exec {
            self.launch(&exec, now);
        }
    }

    fn launch(&mut self, exec: &ExecTarget, now: Millis) {
        self.go(SessionState::ExecLaunching, now);
        if !self.engine.exec(&exec.program, &exec.args) {
            tracing::warn!(program = %exec.program, "engine refused to launch program");
            self.notify(format!("FAILED to launch {}", exec.program), now);
        }
    }

    pub fn process_started(&mut self, now: Millis) {
        if self.session.state() == SessionState::ExecLaunching {
            self.go(SessionState::Exec, now);
        }
    }

    pub fn process_exited(&mut self, now: Millis) {
        self.go(SessionState::MenuTransition, now);
    }

    // -- File browser -------------------------------------------------------

    /// Open the chip browser from inside the running lab.
    pub fn open_chip_browser(&mut self, chip_slot: u8, now: Millis) -> bool {
        if self.session.state() != SessionState::Exec {
            return false;
        }
        self.browser.set_chip_slot(chip_slot);
        let opened = self
            .browser
            .open(&self.store, &[FileKind::Chip], None, SessionState::Exec);
        if opened {
            self.go(SessionState::ModalFileBrowser, now);
        }
        opened
    }

    pub fn browser_select(&mut self, index: usize, now: Millis) -> bool {
        if self.session.state() != SessionState::ModalFileBrowser {
            return false;
        }
        match self.browser.select(index, &mut self.store, &mut self.engine) {
            Ok(next) => {
                self.browser.close();
                self.go(next, now);
                true
            }
            Err(e) => {
                self.notify(e.to_string(), now);
                false
            }
        }
    }

    pub fn browser_start_new(&mut self, now: Millis) {
        if self.session.state() != SessionState::ModalFileBrowser {
            return;
        }
        if let Some(exec) = self.browser.start_new() {
            self.launch(&exec, now);
        }
    }

    pub fn browser_cancel(&mut self, now: Millis) {
        if self.session.state() != SessionState::ModalFileBrowser {
            return;
        }
        if let Some(resume) = self.browser.cancel() {
            self.go(resume, now);
        }
    }

    // -- Messages -----------------------------------------------------------

    pub fn dismiss_message(&mut self, now: Millis) -> bool {
        self.session.dismiss(&mut self.engine, now)
    }

    fn notify(&mut self, text: impl Into<String>, now: Millis) -> MessageTicket {
        self.session.show_message(text, &mut self.engine, now)
    }

    // -- Locator ------------------------------------------------------------

    /// Act on the current page locator. Called at start and whenever the
    /// location changes.
    pub fn location_changed(&mut self, now: Millis) {
        if self.session.is_halted() {
            return;
        }
        match self.autosave.check_locator(&self.location) {
            LocatorCheck::Absent => {}
            LocatorCheck::Echo => tracing::debug!("ignoring our own locator"),
            LocatorCheck::Invalid(e) => {
                tracing::warn!(error = %e, "unreadable locator");
                self.notify(RESTORE_FAILED, now);
            }
            LocatorCheck::Load(bytes) => {
                let action = PendingAction::Load {
                    bytes,
                    compressed: true,
                    failure: RESTORE_FAILED,
                };
                self.schedule(action, now);
            }
        }
    }

    /// Enter `Loading` and run `action` once the engine is ready, replacing
    /// any task already waiting.
    fn schedule(&mut self, action: PendingAction, now: Millis) {
        if let Some(older) = self.pending.take() {
            older.token.cancel();
        }
        self.go(SessionState::Loading, now);
        if self.session.state() == SessionState::Loading && self.browser.is_open() {
            self.browser.close();
        }
        if self.engine_ready {
            self.run(action, now);
        } else {
            self.pending = Some(PendingTask {
                token: CancelToken::new(),
                action,
            });
        }
    }

    fn run(&mut self, action: PendingAction, now: Millis) {
        match action {
            PendingAction::Load {
                bytes,
                compressed,
                failure,
            } => {
                if self.engine.set_save_buffer(&bytes, compressed) && self.engine.load_from_buffer() {
                    tracing::info!(bytes = bytes.len(), "loaded snapshot");
                    self.go(SessionState::Exec, now);
                } else {
                    tracing::warn!(bytes = bytes.len(), "engine rejected snapshot");
                    self.notify(failure, now);
                }
            }
            PendingAction::InvokeChoice(index) => self.invoke_choice(index, now),
        }
    }

    fn go(&mut self, next: SessionState, now: Millis) {
        if let Err(e) = self.session.request(next, &mut self.engine, now) {
            tracing::warn!(error = %e, "session transition ignored");
        }
    }

    // -- Files --------------------------------------------------------------

    /// Store a save the running program wrote and name it for download.
    pub fn save_written(&mut self, bytes: &[u8]) -> UserSave {
        let date = self.store.now();
        let identity = self.engine.identify(bytes);
        let name = filename_for_save_data(identity.as_ref(), date);
        let stored = self
            .store
            .save(&name, bytes, Some(date))
            .is_some_and(|saved| saved.is_durable());
        if !stored {
            tracing::debug!(name = %name, "user save not kept in storage");
        }
        UserSave {
            name,
            bytes: bytes.to_vec(),
            stored,
        }
    }

    /// Saves the program wrote since the last call, oldest first.
    pub fn take_user_saves(&mut self) -> Vec<UserSave> {
        std::mem::take(&mut self.downloads)
    }

    /// Load a save file the user picked. Oversized files are ignored.
    pub fn load_save_file(&mut self, bytes: &[u8], compressed: bool, now: Millis) {
        if self.session.is_halted() || bytes.len() > self.config.max_file_size {
            return;
        }
        let action = PendingAction::Load {
            bytes: bytes.to_vec(),
            compressed,
            failure: LOAD_FAILED,
        };
        self.schedule(action, now);
    }

    /// Import every file from a zip and report how many were stored.
    pub fn import_archive(&mut self, bytes: &[u8], now: Millis) -> Result<Vec<FileRecord>, ArchiveError> {
        match archive::import_archive(&mut self.store, bytes) {
            Ok(records) => {
                let summary = match records.len() {
                    1 => "1 file stored".to_string(),
                    n => format!("{n} files stored"),
                };
                self.notify(summary, now);
                Ok(records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "archive import failed");
                self.notify(format!("FAILED to import archive\n\n{e}"), now);
                Err(e)
            }
        }
    }

    /// Zip every durable file.
    pub fn export_archive(&self) -> Result<ExportedArchive, ArchiveError> {
        let bytes = self
            .store
            .create_archive()
            .to_zip(self.config.archive_compression_level)?;
        Ok(ExportedArchive {
            file_name: archive_file_name(self.store.now()),
            bytes,
        })
    }
}
