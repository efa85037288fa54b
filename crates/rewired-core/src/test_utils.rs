//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{BackendError, BackendOpener, StorageBackend, StoredFile};
use crate::catalog::BuiltinCatalog;
use crate::clock::ManualClock;
use crate::engine::{Engine, SaveCallback, SaveStatus, Speed, SpeedControl};
use crate::location::PageLocation;
use crate::naming::SaveIdentity;
use crate::record::{FileMeta, SettingRecord, Timestamp};

// ===========================================================================
// Clock
// ===========================================================================

/// 2026-10-18 14:03:04.500 UTC.
pub const FIXED_NOW: Timestamp = Timestamp(1_792_332_184_500);

pub fn fixed_clock() -> ManualClock {
    ManualClock::new(FIXED_NOW)
}

// ===========================================================================
// Save fixtures
// ===========================================================================
//
// FakeEngine identifies a buffer by its first byte: 1 = world (second byte
// is the world number), 2 = lab, 3 = chip (remaining bytes are the name).

pub fn world_save(world: u8) -> Vec<u8> {
    vec![1, world, 0xDE, 0xAD]
}

pub fn lab_save() -> Vec<u8> {
    vec![2, 0xBE, 0xEF]
}

pub fn chip_save(name: &str) -> Vec<u8> {
    let mut bytes = vec![3];
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

/// Marker byte [`FakeEngine::pack_save_buffer`] puts in front of the buffer.
pub const PACK_MARKER: u8 = 0x5A;

pub fn builtin_catalog() -> BuiltinCatalog {
    BuiltinCatalog::new()
        .with_file("Tutorial Lab.lsv", lab_save())
        .with_file("Counter.csv", chip_save("Counter"))
}

// ===========================================================================
// FakeEngine
// ===========================================================================

/// A call made on a [`FakeEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetSaveBuffer { bytes: Vec<u8>, compressed: bool },
    SaveToBuffer,
    PackSaveBuffer,
    LoadFromBuffer,
    Exec { program: String, args: String },
    LoadChip(u8),
    SetSpeed(Speed),
}

/// Scriptable stand-in for the emulator.
pub struct FakeEngine {
    pub buffer: Vec<u8>,
    pub speed: Speed,
    /// What `save_to_buffer` reports.
    pub save_status: SaveStatus,
    /// Written into the buffer when `save_to_buffer` succeeds.
    pub program_state: Vec<u8>,
    pub accept_buffer: bool,
    pub accept_load: bool,
    pub accept_exec: bool,
    pub accept_chip: bool,
    pub calls: Vec<EngineCall>,
    callback: Option<SaveCallback>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            speed: Speed::NORMAL,
            save_status: SaveStatus::Ok,
            program_state: world_save(0),
            accept_buffer: true,
            accept_load: true,
            accept_exec: true,
            accept_chip: true,
            calls: Vec::new(),
            callback: None,
        }
    }

    /// The running program saves on its own, as when the user picks "save".
    pub fn program_saves(&mut self, bytes: &[u8]) {
        self.buffer = bytes.to_vec();
        if let Some(callback) = self.callback.as_mut() {
            callback(bytes);
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn last_exec(&self) -> Option<(&str, &str)> {
        self.calls.iter().rev().find_map(|c| match c {
            EngineCall::Exec { program, args } => Some((program.as_str(), args.as_str())),
            _ => None,
        })
    }
}

impl SpeedControl for FakeEngine {
    fn speed(&self) -> Speed {
        self.speed
    }

    fn set_speed(&mut self, speed: Speed) {
        self.calls.push(EngineCall::SetSpeed(speed));
        self.speed = speed;
    }
}

impl Engine for FakeEngine {
    fn save_buffer(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    fn set_save_buffer(&mut self, bytes: &[u8], compressed: bool) -> bool {
        self.calls.push(EngineCall::SetSaveBuffer {
            bytes: bytes.to_vec(),
            compressed,
        });
        if !self.accept_buffer {
            return false;
        }
        self.buffer = match bytes.split_first() {
            Some((&PACK_MARKER, rest)) if compressed => rest.to_vec(),
            _ => bytes.to_vec(),
        };
        true
    }

    fn save_to_buffer(&mut self) -> SaveStatus {
        self.calls.push(EngineCall::SaveToBuffer);
        if self.save_status == SaveStatus::Ok {
            let state = self.program_state.clone();
            self.program_saves(&state);
        }
        self.save_status
    }

    fn pack_save_buffer(&self) -> Vec<u8> {
        let mut packed = Vec::with_capacity(self.buffer.len() + 1);
        packed.push(PACK_MARKER);
        packed.extend_from_slice(&self.buffer);
        packed
    }

    fn load_from_buffer(&mut self) -> bool {
        self.calls.push(EngineCall::LoadFromBuffer);
        self.accept_load
    }

    fn replace_save_callback(&mut self, callback: Option<SaveCallback>) -> Option<SaveCallback> {
        std::mem::replace(&mut self.callback, callback)
    }

    fn identify(&self, bytes: &[u8]) -> Option<SaveIdentity> {
        match bytes {
            [1, world, ..] => Some(SaveIdentity::World(*world)),
            [2, ..] => Some(SaveIdentity::Lab),
            [3, name @ ..] => Some(SaveIdentity::Chip(String::from_utf8_lossy(name).into_owned())),
            _ => None,
        }
    }

    fn exec(&mut self, program: &str, args: &str) -> bool {
        self.calls.push(EngineCall::Exec {
            program: program.to_string(),
            args: args.to_string(),
        });
        self.accept_exec
    }

    fn load_chip(&mut self, slot: u8) -> bool {
        self.calls.push(EngineCall::LoadChip(slot));
        self.accept_chip
    }
}

// ===========================================================================
// MemoryLocation
// ===========================================================================

/// An in-memory page location. Clones share the fragment, so a test can
/// keep a handle while the frontend owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    fragment: Rc<RefCell<Option<String>>>,
    writes: Rc<RefCell<usize>>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(fragment: &str) -> Self {
        let location = Self::new();
        *location.fragment.borrow_mut() = Some(fragment.to_string()).filter(|f| !f.is_empty());
        location
    }

    /// Number of `set_fragment` calls.
    pub fn writes(&self) -> usize {
        *self.writes.borrow()
    }
}

impl PageLocation for MemoryLocation {
    fn fragment(&self) -> Option<String> {
        self.fragment.borrow().clone()
    }

    fn set_fragment(&mut self, fragment: Option<&str>) {
        *self.writes.borrow_mut() += 1;
        *self.fragment.borrow_mut() = fragment.filter(|f| !f.is_empty()).map(str::to_string);
    }
}

// ===========================================================================
// Failing storage
// ===========================================================================

/// An opener that always fails, as when storage is blocked by the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingOpener;

impl BackendOpener for FailingOpener {
    fn open(&self) -> Result<Box<dyn StorageBackend>, BackendError> {
        Err(BackendError::Unavailable("storage disabled".into()))
    }
}

/// A backend that opens but fails every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingBackend;

fn quota() -> BackendError {
    BackendError::Unavailable("quota exceeded".into())
}

impl StorageBackend for FailingBackend {
    fn describe(&self) -> String {
        "failing".into()
    }

    fn file_index(&self) -> Result<Vec<FileMeta>, BackendError> {
        Err(quota())
    }

    fn read_file(&self, _name: &str) -> Result<Option<StoredFile>, BackendError> {
        Err(quota())
    }

    fn write_file(&mut self, _file: &StoredFile) -> Result<(), BackendError> {
        Err(quota())
    }

    fn read_settings(&self) -> Result<Vec<SettingRecord>, BackendError> {
        Err(quota())
    }

    fn write_setting(&mut self, _setting: &SettingRecord) -> Result<(), BackendError> {
        Err(quota())
    }
}

impl BackendOpener for FailingBackend {
    fn open(&self) -> Result<Box<dyn StorageBackend>, BackendError> {
        Ok(Box::new(FailingBackend))
    }
}
