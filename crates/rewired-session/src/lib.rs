//! Rewired Session -- the frontend's state machine and its collaborators.
//!
//! [`frontend::Frontend`] owns the engine handle, the record store, the page
//! location, and the three components below, and is the only entry point
//! the host calls into.
//!
//! - [`session::Session`] -- Screen states, modal messages, menu selection.
//! - [`browser::FileBrowser`] -- Picking a stored file to load.
//! - [`autosave::AutosaveController`] -- Debounced snapshots published as
//!   the page locator.

pub mod autosave;
pub mod browser;
pub mod frontend;
pub mod session;
