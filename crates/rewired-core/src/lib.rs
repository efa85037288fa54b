//! Rewired Core -- persistence building blocks for the Robot Odyssey
//! Rewired frontend.
//!
//! This crate holds everything that touches saved data: the record model,
//! storage engines and their schema migrations, the record store, the zip
//! archive bridge, the locator codec, file naming, and the contract with the
//! emulator core. Session logic lives in `rewired-session`.
//!
//! # Save Data Flow
//!
//! 1. The engine writes its save buffer (user save or autosave capture).
//! 2. A file name is derived from the buffer's [`naming::SaveIdentity`] and
//!    the wall-clock date.
//! 3. [`store::RecordStore::save`] upserts the record, or expands a `.zip`
//!    into many records.
//! 4. Autosaves are also published as a locator via [`locator::encode`].
//!
//! Storage is best effort throughout. If the backend cannot be opened the
//! store runs degraded: saves are accepted but not persisted, and listings
//! contain only built-in files.
//!
//! # Key Types
//!
//! - [`store::RecordStore`] -- Durable files and settings with watchers.
//! - [`backend::StorageBackend`] -- Pluggable storage engine with versioned
//!   record envelopes.
//! - [`archive::Archive`] -- Zip export and import of durable records.
//! - [`engine::Engine`] -- Operations required from the emulator.
//! - [`config::FrontendConfig`] -- Tunables loaded from TOML or RON.

pub mod archive;
pub mod backend;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod dir_backend;
pub mod engine;
pub mod locator;
pub mod location;
pub mod migration;
pub mod naming;
pub mod record;
pub mod store;
pub mod timer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
