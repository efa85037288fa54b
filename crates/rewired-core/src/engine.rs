//! Contract with the emulator core.
//!
//! The engine is an external collaborator. Everything this workspace needs
//! from it goes through [`Engine`]; all calls are synchronous. Readiness of
//! the engine is tracked by the caller, not by the trait.

use std::fmt;

use crate::naming::SaveIdentity;

/// Outcome of asking the engine to write its current state to the save
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveStatus {
    /// The save buffer now holds a loadable snapshot.
    Ok,
    /// The running program cannot be interrupted right now. Transient.
    Blocked,
    /// The current program or context has nothing that can be saved.
    NotSupported,
}

/// Invoked by the engine whenever the running program writes its save
/// buffer. Receives the buffer contents.
pub type SaveCallback = Box<dyn FnMut(&[u8])>;

/// Emulation speed multiplier. `0.0` means paused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed(pub f32);

impl Speed {
    pub const PAUSED: Speed = Speed(0.0);
    pub const NORMAL: Speed = Speed(1.0);

    pub fn is_paused(self) -> bool {
        self.0 <= 0.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::NORMAL
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Speed control, split out so the session can suspend the engine clock
/// without seeing the rest of the engine.
pub trait SpeedControl {
    fn speed(&self) -> Speed;
    fn set_speed(&mut self, speed: Speed);
}

/// The emulator operations this layer depends on.
pub trait Engine: SpeedControl {
    /// Copy of the current save buffer contents.
    fn save_buffer(&self) -> Vec<u8>;

    /// Replace the save buffer. `compressed` marks packed snapshots. Returns
    /// `false` if the engine rejects the bytes.
    fn set_save_buffer(&mut self, bytes: &[u8], compressed: bool) -> bool;

    /// Ask the running program to save into the buffer.
    fn save_to_buffer(&mut self) -> SaveStatus;

    /// Packed (compressed) form of the current save buffer.
    fn pack_save_buffer(&self) -> Vec<u8>;

    /// Load the program state held in the save buffer. Returns `false` if
    /// the buffer is not loadable.
    fn load_from_buffer(&mut self) -> bool;

    /// Install a save callback, returning the previous one.
    fn replace_save_callback(&mut self, callback: Option<SaveCallback>) -> Option<SaveCallback>;

    /// Inspect save bytes for a world, lab, or chip identity.
    fn identify(&self, bytes: &[u8]) -> Option<SaveIdentity>;

    /// Launch a program by name.
    fn exec(&mut self, program: &str, args: &str) -> bool;

    /// Load the chip held in the save buffer into a chip slot of the running
    /// program.
    fn load_chip(&mut self, slot: u8) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_speed() {
        assert!(Speed::PAUSED.is_paused());
        assert!(!Speed::NORMAL.is_paused());
        assert!(Speed(-1.0).is_paused());
        assert_eq!(Speed::default(), Speed::NORMAL);
        assert_eq!(Speed(2.0).to_string(), "2x");
    }
}
