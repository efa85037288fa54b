//! Generated file names.
//!
//! Names embed a human-meaningful identity, a date, and an extension that
//! encodes kind and compression (see [`FileKind`]). The date portion uses
//! only characters that are valid in file names on every platform.

use time::macros::format_description;

use crate::record::{FileKind, Timestamp};

/// What a save buffer holds, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveIdentity {
    /// A Robotropolis world, zero-based.
    World(u8),
    /// The Innovation Lab.
    Lab,
    /// A chip design with its (possibly empty) name.
    Chip(String),
}

impl SaveIdentity {
    pub fn kind(&self) -> FileKind {
        match self {
            SaveIdentity::World(_) => FileKind::Game,
            SaveIdentity::Lab => FileKind::Lab,
            SaveIdentity::Chip(_) => FileKind::Chip,
        }
    }
}

/// Format a date for inclusion in a file name: `YYYY-MM-DD HH.MM.SS` (UTC).
pub fn date_label(date: Timestamp) -> String {
    let format = format_description!("[year]-[month]-[day] [hour].[minute].[second]");
    date.to_datetime()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| date.as_millis().to_string())
}

/// Name for a save the user made from inside the program.
pub fn filename_for_save_data(identity: Option<&SaveIdentity>, date: Timestamp) -> String {
    let label = date_label(date);
    match identity {
        Some(SaveIdentity::World(world)) => format!(
            "Robotropolis, World {} ({label}).{}",
            u16::from(*world) + 1,
            FileKind::Game.extension()
        ),
        Some(SaveIdentity::Lab) => format!("Saved Lab ({label}).{}", FileKind::Lab.extension()),
        Some(SaveIdentity::Chip(name)) => {
            let name = name.trim();
            let name = if name.is_empty() { "Untitled Chip" } else { name };
            format!("{name} ({label}).{}", FileKind::Chip.extension())
        }
        None => format!("{label}.bin"),
    }
}

/// Name for an autosave of a packed snapshot. Only worlds and the lab can be
/// autosaved; anything else yields `None`.
pub fn filename_for_autosave(identity: Option<&SaveIdentity>, date: Timestamp) -> Option<String> {
    let kind = match identity? {
        SaveIdentity::World(_) => FileKind::Game,
        SaveIdentity::Lab => FileKind::Lab,
        SaveIdentity::Chip(_) => return None,
    };
    Some(format!(
        "Autosave ({}).{}",
        date_label(date),
        kind.extension_for(true)
    ))
}

/// Name for an exported archive of all durable files.
pub fn archive_file_name(date: Timestamp) -> String {
    format!("Robot Odyssey Files ({}).zip", date_label(date))
}
