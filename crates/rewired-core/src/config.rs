//! Frontend configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Files are TOML or RON, detected by extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::FileKind;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file has an extension we don't support.
    #[error("unsupported config format: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A value is outside its allowed range.
    #[error("invalid value for `{field}`: {detail}")]
    Invalid { field: &'static str, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Ron,
}

impl Format {
    /// Detect format from a file's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Format::Toml),
            "ron" => Some(Format::Ron),
            _ => None,
        }
    }
}

// ===========================================================================
// Menu
// ===========================================================================

/// A program the menu can launch directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTarget {
    pub program: String,
    #[serde(default)]
    pub args: String,
}

impl ExecTarget {
    pub fn new(program: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: args.into(),
        }
    }
}

/// One entry of the main menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuChoice {
    pub label: String,
    /// File kinds offered in the file browser before launching.
    #[serde(default)]
    pub files: Vec<FileKind>,
    /// Program launched when no file is chosen.
    #[serde(default)]
    pub exec: Option<ExecTarget>,
}

fn default_menu() -> Vec<MenuChoice> {
    vec![
        MenuChoice {
            label: "Robotropolis".into(),
            files: vec![FileKind::Game],
            exec: Some(ExecTarget::new("game.exe", "")),
        },
        MenuChoice {
            label: "Innovation Lab".into(),
            files: vec![FileKind::Lab],
            exec: Some(ExecTarget::new("lab.exe", "")),
        },
        MenuChoice {
            label: "Robotics Tutorials".into(),
            files: Vec::new(),
            exec: Some(ExecTarget::new("tut.exe", "")),
        },
    ]
}

// ===========================================================================
// FrontendConfig
// ===========================================================================

/// Tunables for storage, autosave, and the session state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Idle time after the last qualifying input before an autosave.
    pub autosave_delay_ms: u64,
    /// Largest payload the store accepts.
    pub max_file_size: usize,
    /// Input lock-out while the menu fades in.
    pub menu_lockout_ms: u64,
    /// Delay after the splash animation before the menu appears.
    pub splash_grace_ms: u64,
    /// Joystick menu repeat period.
    pub joystick_repeat_ms: u64,
    /// Deflate level for exported archives (0-9).
    pub archive_compression_level: i64,
    /// Root directory of the durable store, if any.
    pub storage_dir: Option<PathBuf>,
    pub menu: Vec<MenuChoice>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: 10_000,
            max_file_size: 0x10000,
            menu_lockout_ms: 300,
            splash_grace_ms: 1000,
            joystick_repeat_ms: 50,
            archive_compression_level: 9,
            storage_dir: None,
            menu: default_menu(),
        }
    }
}

impl FrontendConfig {
    /// Load from a `.toml` or `.ron` file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let format = Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        })?;
        let text = std::fs::read_to_string(path)?;
        let parsed = match format {
            Format::Toml => Self::parse_toml(&text),
            Format::Ron => Self::parse_ron(&text),
        };
        let config = parsed.map_err(|detail| ConfigError::Parse {
            file: path.to_path_buf(),
            detail,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_toml(text).map_err(|detail| ConfigError::Parse {
            file: PathBuf::from("<toml>"),
            detail,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_ron(text).map_err(|detail| ConfigError::Parse {
            file: PathBuf::from("<ron>"),
            detail,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    fn parse_ron(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|e| e.to_string())
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=9).contains(&self.archive_compression_level) {
            return Err(ConfigError::Invalid {
                field: "archive_compression_level",
                detail: format!("{} is outside 0..=9", self.archive_compression_level),
            });
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_file_size",
                detail: "must be greater than zero".into(),
            });
        }
        if self.joystick_repeat_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "joystick_repeat_ms",
                detail: "must be greater than zero".into(),
            });
        }
        if let Some(choice) = self
            .menu
            .iter()
            .find(|c| c.files.is_empty() && c.exec.is_none())
        {
            return Err(ConfigError::Invalid {
                field: "menu",
                detail: format!("choice '{}' has neither files nor exec", choice.label),
            });
        }
        Ok(())
    }
}
