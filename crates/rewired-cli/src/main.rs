//! `rewired` -- inspect and maintain a directory-backed record store.
//!
//! Files and settings written here are the same records the frontend reads,
//! so the tool doubles as an import/export path outside the browser.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rewired_core::archive::{self, ArchiveError};
use rewired_core::catalog::BuiltinCatalog;
use rewired_core::clock::SystemClock;
use rewired_core::config::{ConfigError, FrontendConfig};
use rewired_core::dir_backend::DirOpener;
use rewired_core::locator::{self, DecodeError};
use rewired_core::naming::archive_file_name;
use rewired_core::store::RecordStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no store directory; pass --store, set REWIRED_STORE, or set storage_dir in the config")]
    MissingStore,
    #[error("could not open the store at {0}")]
    StoreUnavailable(PathBuf),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0}")]
    Archive(#[from] ArchiveError),
    #[error("{0}")]
    Locator(#[from] DecodeError),
    #[error("the store did not accept {0}")]
    Rejected(String),
    #[error("no file named {0}")]
    NotFound(String),
    #[error("invalid JSON value: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "rewired", about = "Robot Odyssey Rewired record store tool")]
struct Cli {
    /// Frontend configuration (TOML or RON).
    #[arg(long, env = "REWIRED_CONFIG")]
    config: Option<PathBuf>,

    /// Store directory. Overrides `storage_dir` from the config.
    #[arg(long, env = "REWIRED_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored files, newest first.
    List,
    /// Store a file from disk under its own name.
    Put { file: PathBuf },
    /// Write a stored file to disk.
    Get {
        name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Store every file in a zip archive.
    Import { archive: PathBuf },
    /// Zip every stored file.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Locator(LocatorCommand),
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
struct LocatorCommand {
    #[command(subcommand)]
    command: LocatorSubcommand,
}

#[derive(Subcommand, Debug)]
enum LocatorSubcommand {
    /// Print the locator for a packed snapshot file.
    Encode { file: PathBuf },
    /// Decode a locator into a packed snapshot file.
    Decode {
        locator: String,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SettingsCommand {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SettingsSubcommand {
    Get { key: String },
    Put { key: String, value: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => FrontendConfig::from_path(path)?,
        None => FrontendConfig::default(),
    };

    match cli.command {
        Command::Locator(locator) => run_locator(locator),
        command => {
            let root = cli
                .store
                .or_else(|| config.storage_dir.clone())
                .ok_or(CliError::MissingStore)?;
            let mut store = open_store(&root, &config)?;
            run_store(&mut store, &config, command)
        }
    }
}

fn open_store(root: &Path, config: &FrontendConfig) -> Result<RecordStore, CliError> {
    let mut store = RecordStore::new(BuiltinCatalog::new(), SystemClock)
        .with_max_file_size(config.max_file_size);
    store.open(&DirOpener::new(root));
    if !store.is_persistent() {
        return Err(CliError::StoreUnavailable(root.to_path_buf()));
    }
    tracing::debug!(root = %root.display(), "store opened");
    Ok(store)
}

fn run_store(store: &mut RecordStore, config: &FrontendConfig, command: Command) -> Result<(), CliError> {
    match command {
        Command::List => {
            for entry in store.list_files() {
                let date = entry
                    .meta
                    .date
                    .to_datetime()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{:>8}  {date}  {}", entry.meta.size, entry.meta.name);
            }
            Ok(())
        }
        Command::Put { file } => {
            let bytes = read(&file)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let saved = store
                .save(&name, &bytes, None)
                .ok_or_else(|| CliError::Rejected(name.clone()))?;
            for record in saved.records() {
                println!("stored {}", record.name);
            }
            Ok(())
        }
        Command::Get { name, out } => {
            let record = store
                .load_file(&name)
                .ok_or_else(|| CliError::NotFound(name.clone()))?;
            let out = out.unwrap_or_else(|| PathBuf::from(&record.name));
            write(&out, &record.data)
        }
        Command::Import { archive } => {
            let bytes = read(&archive)?;
            let records = archive::import_archive(store, &bytes)?;
            for record in &records {
                println!("stored {}", record.name);
            }
            tracing::info!(count = records.len(), "archive imported");
            Ok(())
        }
        Command::Export { out } => {
            let bytes = store
                .create_archive()
                .to_zip(config.archive_compression_level)?;
            let out = out.unwrap_or_else(|| PathBuf::from(archive_file_name(store.now())));
            write(&out, &bytes)?;
            println!("{}", out.display());
            Ok(())
        }
        Command::Settings(settings) => match settings.command {
            SettingsSubcommand::Get { key } => {
                match store.get(&key) {
                    Some(value) => println!("{value}"),
                    None => println!("null"),
                }
                Ok(())
            }
            SettingsSubcommand::Put { key, value } => {
                let value: serde_json::Value = serde_json::from_str(&value)?;
                store.put(key, value);
                Ok(())
            }
        },
        Command::Locator(locator) => run_locator(locator),
    }
}

fn run_locator(command: LocatorCommand) -> Result<(), CliError> {
    match command.command {
        LocatorSubcommand::Encode { file } => {
            println!("{}", locator::encode(&read(&file)?));
            Ok(())
        }
        LocatorSubcommand::Decode { locator: text, out } => {
            let text = text.trim_start_matches('#');
            write(&out, &locator::decode(text)?)
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    fs::write(path, bytes).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
