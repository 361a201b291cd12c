// src/storage.rs
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

pub const SYNCED_FILE: &str = "google_data.json";
pub const OVERLAY_FILE: &str = "admin_data.json";
pub const LEDGER_FILE: &str = "modified_shifts.json";
pub const LINKS_FILE: &str = "google_links.json";
pub const REQUESTS_FILE: &str = "schedule_requests.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error ({context}): {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> StorageError {
    StorageError::Io {
        source: source.into(),
        context: context.into(),
    }
}

/// Data directory holding one JSON document per persisted store.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Loads `file_name`, falling back to the default value when it is missing
    /// or unreadable. An unreadable file is logged, never fatal.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, file_name: &str) -> T {
        let path = self.path(file_name);
        match load_json(&path) {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("{} not found, starting empty", path.display());
                T::default()
            }
            Err(e) => {
                error!("Failed to load {}: {}. Starting empty.", path.display(), e);
                T::default()
            }
        }
    }

    /// Saves `value` to `file_name`; failures are logged and the caller carries on
    /// with its in-memory state.
    pub fn persist<T: Serialize>(&self, file_name: &str, value: &T) -> bool {
        match save_json(&self.path(file_name), value) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist {}: {}", file_name, e);
                false
            }
        }
    }
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let json_string = fs::read_to_string(path)
        .map_err(|e| io_context(e, format!("Failed to read {}", path.display())))?;
    let value = serde_json::from_str(&json_string)?;
    Ok(Some(value))
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json_string = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("Failed to create directory {}", parent.display()))
            })?;
        }
    }
    let mut file = File::create(path)
        .map_err(|e| io_context(e, format!("Failed to create {}", path.display())))?;
    file.write_all(json_string.as_bytes())
        .map_err(|e| io_context(e, format!("Failed to write {}", path.display())))?;
    info!("Saved {}", path.display());
    Ok(())
}
