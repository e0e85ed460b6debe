//! # keyslot
//!
//! One persisted string value, stored as a small file in the platform config
//! directory. `pdfscout` keeps its OCR API key here between runs: the value is
//! read at startup and rewritten on every explicit edit.
//!
//! ## Location
//!
//! | OS      | Default path                                         |
//! |---------|------------------------------------------------------|
//! | macOS   | `~/Library/Application Support/pdfscout/api-key`     |
//! | Linux   | `~/.config/pdfscout/api-key`                         |
//! | Windows | `%APPDATA%\pdfscout\api-key`                         |
//!
//! ## Environment variable overrides
//!
//! - `PDFSCOUT_KEY_FILE`: use this file instead of the default location.
//!
//! ```rust,no_run
//! use keyslot::KeySlot;
//!
//! let slot = KeySlot::default_location();
//! slot.store("sk-example").expect("store failed");
//! assert_eq!(slot.load().unwrap().as_deref(), Some("sk-example"));
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Directory name under the platform config dir.
pub const APP_DIR: &str = "pdfscout";

/// File name of the slot inside [`APP_DIR`].
pub const SLOT_FILE: &str = "api-key";

/// Environment variable that overrides the slot path.
pub const KEY_FILE_ENV: &str = "PDFSCOUT_KEY_FILE";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by keyslot operations.
#[derive(Error, Debug)]
pub enum KeySlotError {
    /// The slot file exists but could not be read.
    #[error("Failed to read credential from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The slot file (or its directory) could not be written.
    #[error("Failed to write credential to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Slot ─────────────────────────────────────────────────────────────────────

/// A single persisted credential value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlot {
    path: PathBuf,
}

impl KeySlot {
    /// A slot backed by an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The slot at `PDFSCOUT_KEY_FILE`, or the platform default location.
    pub fn default_location() -> Self {
        Self::at(default_slot_path())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored value.
    ///
    /// A missing file or a file holding only whitespace reads as `None`.
    pub fn load(&self) -> Result<Option<String>, KeySlotError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let value = content.trim();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(value.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(KeySlotError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Replace the stored value. Storing an empty value clears the slot.
    pub fn store(&self, value: &str) -> Result<(), KeySlotError> {
        let value = value.trim();
        if value.is_empty() {
            return self.clear();
        }

        let write_err = |source| KeySlotError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_err)?;

        // A fresh owner-only temp file next to the target, renamed over it.
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(value.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Remove the stored value. Clearing an empty slot is not an error.
    pub fn clear(&self) -> Result<(), KeySlotError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KeySlotError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

// ── Path resolution ──────────────────────────────────────────────────────────

/// Returns the slot path honouring `PDFSCOUT_KEY_FILE`.
pub fn default_slot_path() -> PathBuf {
    if let Ok(override_path) = std::env::var(KEY_FILE_ENV) {
        if !override_path.trim().is_empty() {
            return PathBuf::from(override_path);
        }
    }

    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(std::env::temp_dir);

    base.join(APP_DIR).join(SLOT_FILE)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
