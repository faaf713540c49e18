//! Preferences persisted across runs.
//!
//! A small JSON file remembers the directory last used for saving, whether
//! key-based encryption is preferred, and the selected key. Reading never
//! fails: a missing or unreadable file yields defaults. Writing is
//! best-effort; failures are logged and otherwise ignored.

use crate::keys::SelectedKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Values stored in the preference file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Directory of the last file written
    #[serde(default)]
    pub last_directory: Option<PathBuf>,
    /// Prefer key-based over passphrase-based encryption
    #[serde(default)]
    pub use_key_encryption: bool,
    /// The key selected for key-based encryption
    #[serde(default)]
    pub selected_key: Option<SelectedKey>,
}

/// A preference file and its loaded values.
///
/// # Examples
///
/// ```
/// use gpgpad::preferences::PreferenceStore;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("prefs.json");
///
/// let mut store = PreferenceStore::load(&path);
/// store.set_use_key_encryption(true);
///
/// let reloaded = PreferenceStore::load(&path);
/// assert!(reloaded.preferences().use_key_encryption);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Loads preferences from `path`, falling back to defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(
                        "Ignoring unreadable preference file {}: {}",
                        path.display(),
                        e
                    );
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No preference file at {}", path.display());
                Preferences::default()
            }
            Err(e) => {
                warn!("Could not read preference file {}: {}", path.display(), e);
                Preferences::default()
            }
        };

        Self { path, prefs }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Writes the current preferences to disk, logging any failure.
    pub fn save(&self) {
        if let Err(e) = self.try_save() {
            warn!(
                "Could not save preferences to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn try_save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.prefs).map_err(io::Error::other)?;
        fs::write(&self.path, json)
    }

    /// Remembers `dir` as the last save location and persists it.
    pub fn set_last_directory(&mut self, dir: impl Into<PathBuf>) {
        self.prefs.last_directory = Some(dir.into());
        self.save();
    }

    /// Remembers the directory containing `file`, if it has one.
    pub fn remember_directory_of(&mut self, file: &Path) {
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        if let Some(dir) = dir {
            let dir = fs::canonicalize(&dir).unwrap_or(dir);
            self.set_last_directory(dir);
        }
    }

    pub fn set_use_key_encryption(&mut self, enabled: bool) {
        self.prefs.use_key_encryption = enabled;
        self.save();
    }

    pub fn set_selected_key(&mut self, key: Option<SelectedKey>) {
        self.prefs.selected_key = key;
        self.save();
    }
}
