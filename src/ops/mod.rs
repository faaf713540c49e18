//! User-facing workflows built on the crypto core.
//!
//! These orchestrate the session, the key registry, backups, and the editor
//! the way the command-line front-end needs them.

pub mod backup;
pub mod edit;

use crate::constants::ENCRYPTED_FILE_EXTENSION;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use backup::{BackupManager, BackupRecord};
pub use edit::{edit_encrypted_file, EditOptions, EditOutcome};

/// Returns `path` with the encrypted-file extension appended if it is missing.
///
/// The extension is appended rather than substituted, so `notes.txt` becomes
/// `notes.txt.gpg`.
///
/// # Examples
///
/// ```
/// use gpgpad::ops::ensure_encrypted_extension;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     ensure_encrypted_extension(Path::new("notes.txt")),
///     PathBuf::from("notes.txt.gpg")
/// );
/// assert_eq!(
///     ensure_encrypted_extension(Path::new("notes.gpg")),
///     PathBuf::from("notes.gpg")
/// );
/// ```
pub fn ensure_encrypted_extension(path: &Path) -> PathBuf {
    let has_extension = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ENCRYPTED_FILE_EXTENSION));
    if has_extension {
        return path.to_path_buf();
    }

    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ENCRYPTED_FILE_EXTENSION);
    PathBuf::from(name)
}
