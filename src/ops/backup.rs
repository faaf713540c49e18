//! Timestamped backups of files about to be overwritten.
//!
//! Before an encrypted file is replaced, the previous version is renamed to
//! `<stem>_<YYYYMMDD>_<HHMMSS><ext>` next to it. Only the newest backups per
//! file are retained; older ones are pruned by the timestamp in their name.

use crate::constants::{BACKUP_TIMESTAMP_FORMAT, BACKUP_TIMESTAMP_LEN, DEFAULT_KEEP_BACKUPS};
use crate::errors::{AppError, AppResult};
use chrono::{Local, NaiveDateTime};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file that was moved aside before an overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// The path that was backed up (and no longer exists)
    pub original: PathBuf,
    /// Where the previous content now lives
    pub backup: PathBuf,
    /// Timestamp embedded in the backup name
    pub timestamp: NaiveDateTime,
    /// Older backups removed by retention
    pub pruned: Vec<PathBuf>,
}

/// Creates backups and enforces the retention count.
///
/// # Example
///
/// ```
/// use gpgpad::ops::BackupManager;
/// use std::fs;
///
/// let dir = tempfile::tempdir()?;
/// let file = dir.path().join("notes.txt.gpg");
/// fs::write(&file, "old ciphertext")?;
///
/// let record = BackupManager::default().backup_if_exists(&file)?.unwrap();
/// assert!(!file.exists());
/// assert!(record.backup.exists());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupManager {
    keep_backups: usize,
}

impl Default for BackupManager {
    fn default() -> Self {
        Self {
            keep_backups: DEFAULT_KEEP_BACKUPS,
        }
    }
}

impl BackupManager {
    /// Creates a manager that keeps the newest `keep_backups` backups per file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` if `keep_backups` is zero.
    pub fn new(keep_backups: usize) -> AppResult<Self> {
        if keep_backups == 0 {
            return Err(AppError::InvalidArgument(
                "at least one backup must be kept".to_string(),
            ));
        }
        Ok(Self { keep_backups })
    }

    pub fn keep_backups(&self) -> usize {
        self.keep_backups
    }

    /// Moves `path` aside if it exists, stamped with the current local time.
    ///
    /// Returns `None` and touches nothing when `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the rename fails or a backup with the same
    /// timestamp already exists, and `AppError::InvalidArgument` if `path`
    /// is a directory. Failures deleting old backups are only logged.
    pub fn backup_if_exists(&self, path: &Path) -> AppResult<Option<BackupRecord>> {
        self.backup_if_exists_at(path, Local::now().naive_local())
    }

    /// Like [`backup_if_exists`](Self::backup_if_exists) with an explicit timestamp.
    pub fn backup_if_exists_at(
        &self,
        path: &Path,
        now: NaiveDateTime,
    ) -> AppResult<Option<BackupRecord>> {
        match fs::symlink_metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Nothing to back up at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
            Ok(metadata) if metadata.is_dir() => {
                return Err(AppError::InvalidArgument(format!(
                    "{} is a directory, not a file",
                    path.display()
                )));
            }
            Ok(_) => {}
        }

        let naming = BackupNaming::for_path(path)?;
        let backup = naming.backup_path(now);
        if backup.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "backup {} already exists; wait a second and try again",
                    backup.display()
                ),
            )
            .into());
        }

        fs::rename(path, &backup)?;
        info!("Backed up {} to {}", path.display(), backup.display());

        let pruned = self.prune(&naming);
        Ok(Some(BackupRecord {
            original: path.to_path_buf(),
            backup,
            timestamp: now,
            pruned,
        }))
    }

    /// Deletes all but the newest `keep_backups` backups of one file.
    fn prune(&self, naming: &BackupNaming) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&naming.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list backups in {}: {}", naming.dir.display(), e);
                return Vec::new();
            }
        };

        let mut backups: Vec<(NaiveDateTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                naming
                    .parse_timestamp(&name)
                    .map(|timestamp| (timestamp, entry.path()))
            })
            .collect();

        if backups.len() <= self.keep_backups {
            return Vec::new();
        }

        backups.sort();
        let excess = backups.len() - self.keep_backups;
        let mut pruned = Vec::with_capacity(excess);
        for (_, old) in backups.into_iter().take(excess) {
            match fs::remove_file(&old) {
                Ok(()) => {
                    debug!("Deleted old backup {}", old.display());
                    pruned.push(old);
                }
                Err(e) => warn!("Failed to delete old backup {}: {}", old.display(), e),
            }
        }
        pruned
    }
}

/// How backups of one file are named.
#[derive(Debug)]
struct BackupNaming {
    dir: PathBuf,
    stem: String,
    extension: String,
}

impl BackupNaming {
    fn for_path(path: &Path) -> AppResult<Self> {
        let stem = path
            .file_stem()
            .and_then(OsStr::to_str)
            .ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "{} has no usable file name",
                    path.display()
                ))
            })?
            .to_string();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            dir,
            stem,
            extension,
        })
    }

    fn backup_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.dir.join(format!(
            "{}_{}{}",
            self.stem,
            timestamp.format(BACKUP_TIMESTAMP_FORMAT),
            self.extension
        ))
    }

    /// The timestamp of a sibling file name, if it names one of our backups.
    fn parse_timestamp(&self, name: &OsStr) -> Option<NaiveDateTime> {
        let name = name.to_str()?;
        let stamp = name
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('_')?
            .strip_suffix(self.extension.as_str())?;

        let well_formed = stamp.len() == BACKUP_TIMESTAMP_LEN
            && stamp.char_indices().all(|(i, c)| {
                if i == 8 {
                    c == '_'
                } else {
                    c.is_ascii_digit()
                }
            });
        if !well_formed {
            return None;
        }

        NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_absent_path_is_noop() {
        let dir = tempdir().unwrap();
        let result = BackupManager::default()
            .backup_if_exists(&dir.path().join("missing.gpg"))
            .unwrap();

        assert!(result.is_none());
        assert!(names_in(dir.path()).is_empty());
    }

    #[test]
    fn test_backup_renames_with_timestamp() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt.gpg");
        fs::write(&file, "v1").unwrap();

        let record = BackupManager::default()
            .backup_if_exists_at(&file, at(5, 14, 30, 9))
            .unwrap()
            .unwrap();

        assert!(!file.exists());
        assert_eq!(
            record.backup,
            dir.path().join("notes.txt_20240305_143009.gpg")
        );
        assert_eq!(fs::read_to_string(&record.backup).unwrap(), "v1");
        assert_eq!(record.original, file);
        assert!(record.pruned.is_empty());
    }

    #[test]
    fn test_retention_keeps_newest() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let manager = BackupManager::new(2).unwrap();

        for (i, day) in [1, 2, 3, 4].iter().enumerate() {
            fs::write(&file, format!("v{}", i)).unwrap();
            manager
                .backup_if_exists_at(&file, at(*day, 9, 0, 0))
                .unwrap()
                .unwrap();
        }

        assert_eq!(
            names_in(dir.path()),
            vec!["notes_20240303_090000.gpg", "notes_20240304_090000.gpg"]
        );
    }

    #[test]
    fn test_backup_count_after_each_write() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let manager = BackupManager::new(3).unwrap();

        for existing in 0..5usize {
            fs::write(&file, "data").unwrap();
            manager
                .backup_if_exists_at(&file, at(10, 8, 0, existing as u32))
                .unwrap();
            assert_eq!(names_in(dir.path()).len(), (existing + 1).min(3));
        }
    }

    #[test]
    fn test_pruning_orders_by_embedded_timestamp() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        // Created in reverse chronological order, so mtime disagrees with the name
        fs::write(dir.path().join("notes_20240309_000000.gpg"), "newer").unwrap();
        fs::write(dir.path().join("notes_20240301_000000.gpg"), "older").unwrap();
        fs::write(&file, "current").unwrap();

        let record = BackupManager::new(2)
            .unwrap()
            .backup_if_exists_at(&file, at(20, 0, 0, 0))
            .unwrap()
            .unwrap();

        assert_eq!(
            record.pruned,
            vec![dir.path().join("notes_20240301_000000.gpg")]
        );
        assert_eq!(
            names_in(dir.path()),
            vec!["notes_20240309_000000.gpg", "notes_20240320_000000.gpg"]
        );
    }

    #[test]
    fn test_unrelated_files_are_never_pruned() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let unrelated = [
            "notes_backup.gpg",
            "other_20200101_000000.gpg",
            "notes_20200101_000000.gpg.bak",
            "notes_2020010_000000.gpg",
            "notes_20200101-000000.gpg",
            "notes_20201399_000000.gpg",
            "notes.gpg.txt",
        ];
        for name in unrelated {
            fs::write(dir.path().join(name), "keep me").unwrap();
        }
        let manager = BackupManager::new(1).unwrap();

        for day in [1, 2, 3] {
            fs::write(&file, "data").unwrap();
            manager.backup_if_exists_at(&file, at(day, 0, 0, 0)).unwrap();
        }

        let names = names_in(dir.path());
        for name in unrelated {
            assert!(names.contains(&name.to_string()), "{} was removed", name);
        }
        assert!(names.contains(&"notes_20240303_000000.gpg".to_string()));
        assert!(!names.contains(&"notes_20240302_000000.gpg".to_string()));
    }

    #[test]
    fn test_same_second_collision_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let manager = BackupManager::default();
        let now = at(7, 12, 0, 0);

        fs::write(&file, "v1").unwrap();
        manager.backup_if_exists_at(&file, now).unwrap();
        fs::write(&file, "v2").unwrap();
        let result = manager.backup_if_exists_at(&file, now);

        match result {
            Err(AppError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("Expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(&file).unwrap(), "v2");
        assert_eq!(
            fs::read_to_string(dir.path().join("notes_20240307_120000.gpg")).unwrap(),
            "v1"
        );
    }

    #[test]
    fn test_file_without_extension() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("secrets");
        fs::write(&file, "data").unwrap();

        let record = BackupManager::default()
            .backup_if_exists_at(&file, at(1, 1, 1, 1))
            .unwrap()
            .unwrap();

        assert_eq!(record.backup, dir.path().join("secrets_20240301_010101"));
    }

    #[test]
    fn test_zero_retention_is_rejected() {
        assert!(matches!(
            BackupManager::new(0),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            BackupManager::default().backup_if_exists(dir.path()),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_timestamp() {
        let naming = BackupNaming::for_path(Path::new("/data/notes.txt.gpg")).unwrap();
        assert_eq!(naming.stem, "notes.txt");
        assert_eq!(naming.extension, ".gpg");
        assert_eq!(
            naming.parse_timestamp(OsStr::new("notes.txt_20240305_143009.gpg")),
            Some(at(5, 14, 30, 9))
        );
        assert_eq!(
            naming.parse_timestamp(OsStr::new("notes.txt_20240305_143009.gpg.gpg")),
            None
        );
        assert_eq!(
            naming.parse_timestamp(OsStr::new("notes.txt_+0240305_143009.gpg")),
            None
        );
    }
}
