//! Secure scratch files with tmpfs preference.
//!
//! The backend reads and writes file paths, not streams, so plaintext has to
//! touch a filesystem for a short time. Scratch files live on a RAM-backed
//! filesystem when one is available, are readable only by the owner, and are
//! overwritten and removed when the enclosing scope ends, whether it returns
//! `Ok`, returns `Err`, or panics.

use crate::constants::{SCRATCH_FILE_PREFIX, SCRATCH_FILE_SUFFIX, TMPFS_PATHS};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

/// Get a secure temporary directory, preferring tmpfs when available.
///
/// On Linux/BSD systems this prefers RAM-based filesystems (`/dev/shm` or
/// `/run/shm`). Otherwise it falls back to the system temp directory.
///
/// # Example
///
/// ```
/// use gpgpad::crypto::secure_temp_dir;
///
/// let dir = secure_temp_dir();
/// assert!(dir.is_dir());
/// ```
pub fn secure_temp_dir() -> PathBuf {
    for candidate in TMPFS_PATHS {
        let path = Path::new(candidate);
        let usable = fs::metadata(path)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        if usable {
            return path.to_path_buf();
        }
    }

    debug!("No tmpfs available; scratch files use the system temp directory");
    env::temp_dir()
}

/// Runs `body` with the path of a fresh scratch file in [`secure_temp_dir`].
///
/// When `initial` is given the file starts with that content; otherwise it is
/// empty and can serve as an output target. The file is gone once this
/// function returns.
///
/// # Errors
///
/// Returns an error if the scratch file cannot be created or removed, or
/// whatever error `body` returns.
///
/// # Example
///
/// ```
/// use gpgpad::crypto::with_scratch_file;
/// use std::fs;
///
/// let mut seen = None;
/// let content = with_scratch_file(Some(b"draft".as_slice()), |path| {
///     seen = Some(path.to_path_buf());
///     fs::read(path)
/// })?;
/// assert_eq!(content, b"draft");
/// assert!(!seen.unwrap().exists());
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn with_scratch_file<T, E, F>(initial: Option<&[u8]>, body: F) -> Result<T, E>
where
    F: FnOnce(&Path) -> Result<T, E>,
    E: From<io::Error>,
{
    with_scratch_file_in(&secure_temp_dir(), initial, body)
}

/// Like [`with_scratch_file`], but creates the file in `dir`.
pub fn with_scratch_file_in<T, E, F>(dir: &Path, initial: Option<&[u8]>, body: F) -> Result<T, E>
where
    F: FnOnce(&Path) -> Result<T, E>,
    E: From<io::Error>,
{
    let scratch = ScratchFile::create(dir, initial)?;
    // On error the body's failure wins; Drop cleans up and logs
    let value = body(scratch.path())?;
    scratch.finish()?;
    Ok(value)
}

/// An owned scratch file that is wiped and deleted when dropped.
struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    fn create(dir: &Path, initial: Option<&[u8]>) -> io::Result<Self> {
        let mut file = Builder::new()
            .prefix(SCRATCH_FILE_PREFIX)
            .suffix(SCRATCH_FILE_SUFFIX)
            .tempfile_in(dir)?;

        // Owner-only access
        #[cfg(unix)]
        {
            use crate::constants::DEFAULT_FILE_PERMISSIONS;
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(DEFAULT_FILE_PERMISSIONS))?;
        }

        if let Some(content) = initial {
            file.write_all(content)?;
            file.flush()?;
        }

        // Close the handle so the backend can open the path itself
        let path = file.into_temp_path();
        debug!("Created scratch file");
        Ok(Self { path: Some(path) })
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Wipes and removes the file, reporting removal failures.
    fn finish(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => {
                wipe(&path);
                path.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            wipe(&path);
            if let Err(e) = path.close() {
                warn!("Failed to remove scratch file: {}", e);
            }
        }
    }
}

/// Best-effort overwrite with zeros before removal.
///
/// This is not cryptographically secure (SSD wear leveling, filesystem
/// journals), but better than plain deletion.
fn wipe(path: &Path) {
    let len = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return,
    };
    if len == 0 {
        return;
    }

    let result = OpenOptions::new().write(true).open(path).and_then(|mut file| {
        let zeros = vec![0u8; 8192];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(zeros.len() as u64) as usize;
            file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        file.sync_all()
    });
    if let Err(e) = result {
        debug!("Could not overwrite scratch file before removal: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use tempfile::tempdir;

    #[test]
    fn test_secure_temp_dir_exists() {
        let dir = secure_temp_dir();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_scratch_file_removed_after_success() {
        let dir = tempdir().unwrap();
        let mut seen = None;

        let content: Vec<u8> = with_scratch_file_in(dir.path(), Some(b"plaintext"), |path| {
            seen = Some(path.to_path_buf());
            fs::read(path)
        })
        .unwrap();

        assert_eq!(content, b"plaintext");
        let path = seen.unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_file_starts_empty_without_initial_content() {
        let dir = tempdir().unwrap();
        let len = with_scratch_file_in(dir.path(), None, |path| {
            fs::metadata(path).map(|m| m.len())
        })
        .unwrap();
        assert_eq!(len, 0);
    }

    #[test]
    fn test_scratch_file_removed_after_error() {
        let dir = tempdir().unwrap();
        let mut seen = None;

        let result: Result<(), io::Error> = with_scratch_file_in(dir.path(), Some(b"x"), |path| {
            seen = Some(path.to_path_buf());
            Err(io::Error::other("backend failed"))
        });

        assert_eq!(result.unwrap_err().to_string(), "backend failed");
        assert!(!seen.unwrap().exists());
    }

    #[test]
    fn test_scratch_file_removed_after_panic() {
        let dir = tempdir().unwrap();
        let mut seen = None;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), io::Error> = with_scratch_file_in(dir.path(), Some(b"x"), |path| {
                seen = Some(path.to_path_buf());
                panic!("editor crashed");
            });
        }));

        assert!(outcome.is_err());
        assert!(!seen.unwrap().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_file_name_uses_prefix() {
        let dir = tempdir().unwrap();
        let name = with_scratch_file_in(dir.path(), None, |path| {
            Ok::<_, io::Error>(path.file_name().unwrap().to_string_lossy().into_owned())
        })
        .unwrap();
        assert!(name.starts_with(SCRATCH_FILE_PREFIX));
        assert!(name.ends_with(SCRATCH_FILE_SUFFIX));
    }

    #[cfg(unix)]
    #[test]
    fn test_scratch_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let mode = with_scratch_file_in(dir.path(), Some(b"secret"), |path| {
            fs::metadata(path).map(|m| m.permissions().mode() & 0o777)
        })
        .unwrap();
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_wipe_zeroes_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wipe-me");
        fs::write(&path, b"very secret").unwrap();

        wipe(&path);

        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 11]);
    }
}
