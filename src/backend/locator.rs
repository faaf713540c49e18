//! Locating the OpenPGP backend executable.

use crate::backend::Installer;
use crate::constants::BACKEND_PROGRAM;
use crate::errors::BackendError;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Well-known installation locations of the backend on this platform.
pub fn known_locations() -> Vec<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/bin/gpg",
            "/usr/local/bin/gpg",
            "/usr/local/MacGPG2/bin/gpg",
        ]
    } else if cfg!(windows) {
        &[
            r"C:\Program Files (x86)\GnuPG\bin\gpg.exe",
            r"C:\Program Files\GnuPG\bin\gpg.exe",
        ]
    } else {
        &["/usr/bin/gpg", "/usr/local/bin/gpg", "/bin/gpg"]
    };
    candidates.iter().map(PathBuf::from).collect()
}

/// Finds the backend executable, optionally installing it once.
///
/// Search order: an explicitly configured path, each directory of the search
/// path (`PATH` by default), then the platform's known install locations.
///
/// # Example
///
/// ```no_run
/// use gpgpad::backend::BackendLocator;
///
/// let gpg = BackendLocator::new().locate()?;
/// println!("Using backend at {}", gpg.display());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct BackendLocator {
    program_name: String,
    explicit: Option<PathBuf>,
    search_path: Option<OsString>,
    known_locations: Vec<PathBuf>,
    installer: Option<Box<dyn Installer>>,
}

impl Default for BackendLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendLocator {
    /// A locator for the platform's backend using `PATH` and the known locations.
    pub fn new() -> Self {
        Self {
            program_name: BACKEND_PROGRAM.to_string(),
            explicit: None,
            search_path: None,
            known_locations: known_locations(),
            installer: None,
        }
    }

    /// Checks `path` before anything else.
    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    /// Uses `search_path` instead of the process `PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Replaces the list of known install locations.
    pub fn with_known_locations(mut self, locations: Vec<PathBuf>) -> Self {
        self.known_locations = locations;
        self
    }

    /// Installs the backend if it cannot be found.
    pub fn with_installer(mut self, installer: Box<dyn Installer>) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Returns the path of the backend executable.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the executable is not found and
    /// no installer is configured, or the single installation attempt did not
    /// make it locatable.
    pub fn locate(&self) -> Result<PathBuf, BackendError> {
        let (found, searched) = self.search();
        if let Some(path) = found {
            debug!("Backend found at {}", path.display());
            return Ok(path);
        }

        let Some(installer) = &self.installer else {
            return Err(BackendError::Unavailable { searched });
        };

        info!("Backend not found; attempting installation");
        if let Err(e) = installer.install() {
            warn!("Backend installation failed: {}", e);
            return Err(BackendError::Unavailable { searched });
        }

        match self.search() {
            (Some(path), _) => {
                info!("Backend installed at {}", path.display());
                Ok(path)
            }
            (None, searched) => Err(BackendError::Unavailable { searched }),
        }
    }

    fn search(&self) -> (Option<PathBuf>, Vec<PathBuf>) {
        let mut searched = Vec::new();

        if let Some(explicit) = &self.explicit {
            searched.push(explicit.clone());
            if is_executable(explicit) {
                return (Some(explicit.clone()), searched);
            }
            warn!(
                "Configured backend {} is not an executable file; searching instead",
                explicit.display()
            );
        }

        let path_var = self
            .search_path
            .clone()
            .or_else(|| env::var_os("PATH"))
            .unwrap_or_default();
        for dir in env::split_paths(&path_var) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let candidate = dir.join(&self.program_name);
            if is_executable(&candidate) {
                return (Some(candidate), searched);
            }
        }

        for candidate in &self.known_locations {
            searched.push(candidate.clone());
            if is_executable(candidate) {
                return (Some(candidate.clone()), searched);
            }
        }

        (None, searched)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn make_executable(path: &Path) {
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    struct CountingInstaller {
        target: Option<PathBuf>,
        calls: Rc<Cell<usize>>,
    }

    impl Installer for CountingInstaller {
        fn install(&self) -> Result<(), BackendError> {
            self.calls.set(self.calls.get() + 1);
            match &self.target {
                Some(path) => {
                    make_executable(path);
                    Ok(())
                }
                None => Err(BackendError::Install("no package manager".to_string())),
            }
        }
    }

    #[test]
    fn test_locate_on_search_path() {
        let dir = tempdir().unwrap();
        let gpg = dir.path().join(BACKEND_PROGRAM);
        make_executable(&gpg);

        let locator = BackendLocator::new()
            .with_search_path(dir.path().as_os_str())
            .with_known_locations(vec![]);

        assert_eq!(locator.locate().unwrap(), gpg);
    }

    #[test]
    fn test_non_executable_file_is_skipped() {
        let dir = tempdir().unwrap();
        let gpg = dir.path().join(BACKEND_PROGRAM);
        fs::write(&gpg, "not a program").unwrap();
        fs::set_permissions(&gpg, fs::Permissions::from_mode(0o644)).unwrap();

        let locator = BackendLocator::new()
            .with_search_path(dir.path().as_os_str())
            .with_known_locations(vec![]);

        assert!(matches!(
            locator.locate(),
            Err(BackendError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_known_location_fallback() {
        let empty = tempdir().unwrap();
        let install_dir = tempdir().unwrap();
        let gpg = install_dir.path().join("gpg");
        make_executable(&gpg);

        let locator = BackendLocator::new()
            .with_search_path(empty.path().as_os_str())
            .with_known_locations(vec![install_dir.path().join("missing"), gpg.clone()]);

        assert_eq!(locator.locate().unwrap(), gpg);
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempdir().unwrap();
        let explicit = dir.path().join("custom-gpg");
        make_executable(&explicit);
        let on_path = dir.path().join(BACKEND_PROGRAM);
        make_executable(&on_path);

        let locator = BackendLocator::new()
            .with_explicit_path(Some(explicit.clone()))
            .with_search_path(dir.path().as_os_str());

        assert_eq!(locator.locate().unwrap(), explicit);
    }

    #[test]
    fn test_unavailable_reports_searched_locations() {
        let empty = tempdir().unwrap();
        let missing = empty.path().join("gpg-missing");

        let locator = BackendLocator::new()
            .with_search_path(empty.path().as_os_str())
            .with_known_locations(vec![missing.clone()]);

        match locator.locate() {
            Err(BackendError::Unavailable { searched }) => assert_eq!(searched, vec![missing]),
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_installer_runs_once_then_retries() {
        let empty = tempdir().unwrap();
        let install_dir = tempdir().unwrap();
        let gpg = install_dir.path().join("gpg");
        let calls = Rc::new(Cell::new(0));

        let locator = BackendLocator::new()
            .with_search_path(empty.path().as_os_str())
            .with_known_locations(vec![gpg.clone()])
            .with_installer(Box::new(CountingInstaller {
                target: Some(gpg.clone()),
                calls: Rc::clone(&calls),
            }));

        assert_eq!(locator.locate().unwrap(), gpg);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_install_is_unavailable() {
        let empty = tempdir().unwrap();
        let calls = Rc::new(Cell::new(0));

        let locator = BackendLocator::new()
            .with_search_path(empty.path().as_os_str())
            .with_known_locations(vec![])
            .with_installer(Box::new(CountingInstaller {
                target: None,
                calls: Rc::clone(&calls),
            }));

        assert!(matches!(
            locator.locate(),
            Err(BackendError::Unavailable { .. })
        ));
        assert_eq!(calls.get(), 1);
    }
}
