//! Access to the external OpenPGP backend.
//!
//! This module finds the backend executable and runs it as a subprocess. The
//! rest of the crate talks to the backend only through the [`Backend`] trait,
//! which lets the key registry and the crypto session be exercised against an
//! in-memory fake in tests.
//!
//! # Module Structure
//!
//! - `locator`: finds the executable on `PATH` or in known install locations
//! - `install`: optional package-manager installation of the backend
//! - `runner`: non-interactive subprocess execution with timeouts

#[cfg(test)]
pub(crate) mod fake;
pub mod install;
pub mod locator;
pub mod runner;

pub use self::install::{Installer, PackageManagerInstaller};
pub use self::locator::BackendLocator;
pub use self::runner::ProcessRunner;

use crate::errors::BackendError;
use std::ffi::OsString;

/// Captured result of a successful backend invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOutput {
    /// Everything the backend wrote to stdout
    pub stdout: Vec<u8>,
    /// Everything the backend wrote to stderr
    pub stderr: Vec<u8>,
    /// Exit status (always zero for a returned output)
    pub exit_code: i32,
}

impl BackendOutput {
    /// Stdout decoded as UTF-8, replacing invalid sequences.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Something that can run the OpenPGP backend.
///
/// Implementations always run the backend non-interactively. A non-zero exit
/// is reported as [`BackendError::Execution`]; callers must not inspect stderr
/// beyond that distinction.
pub trait Backend {
    /// Runs the backend with `args`, optionally feeding `stdin`.
    fn run(&self, args: &[OsString], stdin: Option<&[u8]>) -> Result<BackendOutput, BackendError>;

    /// Asks the backend's agent to forget cached secrets.
    ///
    /// The default does nothing, for backends without an agent.
    fn reset_agent_cache(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for &B {
    fn run(&self, args: &[OsString], stdin: Option<&[u8]>) -> Result<BackendOutput, BackendError> {
        (**self).run(args, stdin)
    }

    fn reset_agent_cache(&self) -> Result<(), BackendError> {
        (**self).reset_agent_cache()
    }
}

/// Builds an owned argument vector from string-like pieces.
///
/// ```
/// use gpgpad::backend::args;
/// use std::path::Path;
///
/// let argv = args(["--output", "out.gpg"]);
/// assert_eq!(argv.len(), 2);
/// let mixed = args([Path::new("a").as_os_str(), Path::new("b").as_os_str()]);
/// assert_eq!(mixed[1], "b");
/// ```
pub fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}
