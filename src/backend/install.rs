//! Installation helpers for the OpenPGP backend.
//!
//! The locator calls an [`Installer`] at most once when the backend cannot be
//! found. The shipped implementation shells out to a platform package manager;
//! asking the user for consent is the caller's job (see [`prompt_yes_no`]).

use crate::errors::BackendError;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

/// Installs the backend on the current machine.
pub trait Installer {
    /// Attempts the installation. Success means the backend may now be locatable.
    fn install(&self) -> Result<(), BackendError>;
}

/// Installs the backend by running a package manager command.
///
/// # Example
///
/// ```
/// use gpgpad::backend::PackageManagerInstaller;
///
/// let installer = PackageManagerInstaller::new("brew", ["install", "gnupg"]);
/// assert_eq!(installer.command_line(), "brew install gnupg");
/// ```
#[derive(Debug, Clone)]
pub struct PackageManagerInstaller {
    program: PathBuf,
    args: Vec<String>,
}

impl PackageManagerInstaller {
    /// Creates an installer that runs `program` with `args`.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The installer appropriate for this platform, if any.
    ///
    /// Only macOS (Homebrew) is supported.
    pub fn for_current_platform() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::new("brew", ["install", "gnupg"]))
        } else {
            None
        }
    }

    /// The command this installer runs, for display in consent prompts.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl Installer for PackageManagerInstaller {
    fn install(&self) -> Result<(), BackendError> {
        info!("Installing backend: {}", self.command_line());

        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|e| {
                BackendError::Install(format!(
                    "failed to run '{}': {}. Is the package manager installed?",
                    self.command_line(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(BackendError::Install(format!(
                "'{}' exited with status {}",
                self.command_line(),
                status.code().unwrap_or(-1)
            )));
        }

        debug!("Backend installation command finished");
        Ok(())
    }
}

/// Prompts the user for a yes/no answer with a default.
///
/// Reads from stdin and writes the prompt to stdout. End of input selects the
/// default.
pub fn prompt_yes_no(question: &str, default: bool) -> bool {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    ask_yes_no(&mut input, &mut output, question, default)
}

fn ask_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: bool,
) -> bool {
    let prompt = if default {
        format!("{} [Y/n] ", question)
    } else {
        format!("{} [y/N] ", question)
    };

    loop {
        let _ = write!(output, "{}", prompt);
        let _ = output.flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return default,
            Ok(_) => {}
        }

        match line.trim().to_lowercase().as_str() {
            "" => return default,
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => {
                let _ = writeln!(output, "Please answer yes or no.");
            }
        }
    }
}
