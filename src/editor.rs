//! Editor abstraction for modifying decrypted content.
//!
//! The edit workflow writes plaintext to a scratch file and hands its path to
//! an [`Editor`]. Keeping this behind a trait lets the workflow be tested with
//! an editor that rewrites the file in-process.

use crate::errors::{AppError, AppResult, EditorError};
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Trait defining the interface for an editor component.
///
/// # Examples
///
/// ```
/// use gpgpad::editor::Editor;
/// use gpgpad::errors::AppResult;
/// use std::path::Path;
///
/// struct AppendingEditor;
///
/// impl Editor for AppendingEditor {
///     fn open(&self, path: &Path) -> AppResult<()> {
///         let mut text = std::fs::read_to_string(path)?;
///         text.push_str("\nsigned");
///         std::fs::write(path, text)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Editor {
    /// Opens `path` and returns once the user has finished editing it.
    ///
    /// # Errors
    ///
    /// Implementations return `AppError::Editor` when the editor cannot be
    /// started or reports failure; the file's content is then not trusted.
    fn open(&self, path: &Path) -> AppResult<()>;
}

/// An editor launched as an external command, e.g. `vim` or `nano`.
///
/// # Examples
///
/// ```no_run
/// use gpgpad::editor::{Editor, SystemEditor};
/// use std::path::Path;
///
/// let editor = SystemEditor::new("vim");
/// editor.open(Path::new("/dev/shm/gpgpad-draft.tmp"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    /// Creates an editor that runs `command <path>`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Editor for SystemEditor {
    fn open(&self, path: &Path) -> AppResult<()> {
        debug!("Launching editor: {}", self.command);

        let status = Command::new(&self.command)
            .arg(path)
            .status()
            .map_err(|e| launch_error(&self.command, e))?;

        if !status.success() {
            return Err(AppError::Editor(EditorError::NonZeroExit {
                command: self.command.clone(),
                status_code: status.code().unwrap_or(-1),
            }));
        }

        Ok(())
    }
}

fn launch_error(command: &str, source: io::Error) -> AppError {
    let command = command.to_string();
    let error = match source.kind() {
        io::ErrorKind::NotFound => EditorError::CommandNotFound { command, source },
        io::ErrorKind::PermissionDenied => EditorError::PermissionDenied { command, source },
        _ => EditorError::ExecutionFailed { command, source },
    };
    AppError::Editor(error)
}
