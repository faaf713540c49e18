//! Error handling utilities for the gpgpad application.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, as well as the
//! convenience type alias `AppResult` for functions that can return these errors.
//!
//! The backend layer (`BackendError`) is internal: the key registry and the
//! crypto session translate non-zero backend exits into `KeyError` and
//! `CryptoError` values whose messages never carry backend output.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised while locating, installing, or running the OpenPGP backend.
///
/// # Examples
///
/// ```
/// use gpgpad::errors::BackendError;
///
/// let error = BackendError::Execution {
///     exit_code: 2,
///     stderr: "gpg: decryption failed: Bad session key".to_string(),
/// };
///
/// // The raw backend output is kept for diagnostics but never displayed.
/// let message = format!("{}", error);
/// assert!(message.contains("2"));
/// assert!(!message.contains("Bad session key"));
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend executable could not be found, even after an install attempt.
    #[error("OpenPGP backend not found (searched: {}). Install GnuPG or set GPGPAD_GPG to the gpg executable.", format_searched(.searched))]
    Unavailable {
        /// Locations that were checked
        searched: Vec<PathBuf>,
    },

    /// The backend process could not be started.
    #[error("Failed to start backend '{program}': {source}. Please check that the executable is accessible.")]
    Spawn {
        /// The executable that failed to start
        program: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The backend ran and exited with a non-zero status.
    #[error("Backend exited with non-zero status code: {exit_code}")]
    Execution {
        /// Exit status, or -1 when the process was terminated by a signal
        exit_code: i32,
        /// Captured standard error, for diagnostics only
        stderr: String,
    },

    /// The backend did not finish within the configured timeout.
    #[error("Backend did not finish within {} seconds and was terminated. Try again or raise GPGPAD_TIMEOUT_SECS.", .after.as_secs())]
    Timeout {
        /// The timeout that was exceeded
        after: Duration,
    },

    /// The installation helper failed.
    #[error("Backend installation failed: {0}")]
    Install(String),
}

fn format_searched(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "PATH".to_string();
    }
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures of key registry operations.
///
/// Every mutating operation has its own variant so callers can tell which step
/// failed without looking at backend output.
///
/// # Examples
///
/// ```
/// use gpgpad::errors::KeyError;
///
/// let error = KeyError::NotFound {
///     fingerprint: "ABCD".to_string(),
/// };
/// assert!(format!("{}", error).contains("ABCD"));
/// ```
#[derive(Debug, Error)]
pub enum KeyError {
    /// The secret key listing could not be produced.
    #[error("Failed to list secret keys: {0}")]
    Listing(String),

    /// Key generation failed.
    #[error("Failed to create key: {0}")]
    Creation(String),

    /// Removing key material failed.
    #[error("Failed to delete key {fingerprint}: {reason}")]
    Deletion {
        /// The key being deleted
        fingerprint: String,
        /// What went wrong
        reason: String,
    },

    /// Importing a key archive failed.
    #[error("Failed to import key: {0}. Check the key file and its passphrase.")]
    Import(String),

    /// Exporting secret key material failed.
    #[error("Failed to export key {fingerprint}: {reason}. Check the passphrase.")]
    Export {
        /// The key being exported
        fingerprint: String,
        /// What went wrong
        reason: String,
    },

    /// The fingerprint is not in the current key list.
    #[error("No secret key with fingerprint {fingerprint}. Refresh the key list and try again.")]
    NotFound {
        /// The fingerprint that was looked up
        fingerprint: String,
    },
}

/// Represents specific error cases that can occur during cryptographic operations.
///
/// # Examples
///
/// ```
/// use gpgpad::errors::CryptoError;
///
/// let error = CryptoError::DecryptionFailed { exit_code: 2 };
/// let message = format!("{}", error);
/// assert!(message.contains("passphrase"));
/// ```
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption by the backend failed.
    #[error("Encryption failed (backend status {exit_code}). Check the output location and the selected key.")]
    EncryptionFailed {
        /// Backend exit status
        exit_code: i32,
    },

    /// Decryption by the backend failed; usually a wrong passphrase.
    #[error("Decryption failed (backend status {exit_code}). Is the passphrase correct?")]
    DecryptionFailed {
        /// Backend exit status
        exit_code: i32,
    },

    /// An empty passphrase was entered.
    #[error("Passphrase cannot be empty")]
    EmptyPassphrase,

    /// The passphrase and its confirmation differ.
    #[error("Passphrases do not match. Please try again.")]
    PassphraseMismatch,

    /// Reading a passphrase from the terminal failed.
    #[error("Failed to read passphrase: {0}")]
    PassphrasePrompt(String),
}

/// Represents specific error cases that can occur when interacting with external editors.
///
/// # Examples
///
/// ```
/// use gpgpad::errors::EditorError;
///
/// let error = EditorError::NonZeroExit {
///     command: "vim".to_string(),
///     status_code: 1,
/// };
///
/// assert!(format!("{}", error).contains("non-zero status code"));
/// assert!(format!("{}", error).contains("vim"));
/// ```
#[derive(Debug, Error)]
pub enum EditorError {
    /// Error when the specified editor command cannot be found.
    #[error("Editor command '{command}' not found: {source}. Please check that the editor is installed and available in your PATH.")]
    CommandNotFound {
        /// The editor command that was not found
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when permission is denied to execute the editor command.
    #[error("Permission denied when trying to execute editor '{command}': {source}. Please check file permissions or try running with appropriate access rights.")]
    PermissionDenied {
        /// The editor command that had permission denied
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when the editor command fails to execute due to other I/O errors.
    #[error("Failed to execute editor '{command}': {source}. Please check system resources or editor installation.")]
    ExecutionFailed {
        /// The editor command that failed to execute
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when the editor exits with a non-zero status code.
    #[error("Editor '{command}' exited with non-zero status code: {status_code}. Changes were not saved.")]
    NonZeroExit {
        /// The editor command that exited with a non-zero status
        command: String,
        /// The exit status code
        status_code: i32,
    },
}

/// Represents all possible errors that can occur in the gpgpad application.
///
/// Note: This type does not implement `Clone` to avoid losing error context when
/// cloning `std::io::Error` values.
///
/// # Examples
///
/// ```
/// use gpgpad::errors::AppError;
///
/// let error = AppError::InvalidArgument("no file path".to_string());
/// assert_eq!(format!("{}", error), "Invalid argument: no file path");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    ///
    /// This variant automatically converts from `std::io::Error` through the `From` trait.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input was missing or malformed; detected before the backend runs.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Errors locating or running the backend that have no domain translation.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Errors from key registry operations.
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Errors from encryption and decryption.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Errors when interacting with the text editor.
    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
///
/// # Examples
///
/// ```
/// use gpgpad::errors::{AppResult, AppError};
///
/// fn needs_path(path: &str) -> AppResult<&str> {
///     if path.is_empty() {
///         return Err(AppError::InvalidArgument("file path is required".to_string()));
///     }
///     Ok(path)
/// }
/// assert!(needs_path("").is_err());
/// ```
pub type AppResult<T> = Result<T, AppError>;
