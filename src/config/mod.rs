//! Configuration management for the gpgpad application.
//!
//! This module handles loading and validating configuration settings from environment
//! variables, with sensible defaults. It covers how the OpenPGP backend is found and
//! run, backup retention, the preference file location, and the editor used by
//! `gpgpad edit`.
//!
//! # Environment Variables
//!
//! - `GPGPAD_GPG`: Explicit path to the backend executable, checked before searching
//! - `GPGPAD_HOMEDIR`: Key storage directory passed to the backend as `--homedir`
//! - `GPGPAD_TIMEOUT_SECS`: Per-invocation backend timeout (defaults to 120, `0` disables it)
//! - `GPGPAD_KEEP_BACKUPS`: Backups kept per file (defaults to 2)
//! - `GPGPAD_PREFS`: Preference file (defaults to ~/.gpgpad.json)
//! - `GPGPAD_EDITOR`: Editor used for editing decrypted content
//! - `EDITOR`: Fallback editor if GPGPAD_EDITOR is not set (defaults to "vim")
//! - `GPGPAD_REUSE_PASSPHRASE`: Reuse the decryption passphrase when re-encrypting (defaults to true)

use crate::constants::{
    DEFAULT_BACKEND_TIMEOUT_SECS, DEFAULT_EDITOR_COMMAND, DEFAULT_KEEP_BACKUPS, DEFAULT_PREFS_FILE,
    EDITOR_FORBIDDEN_CHARS, ENV_VAR_EDITOR, ENV_VAR_GPGPAD_EDITOR, ENV_VAR_GPGPAD_GPG,
    ENV_VAR_GPGPAD_HOMEDIR, ENV_VAR_GPGPAD_KEEP_BACKUPS, ENV_VAR_GPGPAD_PREFS,
    ENV_VAR_GPGPAD_REUSE_PASSPHRASE, ENV_VAR_GPGPAD_TIMEOUT_SECS, REDACTED_PLACEHOLDER,
};
use crate::crypto::PassphrasePolicy;
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the gpgpad application.
///
/// # Examples
///
/// Creating a configuration manually:
/// ```
/// use gpgpad::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     editor: "nano".to_string(),
///     prefs_path: PathBuf::from("/home/user/.gpgpad.json"),
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
///
/// Loading configuration from environment variables:
/// ```no_run
/// use gpgpad::Config;
/// use std::env;
///
/// env::set_var("GPGPAD_EDITOR", "nano");
/// env::set_var("GPGPAD_KEEP_BACKUPS", "5");
///
/// let config = Config::load().expect("Failed to load configuration");
/// assert_eq!(config.editor, "nano");
/// assert_eq!(config.keep_backups, 5);
/// ```
#[derive(Clone)]
pub struct Config {
    /// Editor command used to edit decrypted content.
    ///
    /// Loaded from GPGPAD_EDITOR, then EDITOR, defaulting to "vim".
    pub editor: String,

    /// Key storage directory for the backend; `None` uses the backend's default.
    pub homedir: Option<PathBuf>,

    /// Backend executable to try before searching PATH and known locations.
    pub backend_override: Option<PathBuf>,

    /// Deadline for a single backend invocation; `None` waits indefinitely.
    pub backend_timeout: Option<Duration>,

    /// Number of backups retained per file. Must be at least 1.
    pub keep_backups: usize,

    /// Location of the JSON preference file.
    pub prefs_path: PathBuf,

    /// Whether re-encryption after an edit reuses the decryption passphrase.
    pub reuse_passphrase: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact_path = |p: &Option<PathBuf>| p.as_ref().map(|_| REDACTED_PLACEHOLDER);
        f.debug_struct("Config")
            .field("editor", &"[REDACTED_COMMAND]")
            .field("homedir", &redact_path(&self.homedir))
            .field("backend_override", &redact_path(&self.backend_override))
            .field("backend_timeout", &self.backend_timeout)
            .field("keep_backups", &self.keep_backups)
            .field("prefs_path", &"[REDACTED_PATH]")
            .field("reuse_passphrase", &self.reuse_passphrase)
            .finish()
    }
}

impl Default for Config {
    /// Creates a new Config with default values and an empty preference path.
    fn default() -> Self {
        Config {
            editor: DEFAULT_EDITOR_COMMAND.to_string(),
            homedir: None,
            backend_override: None,
            backend_timeout: Some(Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS)),
            keep_backups: DEFAULT_KEEP_BACKUPS,
            prefs_path: PathBuf::new(),
            reuse_passphrase: true,
        }
    }
}

impl Config {
    /// Validates an editor command string for security.
    ///
    /// This function checks that the editor command:
    /// - Is not empty
    /// - Contains no shell metacharacters
    /// - Contains no spaces
    fn validate_editor_command(editor_cmd: &str) -> AppResult<&str> {
        if editor_cmd.is_empty() {
            return Err(AppError::Config(
                "Editor command cannot be empty".to_string(),
            ));
        }

        if editor_cmd.contains(' ') {
            return Err(AppError::Config(
                "Editor command cannot contain spaces. Use a wrapper script or shell alias for editors requiring arguments".to_string(),
            ));
        }

        for &ch in EDITOR_FORBIDDEN_CHARS.iter() {
            if editor_cmd.contains(ch) {
                return Err(AppError::Config(format!(
                    "Editor command cannot contain shell metacharacters: '{}'. Use a wrapper script or shell alias instead",
                    ch
                )));
            }
        }

        Ok(editor_cmd)
    }

    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// Paths are expanded with `shellexpand`, so `~` and `$VAR` references work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - A path expansion fails
    /// - The editor command fails validation (empty, contains spaces or shell metacharacters)
    /// - A numeric or boolean variable cannot be parsed
    /// - The loaded values fail [`Config::validate`]
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gpgpad::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Keeping {} backups", config.keep_backups),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let editor_raw = env::var(ENV_VAR_GPGPAD_EDITOR)
            .or_else(|_| env::var(ENV_VAR_EDITOR))
            .unwrap_or_else(|_| DEFAULT_EDITOR_COMMAND.to_string());
        let editor = Config::validate_editor_command(&editor_raw)?.to_string();

        let homedir = optional_path(ENV_VAR_GPGPAD_HOMEDIR)?;
        let backend_override = optional_path(ENV_VAR_GPGPAD_GPG)?;

        let backend_timeout = match non_empty_var(ENV_VAR_GPGPAD_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    AppError::Config(format!(
                        "{} must be a whole number of seconds, got '{}'",
                        ENV_VAR_GPGPAD_TIMEOUT_SECS, raw
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => Some(Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS)),
        };

        let keep_backups = match non_empty_var(ENV_VAR_GPGPAD_KEEP_BACKUPS) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::Config(format!(
                    "{} must be a positive whole number, got '{}'",
                    ENV_VAR_GPGPAD_KEEP_BACKUPS, raw
                ))
            })?,
            None => DEFAULT_KEEP_BACKUPS,
        };

        let prefs_raw =
            non_empty_var(ENV_VAR_GPGPAD_PREFS).unwrap_or_else(|| DEFAULT_PREFS_FILE.to_string());
        let prefs_path = expand_path(&prefs_raw)?;

        let reuse_passphrase = match non_empty_var(ENV_VAR_GPGPAD_REUSE_PASSPHRASE) {
            Some(raw) => parse_bool(ENV_VAR_GPGPAD_REUSE_PASSPHRASE, &raw)?,
            None => true,
        };

        let config = Config {
            editor,
            homedir,
            backend_override,
            backend_timeout,
            keep_backups,
            prefs_path,
            reuse_passphrase,
        };
        config.validate()?;

        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` with one of the following messages:
    /// - "Editor command is empty" if the editor is empty
    /// - "Backup retention must be at least 1" if `keep_backups` is 0
    /// - "Preference file path is empty" if `prefs_path` is empty
    /// - "Backend homedir path is empty" if `homedir` is set but empty
    ///
    /// # Examples
    ///
    /// ```
    /// use gpgpad::Config;
    /// use std::path::PathBuf;
    ///
    /// let invalid_config = Config {
    ///     keep_backups: 0,
    ///     prefs_path: PathBuf::from("/home/user/.gpgpad.json"),
    ///     ..Config::default()
    /// };
    /// assert!(invalid_config.validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        if self.editor.is_empty() {
            return Err(AppError::Config("Editor command is empty".to_string()));
        }

        if self.keep_backups == 0 {
            return Err(AppError::Config(
                "Backup retention must be at least 1".to_string(),
            ));
        }

        if self.prefs_path.as_os_str().is_empty() {
            return Err(AppError::Config(
                "Preference file path is empty".to_string(),
            ));
        }

        if self
            .homedir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(AppError::Config(
                "Backend homedir path is empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The re-encryption policy selected by `reuse_passphrase`.
    pub fn passphrase_policy(&self) -> PassphrasePolicy {
        PassphrasePolicy {
            reuse_on_modify: self.reuse_passphrase,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn optional_path(name: &str) -> AppResult<Option<PathBuf>> {
    non_empty_var(name).map(|raw| expand_path(&raw)).transpose()
}

fn expand_path(raw: &str) -> AppResult<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

fn parse_bool(name: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{} must be true or false, got '{}'",
            name, raw
        ))),
    }
}
