//! Constants used throughout the application.
//!
//! This module contains all constants used in gpgpad, organized into logical
//! groups. Having constants centralized makes them easier to find, modify, and
//! reference consistently.

// Application Metadata
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str =
    "Encrypt, decrypt, and manage OpenPGP keys through the gpg command-line tool";

// CLI Arguments & Defaults
/// Default command for the editor if not specified otherwise.
pub const DEFAULT_EDITOR_COMMAND: &str = "vim";
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Configuration Keys & Environment Variables
/// Environment variable pointing at an explicit backend executable.
pub const ENV_VAR_GPGPAD_GPG: &str = "GPGPAD_GPG";
/// Environment variable for the backend's key storage directory.
pub const ENV_VAR_GPGPAD_HOMEDIR: &str = "GPGPAD_HOMEDIR";
/// Environment variable for the per-invocation backend timeout in seconds.
pub const ENV_VAR_GPGPAD_TIMEOUT_SECS: &str = "GPGPAD_TIMEOUT_SECS";
/// Environment variable for the number of backups kept per file.
pub const ENV_VAR_GPGPAD_KEEP_BACKUPS: &str = "GPGPAD_KEEP_BACKUPS";
/// Environment variable for the preference file location.
pub const ENV_VAR_GPGPAD_PREFS: &str = "GPGPAD_PREFS";
/// Environment variable for the preferred editor.
pub const ENV_VAR_GPGPAD_EDITOR: &str = "GPGPAD_EDITOR";
/// Standard environment variable for specifying the default editor.
pub const ENV_VAR_EDITOR: &str = "EDITOR";
/// Environment variable controlling passphrase reuse when re-encrypting.
pub const ENV_VAR_GPGPAD_REUSE_PASSPHRASE: &str = "GPGPAD_REUSE_PASSPHRASE";
/// Environment variable supplying a passphrase non-interactively (tests, CI).
pub const ENV_VAR_GPGPAD_TEST_PASSPHRASE: &str = "GPGPAD_TEST_PASSPHRASE";
/// Default preference file, relative to the home directory.
pub const DEFAULT_PREFS_FILE: &str = "~/.gpgpad.json";

// Validation
/// Characters forbidden in editor commands for security reasons.
pub const EDITOR_FORBIDDEN_CHARS: &[char] =
    &['|', '&', ';', '$', '(', ')', '`', '\\', '<', '>', '\'', '"'];
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

// Backend
/// Executable name of the OpenPGP backend.
#[cfg(not(windows))]
pub const BACKEND_PROGRAM: &str = "gpg";
/// Executable name of the OpenPGP backend.
#[cfg(windows)]
pub const BACKEND_PROGRAM: &str = "gpg.exe";
/// Executable name of the agent control tool shipped next to the backend.
#[cfg(not(windows))]
pub const AGENT_CONTROL_PROGRAM: &str = "gpg-connect-agent";
/// Executable name of the agent control tool shipped next to the backend.
#[cfg(windows)]
pub const AGENT_CONTROL_PROGRAM: &str = "gpg-connect-agent.exe";
/// Default timeout for a single backend invocation, in seconds.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 120;
/// Interval between child status polls while a timeout is armed.
pub const BACKEND_POLL_INTERVAL_MS: u64 = 20;
/// Arguments that keep every backend invocation non-interactive.
pub const BATCH_ARGS: &[&str] = &["--batch", "--yes"];
/// Arguments that route passphrase entry through stdin instead of a prompt.
pub const LOOPBACK_PASSPHRASE_ARGS: &[&str] =
    &["--pinentry-mode", "loopback", "--passphrase-fd", "0"];

// Key Management
/// RSA modulus size for generated primary keys and subkeys.
pub const GENERATED_KEY_LENGTH: u32 = 2048;
/// Algorithm preference list applied while generating a key.
pub const DEFAULT_PREFERENCE_LIST: &str =
    "AES256 AES192 AES CAST5 SHA512 SHA256 SHA1 ZLIB BZIP2 ZIP Uncompressed";
/// Preference ordering written onto a freshly created key.
pub const KEY_SETPREF_LIST: &str =
    "AES256 AES192 AES128 3DES SHA512 SHA384 SHA256 SHA224 SHA1 ZLIB BZIP2 ZIP";
/// Owner trust level applied to keys created here (ultimate).
pub const KEY_TRUST_LEVEL: &str = "5";
/// Colon-listing field index holding fingerprints and user ids.
pub const LISTING_VALUE_FIELD: usize = 9;

// File System Parameters
/// Extension carried by encrypted output files.
pub const ENCRYPTED_FILE_EXTENSION: &str = "gpg";
/// Default number of backups retained per file.
pub const DEFAULT_KEEP_BACKUPS: usize = 2;
/// Timestamp format embedded in backup file names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// Length of a formatted backup timestamp (`YYYYMMDD_HHMMSS`).
pub const BACKUP_TIMESTAMP_LEN: usize = 15;
/// RAM-backed filesystems preferred for scratch files.
pub const TMPFS_PATHS: &[&str] = &["/dev/shm", "/run/shm"];
/// File name prefix for scratch files.
pub const SCRATCH_FILE_PREFIX: &str = "gpgpad-";
/// File name suffix for scratch files.
pub const SCRATCH_FILE_SUFFIX: &str = ".tmp";
/// Default POSIX permissions for newly created files (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;

// Logging Configuration
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "gpgpad";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";
