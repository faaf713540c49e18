//! Command-line interface definitions.
//!
//! Argument parsing lives here; [`commands`] carries each subcommand out.

pub mod commands;

use crate::constants::{APP_DESCRIPTION, LOG_FORMAT_JSON, LOG_FORMAT_TEXT};
use crate::crypto::EncryptionMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use self::commands::run;

/// Encrypt, decrypt, and manage OpenPGP keys through the gpg command-line tool
#[derive(Parser, Debug)]
#[command(name = "gpgpad", about = APP_DESCRIPTION)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    /// Print verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Format of log lines written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => LOG_FORMAT_TEXT,
            LogFormat::Json => LOG_FORMAT_JSON,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encrypt a file (or stdin) to an output file
    Encrypt(EncryptArgs),

    /// Decrypt a file to stdout or an output file
    Decrypt {
        /// Encrypted file to read
        file: PathBuf,

        /// Write plaintext here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a file, edit it, and encrypt the result
    Edit(EditArgs),

    /// Manage secret keys
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Show or change saved preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// File to encrypt, or `-` for stdin
    pub input: PathBuf,

    /// Encrypted output file (`.gpg` is appended when missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Encrypt to the selected key
    #[arg(long, conflicts_with = "passphrase_mode")]
    pub key: bool,

    /// Encrypt with a passphrase
    #[arg(long)]
    pub passphrase_mode: bool,

    /// Overwrite an existing output without keeping a backup
    #[arg(long)]
    pub no_backup: bool,
}

impl EncryptArgs {
    /// The requested mode, or `None` to use the saved preference.
    pub fn mode(&self) -> Option<EncryptionMode> {
        match (self.key, self.passphrase_mode) {
            (true, _) => Some(EncryptionMode::KeyBased),
            (_, true) => Some(EncryptionMode::Symmetric),
            _ => None,
        }
    }

    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Encrypted file to edit
    pub file: PathBuf,

    /// Save to a different file instead of overwriting
    #[arg(long)]
    pub save_as: Option<PathBuf>,

    /// Encrypt the result to the selected key
    #[arg(long, conflicts_with_all = ["passphrase_mode", "new_passphrase"])]
    pub key: bool,

    /// Encrypt the result with a passphrase
    #[arg(long)]
    pub passphrase_mode: bool,

    /// Choose a new passphrase for the result
    #[arg(long)]
    pub new_passphrase: bool,
}

impl EditArgs {
    /// The requested mode, or `None` to use the saved preference.
    ///
    /// Asking for a new passphrase implies passphrase mode.
    pub fn mode(&self) -> Option<EncryptionMode> {
        match (self.key, self.passphrase_mode || self.new_passphrase) {
            (true, _) => Some(EncryptionMode::KeyBased),
            (_, true) => Some(EncryptionMode::Symmetric),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// List secret keys
    List,

    /// Generate a new key pair
    Create {
        /// Real name for the key's user id
        #[arg(long)]
        name: String,

        /// Email address for the key's user id
        #[arg(long)]
        email: String,

        /// Skip setting ultimate trust and algorithm preferences
        #[arg(long)]
        no_trust: bool,
    },

    /// Delete a key pair
    Delete {
        fingerprint: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Import keys from a file
    Import { file: PathBuf },

    /// Export an armored secret key
    Export {
        fingerprint: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Select the key used for key-based encryption
    Select { fingerprint: String },

    /// Clear the selected key
    Deselect,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Print saved preferences
    Show,

    /// Set the default encryption mode
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Key,
    Passphrase,
}

impl From<ModeArg> for EncryptionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Key => EncryptionMode::KeyBased,
            ModeArg::Passphrase => EncryptionMode::Symmetric,
        }
    }
}
