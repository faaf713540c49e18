//! Encryption and decryption through the OpenPGP backend.
//!
//! This module provides the crypto session, passphrase handling, and secure
//! scratch files for passing content to and from the backend process.
//!
//! # Module Structure
//!
//! - `session`: the decrypt, modify, re-encrypt state machine
//! - `passphrase`: prompting and stdin delivery of passphrases
//! - `temp`: scratch files with tmpfs preference and guaranteed cleanup
//!
//! # Example
//!
//! ```no_run
//! use gpgpad::backend::ProcessRunner;
//! use gpgpad::crypto::CryptoSession;
//! use secrecy::SecretString;
//! use std::path::Path;
//!
//! let runner = ProcessRunner::new("/usr/bin/gpg");
//! let session = CryptoSession::new(&runner);
//! let passphrase = SecretString::new("correct-horse".to_string());
//!
//! session.encrypt_symmetric(b"hello world", Path::new("out.gpg"), &passphrase)?;
//! let plaintext = session.decrypt_symmetric(Path::new("out.gpg"), &passphrase)?;
//! assert_eq!(plaintext, b"hello world");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod passphrase;
pub mod session;
pub mod temp;

// Re-export commonly used types
pub use self::passphrase::{passphrase_stdin, prompt_new_passphrase, prompt_passphrase};
pub use self::session::{CryptoSession, EncryptionMode, PassphrasePolicy, SessionState};
pub use self::temp::{secure_temp_dir, with_scratch_file, with_scratch_file_in};
