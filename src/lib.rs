/*!
# gpgpad

gpgpad drives an external OpenPGP command-line backend (GnuPG's `gpg`) to
encrypt and decrypt files and to manage secret keys. It never implements
cryptography itself: every operation is a batch-mode backend invocation with
passphrases delivered over stdin and content passed through scratch files
that are removed on every exit path.

## Architecture

- `backend`: locating, installing, and running the backend executable
- `keys`: parsing key listings; the key registry and selected key
- `crypto`: the crypto session, passphrase handling, and scratch files
- `ops`: backups and the edit workflow
- `preferences`: settings persisted between runs
- `config`: environment-driven configuration
- `cli`: the command-line front-end
- `editor`: launching the user's editor
- `errors`: error types shared by all of the above

## Usage Example

```rust,no_run
use gpgpad::backend::{BackendLocator, ProcessRunner};
use gpgpad::crypto::CryptoSession;
use gpgpad::Config;
use secrecy::SecretString;
use std::path::Path;

fn main() -> gpgpad::AppResult<()> {
    let config = Config::load()?;
    let gpg = BackendLocator::new()
        .with_explicit_path(config.backend_override.clone())
        .locate()?;
    let runner = ProcessRunner::from_config(gpg, &config);

    let session = CryptoSession::new(&runner);
    let passphrase = SecretString::new("correct-horse".to_string());
    session.encrypt_symmetric(b"hello world", Path::new("hello.gpg"), &passphrase)?;
    Ok(())
}
```
*/

/// Locating and running the OpenPGP backend
pub mod backend;
/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Encryption, decryption, and scratch files
pub mod crypto;
/// External editor integration
pub mod editor;
/// Error types and utilities for error handling
pub mod errors;
/// Secret key listing and management
pub mod keys;
/// Backups and user-facing workflows
pub mod ops;
/// Settings persisted between runs
pub mod preferences;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use errors::{AppError, AppResult};
