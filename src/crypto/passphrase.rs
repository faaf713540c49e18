//! Passphrase entry and delivery to the backend.
//!
//! Passphrases are read with `rpassword` (or from `GPGPAD_TEST_PASSPHRASE` for
//! non-interactive runs) and handed to the backend only over stdin.

use crate::constants::ENV_VAR_GPGPAD_TEST_PASSPHRASE;
use crate::errors::{AppError, AppResult, CryptoError};
use secrecy::{ExposeSecret, SecretString};
use std::env;
use tracing::debug;
use zeroize::Zeroizing;

/// Builds the stdin payload that answers a loopback passphrase request.
///
/// ```
/// use gpgpad::crypto::passphrase_stdin;
/// use secrecy::SecretString;
///
/// let payload = passphrase_stdin(&SecretString::new("correct-horse".to_string()));
/// assert_eq!(payload.as_slice(), b"correct-horse\n");
/// ```
pub fn passphrase_stdin(passphrase: &SecretString) -> Zeroizing<Vec<u8>> {
    let secret = passphrase.expose_secret();
    let mut payload = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
    payload.extend_from_slice(secret.as_bytes());
    payload.push(b'\n');
    payload
}

/// Rejects a passphrase the backend would cut short at a line break.
///
/// The backend reads a single line from its passphrase channel, so anything
/// after a CR or LF would be silently dropped.
///
/// # Errors
///
/// Returns `AppError::InvalidArgument` if the passphrase contains `\n` or `\r`.
pub fn require_single_line(passphrase: &SecretString) -> AppResult<()> {
    if passphrase.expose_secret().contains(['\n', '\r']) {
        return Err(AppError::InvalidArgument(
            "passphrase must be a single line".to_string(),
        ));
    }
    Ok(())
}

/// Returns true if the passphrase is empty.
pub fn is_empty(passphrase: &SecretString) -> bool {
    passphrase.expose_secret().is_empty()
}

/// Checks a newly chosen passphrase against its confirmation.
///
/// # Errors
///
/// Returns `CryptoError::PassphraseMismatch` if the two differ, or
/// `CryptoError::EmptyPassphrase` if the passphrase is empty.
pub fn confirm(passphrase: &SecretString, confirmation: &SecretString) -> AppResult<()> {
    if passphrase.expose_secret() != confirmation.expose_secret() {
        return Err(CryptoError::PassphraseMismatch.into());
    }
    if is_empty(passphrase) {
        return Err(CryptoError::EmptyPassphrase.into());
    }
    Ok(())
}

/// Prompts for a new passphrase with confirmation.
///
/// # Errors
///
/// Returns `CryptoError::PassphraseMismatch` if confirmations don't match.
pub fn prompt_new_passphrase(purpose: &str) -> AppResult<SecretString> {
    if let Some(passphrase) = env_passphrase() {
        return Ok(passphrase);
    }

    debug!("Prompting for new passphrase");
    let passphrase = read_password(&format!("New passphrase for {}: ", purpose))?;
    let confirmation = read_password("Confirm passphrase: ")?;
    confirm(&passphrase, &confirmation)?;
    Ok(passphrase)
}

/// Prompts for an existing passphrase.
///
/// For non-interactive testing, set `GPGPAD_TEST_PASSPHRASE`. This bypasses
/// the terminal prompt and uses the provided value.
///
/// # Errors
///
/// Returns an error if reading from the terminal fails or the passphrase is empty.
pub fn prompt_passphrase(prompt: &str) -> AppResult<SecretString> {
    if let Some(passphrase) = env_passphrase() {
        return Ok(passphrase);
    }

    debug!("Prompting for existing passphrase");
    let passphrase = read_password(prompt)?;
    if is_empty(&passphrase) {
        return Err(CryptoError::EmptyPassphrase.into());
    }
    Ok(passphrase)
}

fn env_passphrase() -> Option<SecretString> {
    let value = env::var(ENV_VAR_GPGPAD_TEST_PASSPHRASE).ok()?;
    debug!("Using {} for non-interactive passphrase entry", ENV_VAR_GPGPAD_TEST_PASSPHRASE);
    Some(SecretString::new(value))
}

fn read_password(prompt: &str) -> AppResult<SecretString> {
    rpassword::prompt_password(prompt)
        .map(SecretString::new)
        .map_err(|e| CryptoError::PassphrasePrompt(e.to_string()).into())
}
