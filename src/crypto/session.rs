//! The crypto session: one user task of encrypting content to a file or
//! decrypting a file back to content.
//!
//! A session is `Idle` until a file is decrypted, then `Holding` the
//! passphrase that opened it so the edited content can be re-encrypted. The
//! retained passphrase lives only in memory and is dropped as soon as the
//! session returns to `Idle` or a fresh encryption target is started.

use crate::backend::{args, Backend};
use crate::constants::LOOPBACK_PASSPHRASE_ARGS;
use crate::crypto::passphrase::{self, passphrase_stdin};
use crate::crypto::with_scratch_file;
use crate::errors::{AppError, AppResult, BackendError, CryptoError};
use crate::keys::KeyRegistry;
use secrecy::SecretString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How content is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Passphrase-based, no recipient key.
    #[default]
    Symmetric,
    /// Public-key encryption to the registry's selected key.
    KeyBased,
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMode::Symmetric => write!(f, "passphrase"),
            EncryptionMode::KeyBased => write!(f, "key"),
        }
    }
}

/// Where the session is in its decrypt, modify, re-encrypt cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No decrypted file is held.
    Idle,
    /// A file was decrypted; its passphrase is retained for re-encryption.
    Holding,
}

/// Whether re-encrypting reuses the passphrase that decrypted the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassphrasePolicy {
    pub reuse_on_modify: bool,
}

impl Default for PassphrasePolicy {
    fn default() -> Self {
        Self {
            reuse_on_modify: true,
        }
    }
}

/// Coordinates encryption and decryption through the backend.
///
/// # Example
///
/// ```no_run
/// use gpgpad::backend::ProcessRunner;
/// use gpgpad::crypto::{CryptoSession, EncryptionMode};
/// use gpgpad::keys::KeyRegistry;
/// use secrecy::SecretString;
/// use std::path::Path;
///
/// let runner = ProcessRunner::new("/usr/bin/gpg");
/// let keys = KeyRegistry::new(&runner);
/// let mut session = CryptoSession::new(&runner);
///
/// let passphrase = SecretString::new("correct-horse".to_string());
/// let content = session.begin_decrypt(Path::new("notes.txt.gpg"), passphrase)?;
/// let mut edited = content.clone();
/// edited.extend_from_slice(b"\nanother line");
/// session.reencrypt(&edited, None, EncryptionMode::Symmetric, None, &keys)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CryptoSession<B: Backend> {
    backend: B,
    state: SessionState,
    target: Option<PathBuf>,
    passphrase: Option<SecretString>,
    mode: EncryptionMode,
    policy: PassphrasePolicy,
}

impl<B: Backend> fmt::Debug for CryptoSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoSession")
            .field("state", &self.state)
            .field("target", &self.target)
            .field("holds_passphrase", &self.passphrase.is_some())
            .field("mode", &self.mode)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<B: Backend> CryptoSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, PassphrasePolicy::default())
    }

    pub fn with_policy(backend: B, policy: PassphrasePolicy) -> Self {
        Self {
            backend,
            state: SessionState::Idle,
            target: None,
            passphrase: None,
            mode: EncryptionMode::default(),
            policy,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The decrypted file held for re-encryption, if any.
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// The mode of the most recent encryption, or the default.
    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    pub fn policy(&self) -> PassphrasePolicy {
        self.policy
    }

    /// Whether a passphrase is currently retained in memory.
    pub fn holds_passphrase(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Returns to `Idle` and drops any retained passphrase.
    pub fn reset(&mut self) {
        if self.passphrase.take().is_some() {
            debug!("Cleared retained passphrase");
        }
        self.state = SessionState::Idle;
        self.target = None;
    }

    /// Decrypts `file` and holds its passphrase for a later re-encrypt.
    ///
    /// Any previously held task is abandoned first. On failure the session is
    /// back in `Idle` with no passphrase retained.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on a wrong passphrase or other
    /// backend rejection, and `AppError::InvalidArgument` if `file` does not
    /// exist or the passphrase is empty.
    pub fn begin_decrypt(&mut self, file: &Path, passphrase: SecretString) -> AppResult<Vec<u8>> {
        if self.state == SessionState::Holding {
            debug!("Abandoning held task before new decrypt");
        }
        self.reset();

        match self.decrypt_symmetric(file, &passphrase) {
            Ok(content) => {
                self.state = SessionState::Holding;
                self.target = Some(file.to_path_buf());
                self.passphrase = Some(passphrase);
                Ok(content)
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Encrypts edited content from a held task.
    ///
    /// Writes to `output`, or back to the decrypted file when `None`. In
    /// `Symmetric` mode a `new_passphrase` takes precedence; otherwise the
    /// retained one is reused if the policy allows it. `KeyBased` mode needs a
    /// selected key in `keys` and ignores passphrases. Success returns the
    /// session to `Idle`; failure leaves it `Holding` so the caller can retry.
    ///
    /// The caller is responsible for backing up `output` beforehand.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` when nothing is held, no passphrase
    /// is available, or no key is selected, and `CryptoError::EncryptionFailed`
    /// if the backend fails.
    pub fn reencrypt<R: Backend>(
        &mut self,
        content: &[u8],
        output: Option<&Path>,
        mode: EncryptionMode,
        new_passphrase: Option<SecretString>,
        keys: &KeyRegistry<R>,
    ) -> AppResult<PathBuf> {
        if self.state != SessionState::Holding {
            return Err(AppError::InvalidArgument(
                "no decrypted file is being held for re-encryption".to_string(),
            ));
        }
        let output = output
            .map(Path::to_path_buf)
            .or_else(|| self.target.clone())
            .ok_or_else(|| AppError::InvalidArgument("output file path is required".to_string()))?;

        match mode {
            EncryptionMode::Symmetric => {
                let passphrase = match (&new_passphrase, self.policy.reuse_on_modify) {
                    (Some(fresh), _) => fresh,
                    (None, true) => self.passphrase.as_ref().ok_or_else(|| {
                        AppError::InvalidArgument("no passphrase is retained".to_string())
                    })?,
                    (None, false) => {
                        return Err(AppError::InvalidArgument(
                            "a new passphrase is required to re-encrypt".to_string(),
                        ))
                    }
                };
                self.encrypt_symmetric(content, &output, passphrase)?;
            }
            EncryptionMode::KeyBased => {
                let key = keys.selected().ok_or_else(|| {
                    AppError::InvalidArgument("no key is selected for encryption".to_string())
                })?;
                self.encrypt_with_key(content, &output, &key.fingerprint)?;
            }
        }

        self.mode = mode;
        self.reset();
        info!("Re-encrypted content to {}", output.display());
        Ok(output)
    }

    /// Encrypts content to a new file without a prior decrypt.
    ///
    /// Any retained passphrase is cleared first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` when the passphrase (`Symmetric`)
    /// or the selected key (`KeyBased`) is missing, and
    /// `CryptoError::EncryptionFailed` if the backend fails.
    pub fn encrypt_new<R: Backend>(
        &mut self,
        content: &[u8],
        output: &Path,
        mode: EncryptionMode,
        passphrase: Option<&SecretString>,
        keys: &KeyRegistry<R>,
    ) -> AppResult<()> {
        self.reset();

        match mode {
            EncryptionMode::Symmetric => {
                let passphrase = passphrase.ok_or_else(|| {
                    AppError::InvalidArgument("a passphrase is required".to_string())
                })?;
                self.encrypt_symmetric(content, output, passphrase)?;
            }
            EncryptionMode::KeyBased => {
                let key = keys.selected().ok_or_else(|| {
                    AppError::InvalidArgument("no key is selected for encryption".to_string())
                })?;
                self.encrypt_with_key(content, output, &key.fingerprint)?;
            }
        }

        self.mode = mode;
        info!("Encrypted content to {}", output.display());
        Ok(())
    }

    /// Passphrase-encrypts `content` into `output`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` for an empty output path or an
    /// empty or multi-line passphrase, and `CryptoError::EncryptionFailed` if
    /// the backend fails.
    pub fn encrypt_symmetric(
        &self,
        content: &[u8],
        output: &Path,
        passphrase: &SecretString,
    ) -> AppResult<()> {
        require_path(output, "output file path")?;
        require_passphrase(passphrase)?;

        let stdin = passphrase_stdin(passphrase);
        with_scratch_file(Some(content), |input| {
            let mut argv = args(LOOPBACK_PASSPHRASE_ARGS.iter().copied());
            argv.extend(args(["--symmetric", "--output"]));
            argv.push(output.as_os_str().to_os_string());
            argv.push(input.as_os_str().to_os_string());

            self.backend
                .run(&argv, Some(stdin.as_slice()))
                .map(|_| ())
                .map_err(|e| translate(e, |exit_code| CryptoError::EncryptionFailed { exit_code }))
        })
    }

    /// Encrypts `content` for the key `fingerprint` into `output`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` for an empty output path or
    /// fingerprint and `CryptoError::EncryptionFailed` if the backend fails.
    pub fn encrypt_with_key(&self, content: &[u8], output: &Path, fingerprint: &str) -> AppResult<()> {
        require_path(output, "output file path")?;
        if fingerprint.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "a recipient key is required".to_string(),
            ));
        }

        self.reset_agent();
        with_scratch_file(Some(content), |input| {
            let mut argv = args(["--recipient", fingerprint, "--output"]);
            argv.push(output.as_os_str().to_os_string());
            argv.push("--encrypt".into());
            argv.push(input.as_os_str().to_os_string());

            self.backend
                .run(&argv, None)
                .map(|_| ())
                .map_err(|e| translate(e, |exit_code| CryptoError::EncryptionFailed { exit_code }))
        })
    }

    /// Decrypts `input` with `passphrase` and returns the plaintext.
    ///
    /// The passphrase answers whatever the file needs: the symmetric
    /// passphrase, or the passphrase of the recipient's secret key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` if `input` does not exist or the
    /// passphrase is empty or spans lines, and `CryptoError::DecryptionFailed`
    /// if the backend rejects the file or passphrase.
    pub fn decrypt_symmetric(&self, input: &Path, passphrase: &SecretString) -> AppResult<Vec<u8>> {
        require_path(input, "input file path")?;
        if !input.is_file() {
            return Err(AppError::InvalidArgument(format!(
                "file {} does not exist",
                input.display()
            )));
        }
        require_passphrase(passphrase)?;

        self.reset_agent();
        let stdin = passphrase_stdin(passphrase);
        with_scratch_file(None, |plaintext| {
            let mut argv = args(LOOPBACK_PASSPHRASE_ARGS.iter().copied());
            argv.push("--output".into());
            argv.push(plaintext.as_os_str().to_os_string());
            argv.push("--decrypt".into());
            argv.push(input.as_os_str().to_os_string());

            self.backend
                .run(&argv, Some(stdin.as_slice()))
                .map_err(|e| translate(e, |exit_code| CryptoError::DecryptionFailed { exit_code }))?;
            Ok(fs::read(plaintext)?)
        })
    }

    fn reset_agent(&self) {
        if let Err(e) = self.backend.reset_agent_cache() {
            warn!("Could not reset backend agent cache: {}", e);
        }
    }
}

impl<B: Backend> Drop for CryptoSession<B> {
    fn drop(&mut self) {
        self.reset();
    }
}

fn require_path(path: &Path, label: &str) -> AppResult<()> {
    if path.as_os_str().is_empty() {
        return Err(AppError::InvalidArgument(format!("{} is required", label)));
    }
    Ok(())
}

fn require_passphrase(passphrase: &SecretString) -> AppResult<()> {
    if passphrase::is_empty(passphrase) {
        return Err(AppError::InvalidArgument(
            "a passphrase is required".to_string(),
        ));
    }
    passphrase::require_single_line(passphrase)
}

fn translate(error: BackendError, domain: impl FnOnce(i32) -> CryptoError) -> AppError {
    match error {
        BackendError::Execution { exit_code, .. } => {
            debug!(exit_code, "Crypto operation failed in backend");
            domain(exit_code).into()
        }
        other => other.into(),
    }
}
