//! The key registry: current secret keys, the selected key, and key lifecycle
//! operations.
//!
//! Every mutating operation refreshes the list afterwards, so callers always
//! see the backend's view of the key storage. Non-zero backend exits are
//! translated into [`KeyError`] values here; other backend failures (missing
//! executable, timeouts) propagate unchanged.

use crate::backend::{args, Backend};
use crate::constants::{
    DEFAULT_PREFERENCE_LIST, GENERATED_KEY_LENGTH, KEY_SETPREF_LIST, KEY_TRUST_LEVEL,
    LOOPBACK_PASSPHRASE_ARGS,
};
use crate::crypto::passphrase::{self, passphrase_stdin};
use crate::crypto::with_scratch_file;
use crate::errors::{AppError, AppResult, BackendError, KeyError};
use crate::keys::{format_identity, parse_secret_key_listing, KeyRecord, SelectedKey};
use secrecy::{ExposeSecret, SecretString};
use std::ffi::OsString;
use std::path::Path;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Owns the list of secret keys and the current selection.
///
/// # Example
///
/// ```no_run
/// use gpgpad::backend::ProcessRunner;
/// use gpgpad::keys::KeyRegistry;
///
/// let mut registry = KeyRegistry::new(ProcessRunner::new("/usr/bin/gpg"));
/// for key in registry.refresh()? {
///     println!("{}", key);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct KeyRegistry<B: Backend> {
    backend: B,
    keys: Vec<KeyRecord>,
    selection: Option<SelectedKey>,
}

impl<B: Backend> KeyRegistry<B> {
    /// Creates an empty registry; call [`refresh`](Self::refresh) to populate it.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            keys: Vec::new(),
            selection: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The keys from the most recent refresh.
    pub fn keys(&self) -> &[KeyRecord] {
        &self.keys
    }

    /// Looks up a key in the current list.
    pub fn find(&self, fingerprint: &str) -> Option<&KeyRecord> {
        self.keys.iter().find(|k| k.fingerprint == fingerprint)
    }

    /// Replaces the key list with a fresh listing from the backend.
    ///
    /// The selection is re-resolved: it is dropped if its key is gone and its
    /// cached identity is updated otherwise.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Listing` if the backend fails to list keys.
    pub fn refresh(&mut self) -> AppResult<&[KeyRecord]> {
        let output = self
            .backend
            .run(
                &args(["--list-secret-keys", "--with-colons", "--fingerprint"]),
                None,
            )
            .map_err(|e| {
                translate(e, |code| {
                    KeyError::Listing(format!("backend status {}", code))
                })
            })?;

        self.keys = parse_secret_key_listing(&output.stdout_lossy());
        debug!("Key list refreshed: {} secret keys", self.keys.len());
        self.resolve_selection();
        Ok(&self.keys)
    }

    fn resolve_selection(&mut self) {
        let Some(selection) = self.selection.take() else {
            return;
        };
        match self.find(&selection.fingerprint) {
            Some(record) => self.selection = Some(SelectedKey::from(record)),
            None => info!(
                "Selected key {} no longer exists; selection cleared",
                selection.fingerprint
            ),
        }
    }

    /// Generates a new key pair and returns its record.
    ///
    /// The key is a 2048-bit RSA signing key with a 2048-bit RSA encryption
    /// subkey and no expiry. With `apply_trust`, ultimate trust and the
    /// cipher/hash preference list are applied afterwards; a failure there is
    /// logged and does not undo the creation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` for an empty or multi-line name,
    /// email, or passphrase, and `KeyError::Creation` if generation fails.
    pub fn create(
        &mut self,
        name: &str,
        email: &str,
        passphrase: &SecretString,
        apply_trust: bool,
    ) -> AppResult<KeyRecord> {
        validate_parameter("name", name)?;
        validate_parameter("email", email)?;
        if passphrase::is_empty(passphrase) {
            return Err(AppError::InvalidArgument(
                "a passphrase is required to create a key".to_string(),
            ));
        }
        passphrase::require_single_line(passphrase)?;

        let existing: Vec<String> = self.keys.iter().map(|k| k.fingerprint.clone()).collect();
        let params = key_generation_params(name, email, passphrase);

        info!("Generating key for {}", format_identity(name, email));
        with_scratch_file(Some(params.as_bytes()), |params_path| {
            let mut argv = args(["--default-preference-list", DEFAULT_PREFERENCE_LIST]);
            argv.extend(args(["--pinentry-mode", "loopback", "--gen-key"]));
            argv.push(params_path.as_os_str().to_os_string());
            self.backend
                .run(&argv, None)
                .map(|_| ())
                .map_err(|e| {
                    translate(e, |code| {
                        KeyError::Creation(format!("backend status {}", code))
                    })
                })
        })?;

        self.refresh()?;

        let identity = format_identity(name, email);
        let created = self
            .keys
            .iter()
            .filter(|k| k.identity == identity)
            .find(|k| !existing.contains(&k.fingerprint))
            .cloned()
            .ok_or_else(|| {
                KeyError::Creation(format!("no new key for {} appeared in the listing", identity))
            })?;

        if apply_trust {
            if let Err(e) = self.set_trust_and_preferences(&created.fingerprint, passphrase) {
                warn!(
                    "Key {} created, but setting trust and preferences failed: {}",
                    created.fingerprint, e
                );
            }
        }

        info!("Created key {}", created.fingerprint);
        Ok(created)
    }

    /// Marks a key as ultimately trusted and writes the preferred algorithm list.
    ///
    /// Drives the backend's edit-key session over its command channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` for a multi-line passphrase and
    /// `KeyError::Creation` if the edit session fails.
    pub fn set_trust_and_preferences(
        &self,
        fingerprint: &str,
        passphrase: &SecretString,
    ) -> AppResult<()> {
        passphrase::require_single_line(passphrase)?;
        let mut feed = passphrase_stdin(passphrase);
        feed.extend_from_slice(
            format!(
                "trust\n{}\nsetpref {}\nsave\n",
                KEY_TRUST_LEVEL, KEY_SETPREF_LIST
            )
            .as_bytes(),
        );

        let mut argv = args(LOOPBACK_PASSPHRASE_ARGS.iter().copied());
        argv.extend(args(["--command-fd", "0", "--edit-key", fingerprint]));

        debug!("Setting trust and preferences for {}", fingerprint);
        self.backend
            .run(&argv, Some(feed.as_slice()))
            .map(|_| ())
            .map_err(|e| {
                translate(e, |code| {
                    KeyError::Creation(format!(
                        "setting trust and preferences failed with backend status {}",
                        code
                    ))
                })
            })
    }

    /// Deletes a key pair: secret material first, then the public key.
    ///
    /// Clears the selection if it pointed at this key. The key list is
    /// refreshed even when the public key step fails, so a key whose secret
    /// material is already gone drops out of the list and the selection.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::NotFound` if the key is not in the current list and
    /// `KeyError::Deletion` if either backend step fails.
    pub fn delete(&mut self, fingerprint: &str) -> AppResult<()> {
        self.require(fingerprint)?;

        let deletion = |code: i32| KeyError::Deletion {
            fingerprint: fingerprint.to_string(),
            reason: format!("backend status {}", code),
        };

        let result = self
            .backend
            .run(&args(["--delete-secret-key", fingerprint]), None)
            .and_then(|_| self.backend.run(&args(["--delete-keys", fingerprint]), None))
            .map_err(|e| translate(e, deletion));

        if let Err(e) = result {
            // The secret half may already be gone
            if let Err(refresh_error) = self.refresh() {
                warn!("Could not refresh keys after failed deletion: {}", refresh_error);
            }
            return Err(e);
        }

        if self
            .selection
            .as_ref()
            .is_some_and(|s| s.fingerprint == fingerprint)
        {
            self.selection = None;
        }

        info!("Deleted key {}", fingerprint);
        self.refresh()?;
        Ok(())
    }

    /// Imports a key archive, answering its passphrase over loopback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` if the file does not exist or the
    /// passphrase spans lines, and `KeyError::Import` if the backend rejects it.
    pub fn import(&mut self, key_file: &Path, passphrase: &SecretString) -> AppResult<()> {
        if !key_file.is_file() {
            return Err(AppError::InvalidArgument(format!(
                "key file {} does not exist",
                key_file.display()
            )));
        }
        passphrase::require_single_line(passphrase)?;

        let stdin = passphrase_stdin(passphrase);
        let mut argv = args(LOOPBACK_PASSPHRASE_ARGS.iter().copied());
        argv.push(OsString::from("--import"));
        argv.push(key_file.as_os_str().to_os_string());

        self.backend
            .run(&argv, Some(stdin.as_slice()))
            .map_err(|e| translate(e, |code| KeyError::Import(format!("backend status {}", code))))?;

        info!("Imported keys from {}", key_file.display());
        self.refresh()?;
        Ok(())
    }

    /// Writes the armored secret key to `output`.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::NotFound` if the key is not in the current list,
    /// `AppError::InvalidArgument` for a multi-line passphrase, and
    /// `KeyError::Export` if the backend fails.
    pub fn export(
        &self,
        fingerprint: &str,
        output: &Path,
        passphrase: &SecretString,
    ) -> AppResult<()> {
        self.require(fingerprint)?;
        passphrase::require_single_line(passphrase)?;

        let stdin = passphrase_stdin(passphrase);
        let mut argv = args(LOOPBACK_PASSPHRASE_ARGS.iter().copied());
        argv.extend(args(["--armor", "--export-secret-keys", "--output"]));
        argv.push(output.as_os_str().to_os_string());
        argv.push(OsString::from(fingerprint));

        self.backend
            .run(&argv, Some(stdin.as_slice()))
            .map_err(|e| {
                translate(e, |code| KeyError::Export {
                    fingerprint: fingerprint.to_string(),
                    reason: format!("backend status {}", code),
                })
            })?;

        info!("Exported key {} to {}", fingerprint, output.display());
        Ok(())
    }

    /// Selects a key from the current list.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::NotFound` if the fingerprint is not listed.
    pub fn select(&mut self, fingerprint: &str) -> AppResult<&KeyRecord> {
        let record = self.require(fingerprint)?.clone();
        debug!("Selected key {}", record.fingerprint);
        self.selection = Some(SelectedKey::from(&record));
        self.require(fingerprint)
    }

    /// The selected key, resolved against the current list.
    pub fn selected(&self) -> Option<&KeyRecord> {
        self.selection
            .as_ref()
            .and_then(|s| self.find(&s.fingerprint))
    }

    /// The raw selection, suitable for persisting.
    pub fn selection(&self) -> Option<&SelectedKey> {
        self.selection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Restores a persisted selection if its key is still listed.
    ///
    /// Returns whether the selection was accepted.
    pub fn restore_selection(&mut self, selection: SelectedKey) -> bool {
        match self.find(&selection.fingerprint) {
            Some(record) => {
                self.selection = Some(SelectedKey::from(record));
                true
            }
            None => {
                debug!(
                    "Persisted key {} is not available; ignoring",
                    selection.fingerprint
                );
                false
            }
        }
    }

    fn require(&self, fingerprint: &str) -> AppResult<&KeyRecord> {
        self.find(fingerprint).ok_or_else(|| {
            KeyError::NotFound {
                fingerprint: fingerprint.to_string(),
            }
            .into()
        })
    }
}

/// Maps a non-zero backend exit to a key error; other failures pass through.
fn translate(error: BackendError, domain: impl FnOnce(i32) -> KeyError) -> AppError {
    match error {
        BackendError::Execution { exit_code, .. } => {
            debug!(exit_code, "Key operation failed in backend");
            domain(exit_code).into()
        }
        other => other.into(),
    }
}

fn validate_parameter(label: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidArgument(format!("{} is required", label)));
    }
    if value.chars().any(char::is_control) {
        return Err(AppError::InvalidArgument(format!(
            "{} must not contain control characters",
            label
        )));
    }
    Ok(())
}

/// The batch key generation parameter file.
fn key_generation_params(name: &str, email: &str, passphrase: &SecretString) -> Zeroizing<String> {
    Zeroizing::new(format!(
        "%echo Generating RSA key\n\
         Key-Type: RSA\n\
         Key-Length: {length}\n\
         Subkey-Type: RSA\n\
         Subkey-Length: {length}\n\
         Key-Usage: cert sign\n\
         Subkey-Usage: encrypt auth\n\
         Name-Real: {name}\n\
         Name-Email: {email}\n\
         Expire-Date: 0\n\
         Passphrase: {passphrase}\n\
         %commit\n\
         %echo Done\n",
        length = GENERATED_KEY_LENGTH,
        name = name,
        email = email,
        passphrase = passphrase.expose_secret(),
    ))
}
