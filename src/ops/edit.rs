//! Edit an encrypted file in place.

use crate::backend::Backend;
use crate::crypto::{with_scratch_file, CryptoSession, EncryptionMode};
use crate::editor::Editor;
use crate::errors::{AppError, AppResult};
use crate::keys::KeyRegistry;
use crate::ops::backup::{BackupManager, BackupRecord};
use crate::ops::ensure_encrypted_extension;
use secrecy::SecretString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Options for [`edit_encrypted_file`].
#[derive(Default)]
pub struct EditOptions {
    /// Write the result here instead of back to the edited file
    pub save_as: Option<PathBuf>,
    /// How to encrypt the result
    pub mode: EncryptionMode,
    /// Replaces the passphrase the file was decrypted with
    pub new_passphrase: Option<SecretString>,
}

impl EditOptions {
    /// Whether the file must be rewritten even if its content did not change.
    fn requests_rewrite(&self) -> bool {
        self.save_as.is_some()
            || self.new_passphrase.is_some()
            || self.mode == EncryptionMode::KeyBased
    }
}

/// What an edit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Content unchanged; nothing was written.
    Unchanged,
    /// The edited content was encrypted to `output`.
    Saved {
        output: PathBuf,
        backup: Option<BackupRecord>,
    },
}

/// Decrypts `file`, lets the user edit it, and re-encrypts the result.
///
/// # Flow
///
/// 1. Decrypt into the session, retaining the passphrase
/// 2. Write the plaintext to a scratch file and open it in the editor
/// 3. Stop if nothing changed and no rewrite was requested
/// 4. Back up the existing output file
/// 5. Re-encrypt; if that fails, put the backup back
///
/// The session is `Idle` again when this returns, whatever the outcome.
///
/// # Errors
///
/// Returns an error if:
/// - Decryption fails (wrong passphrase)
/// - The editor cannot be launched or exits with failure
/// - The backup cannot be created
/// - Re-encryption fails
pub fn edit_encrypted_file<B, R, E>(
    session: &mut CryptoSession<B>,
    keys: &KeyRegistry<R>,
    editor: &E,
    backups: &BackupManager,
    file: &Path,
    passphrase: SecretString,
    options: EditOptions,
) -> AppResult<EditOutcome>
where
    B: Backend,
    R: Backend,
    E: Editor + ?Sized,
{
    let result = edit_held(session, keys, editor, backups, file, passphrase, options);
    session.reset();
    result
}

fn edit_held<B, R, E>(
    session: &mut CryptoSession<B>,
    keys: &KeyRegistry<R>,
    editor: &E,
    backups: &BackupManager,
    file: &Path,
    passphrase: SecretString,
    options: EditOptions,
) -> AppResult<EditOutcome>
where
    B: Backend,
    R: Backend,
    E: Editor + ?Sized,
{
    let original = Zeroizing::new(session.begin_decrypt(file, passphrase)?);

    let edited = Zeroizing::new(with_scratch_file(Some(original.as_slice()), |path| {
        editor.open(path)?;
        Ok::<_, AppError>(fs::read(path)?)
    })?);

    if *edited == *original && !options.requests_rewrite() {
        info!("No changes made to {}", file.display());
        return Ok(EditOutcome::Unchanged);
    }

    let output = match &options.save_as {
        Some(path) => ensure_encrypted_extension(path),
        None => file.to_path_buf(),
    };

    let backup = backups.backup_if_exists(&output)?;

    let EditOptions {
        mode,
        new_passphrase,
        ..
    } = options;
    match session.reencrypt(&edited, Some(&output), mode, new_passphrase, keys) {
        Ok(written) => {
            info!("Saved {}", written.display());
            Ok(EditOutcome::Saved {
                output: written,
                backup,
            })
        }
        Err(e) => {
            if let Some(record) = &backup {
                restore_backup(record);
            }
            Err(e)
        }
    }
}

/// Moves a backup back into place after a failed write.
fn restore_backup(record: &BackupRecord) {
    if record.original.exists() {
        warn!(
            "Not restoring {}; a file already exists there",
            record.original.display()
        );
        return;
    }
    match fs::rename(&record.backup, &record.original) {
        Ok(()) => debug!("Restored {} from backup", record.original.display()),
        Err(e) => warn!(
            "Could not restore {} from {}: {}",
            record.original.display(),
            record.backup.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::crypto::SessionState;
    use crate::errors::{CryptoError, EditorError};
    use crate::keys::KeyRecord;
    use tempfile::tempdir;

    fn secret(value: &str) -> SecretString {
        SecretString::new(value.to_string())
    }

    struct AppendEditor(&'static str);

    impl Editor for AppendEditor {
        fn open(&self, path: &Path) -> AppResult<()> {
            let mut text = fs::read_to_string(path)?;
            text.push_str(self.0);
            fs::write(path, text)?;
            Ok(())
        }
    }

    struct FailingEditor;

    impl Editor for FailingEditor {
        fn open(&self, _path: &Path) -> AppResult<()> {
            Err(AppError::Editor(EditorError::NonZeroExit {
                command: "vim".to_string(),
                status_code: 1,
            }))
        }
    }

    fn setup(backend: &FakeBackend, file: &Path, content: &[u8]) {
        CryptoSession::new(backend)
            .encrypt_symmetric(content, file, &secret("pw"))
            .unwrap();
    }

    #[test]
    fn test_edit_saves_changes_with_backup() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::new();
        setup(&backend, &file, b"line one");
        let keys = KeyRegistry::new(&backend);
        let mut session = CryptoSession::new(&backend);

        let outcome = edit_encrypted_file(
            &mut session,
            &keys,
            &AppendEditor("\nline two"),
            &BackupManager::default(),
            &file,
            secret("pw"),
            EditOptions::default(),
        )
        .unwrap();

        let EditOutcome::Saved { output, backup } = outcome else {
            panic!("Expected Saved");
        };
        assert_eq!(output, file);
        assert!(backup.unwrap().backup.exists());
        assert_eq!(
            session.decrypt_symmetric(&file, &secret("pw")).unwrap(),
            b"line one\nline two"
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_unchanged_content_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::new();
        setup(&backend, &file, b"same");
        let keys = KeyRegistry::new(&backend);
        let mut session = CryptoSession::new(&backend);

        let outcome = edit_encrypted_file(
            &mut session,
            &keys,
            &AppendEditor(""),
            &BackupManager::default(),
            &file,
            secret("pw"),
            EditOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(backend.calls_with("--symmetric").len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(!session.holds_passphrase());
    }

    #[test]
    fn test_save_as_adds_extension() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::new();
        setup(&backend, &file, b"v1");
        let keys = KeyRegistry::new(&backend);
        let mut session = CryptoSession::new(&backend);

        let outcome = edit_encrypted_file(
            &mut session,
            &keys,
            &AppendEditor(""),
            &BackupManager::default(),
            &file,
            secret("pw"),
            EditOptions {
                save_as: Some(dir.path().join("copy.txt")),
                ..EditOptions::default()
            },
        )
        .unwrap();

        let expected = dir.path().join("copy.txt.gpg");
        assert_eq!(
            outcome,
            EditOutcome::Saved {
                output: expected.clone(),
                backup: None
            }
        );
        assert_eq!(
            session.decrypt_symmetric(&expected, &secret("pw")).unwrap(),
            b"v1"
        );
    }

    #[test]
    fn test_wrong_passphrase_never_opens_editor() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::new();
        setup(&backend, &file, b"secret");
        let keys = KeyRegistry::new(&backend);
        let mut session = CryptoSession::new(&backend);

        let result = edit_encrypted_file(
            &mut session,
            &keys,
            &FailingEditor,
            &BackupManager::default(),
            &file,
            secret("wrong-pass"),
            EditOptions::default(),
        );

        assert!(matches!(
            result,
            Err(AppError::Crypto(CryptoError::DecryptionFailed { .. }))
        ));
    }

    #[test]
    fn test_editor_failure_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::new();
        setup(&backend, &file, b"secret");
        let before = fs::read(&file).unwrap();
        let keys = KeyRegistry::new(&backend);
        let mut session = CryptoSession::new(&backend);

        let result = edit_encrypted_file(
            &mut session,
            &keys,
            &FailingEditor,
            &BackupManager::default(),
            &file,
            secret("pw"),
            EditOptions::default(),
        );

        assert!(matches!(result, Err(AppError::Editor(_))));
        assert_eq!(fs::read(&file).unwrap(), before);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.holds_passphrase());
    }

    #[test]
    fn test_failed_reencrypt_restores_backup() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::new();
        setup(&backend, &file, b"v1");
        let before = fs::read(&file).unwrap();
        backend.fail_on("--symmetric");
        let keys = KeyRegistry::new(&backend);
        let mut session = CryptoSession::new(&backend);

        let result = edit_encrypted_file(
            &mut session,
            &keys,
            &AppendEditor(" changed"),
            &BackupManager::default(),
            &file,
            secret("pw"),
            EditOptions::default(),
        );

        assert!(matches!(
            result,
            Err(AppError::Crypto(CryptoError::EncryptionFailed { .. }))
        ));
        assert_eq!(fs::read(&file).unwrap(), before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_switch_to_key_encryption() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.gpg");
        let backend = FakeBackend::with_keys(vec![KeyRecord::new("FPR1", "Alice <a@example.com>")]);
        setup(&backend, &file, b"v1");
        let mut keys = KeyRegistry::new(&backend);
        keys.refresh().unwrap();
        keys.select("FPR1").unwrap();
        let mut session = CryptoSession::new(&backend);

        edit_encrypted_file(
            &mut session,
            &keys,
            &AppendEditor(""),
            &BackupManager::default(),
            &file,
            secret("pw"),
            EditOptions {
                mode: EncryptionMode::KeyBased,
                ..EditOptions::default()
            },
        )
        .unwrap();

        assert_eq!(backend.calls_with("--recipient").len(), 1);
    }
}
