//! Execution of parsed commands.
//!
//! Each command locates the backend, builds the key registry and crypto
//! session it needs, and keeps the preference file in step with what the
//! user chose.

use crate::backend::install::prompt_yes_no;
use crate::backend::{BackendLocator, Installer, PackageManagerInstaller, ProcessRunner};
use crate::cli::{CliArgs, Command, EditArgs, EncryptArgs, KeysCommand, PrefsCommand};
use crate::config::Config;
use crate::crypto::{prompt_new_passphrase, prompt_passphrase, CryptoSession, EncryptionMode};
use crate::editor::SystemEditor;
use crate::errors::{AppError, AppResult, BackendError};
use crate::keys::{format_identity, KeyRegistry};
use crate::ops::{
    edit_encrypted_file, ensure_encrypted_extension, BackupManager, EditOptions, EditOutcome,
};
use crate::preferences::PreferenceStore;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Runs the command in `args` with `config`.
///
/// # Errors
///
/// Returns whatever the command's underlying operation reports; see the
/// individual operations for details.
pub fn run(args: CliArgs, config: &Config) -> AppResult<()> {
    let mut prefs = PreferenceStore::load(&config.prefs_path);

    let command = match args.command {
        Command::Prefs(command) => return prefs_command(&command, &mut prefs),
        other => other,
    };

    let runner = ProcessRunner::from_config(locate_backend(config)?, config);
    debug!("Using backend {}", runner.program().display());

    match command {
        Command::Encrypt(encrypt) => encrypt_command(&encrypt, config, &runner, &mut prefs),
        Command::Decrypt { file, output } => {
            decrypt_command(&file, output.as_deref(), config, &runner, &mut prefs)
        }
        Command::Edit(edit) => edit_command(edit, config, &runner, &mut prefs),
        Command::Keys(command) => keys_command(command, &runner, &mut prefs),
        Command::Prefs(command) => prefs_command(&command, &mut prefs),
    }
}

/// Finds the backend, offering to install it where an installer exists.
fn locate_backend(config: &Config) -> AppResult<PathBuf> {
    let mut locator = BackendLocator::new().with_explicit_path(config.backend_override.clone());
    if let Some(installer) = PackageManagerInstaller::for_current_platform() {
        locator = locator.with_installer(Box::new(ConsentingInstaller(installer)));
    }
    Ok(locator.locate()?)
}

/// Asks the user before running the wrapped installer.
struct ConsentingInstaller(PackageManagerInstaller);

impl Installer for ConsentingInstaller {
    fn install(&self) -> Result<(), BackendError> {
        let question = format!(
            "GnuPG was not found. Install it now with '{}'?",
            self.0.command_line()
        );
        if !prompt_yes_no(&question, false) {
            return Err(BackendError::Install(
                "installation declined by user".to_string(),
            ));
        }
        self.0.install()
    }
}

/// Loads the key list and restores the persisted selection.
fn load_keys<'a>(
    runner: &'a ProcessRunner,
    prefs: &mut PreferenceStore,
) -> AppResult<KeyRegistry<&'a ProcessRunner>> {
    let mut keys = KeyRegistry::new(runner);
    keys.refresh()?;

    if let Some(saved) = prefs.preferences().selected_key.clone() {
        if !keys.restore_selection(saved) {
            warn!("The saved key is no longer available; selection cleared");
            prefs.set_selected_key(None);
        }
    }
    Ok(keys)
}

/// The requested mode, falling back to the saved preference.
fn resolve_mode(requested: Option<EncryptionMode>, prefs: &PreferenceStore) -> EncryptionMode {
    requested.unwrap_or(if prefs.preferences().use_key_encryption {
        EncryptionMode::KeyBased
    } else {
        EncryptionMode::Symmetric
    })
}

fn encrypt_command(
    args: &EncryptArgs,
    config: &Config,
    runner: &ProcessRunner,
    prefs: &mut PreferenceStore,
) -> AppResult<()> {
    let mode = resolve_mode(args.mode(), prefs);
    let output = ensure_encrypted_extension(&args.output);

    let content = Zeroizing::new(if args.reads_stdin() {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    } else {
        fs::read(&args.input).map_err(|e| input_error(&args.input, e))?
    });

    let keys = load_keys(runner, prefs)?;
    if mode == EncryptionMode::KeyBased && keys.selected().is_none() {
        return Err(AppError::InvalidArgument(
            "no key is selected; run 'gpgpad keys select <FINGERPRINT>' first".to_string(),
        ));
    }

    let passphrase = match mode {
        EncryptionMode::Symmetric => Some(prompt_new_passphrase(&output.display().to_string())?),
        EncryptionMode::KeyBased => None,
    };

    if !args.no_backup {
        BackupManager::new(config.keep_backups)?.backup_if_exists(&output)?;
    }

    let mut session = CryptoSession::with_policy(runner, config.passphrase_policy());
    session.encrypt_new(&content, &output, mode, passphrase.as_ref(), &keys)?;

    prefs.remember_directory_of(&output);
    println!("Encrypted to {} ({})", output.display(), mode);
    Ok(())
}

fn decrypt_command(
    file: &Path,
    output: Option<&Path>,
    config: &Config,
    runner: &ProcessRunner,
    prefs: &mut PreferenceStore,
) -> AppResult<()> {
    let passphrase = prompt_passphrase(&format!("Passphrase for {}: ", file.display()))?;
    let session = CryptoSession::with_policy(runner, config.passphrase_policy());
    let content = Zeroizing::new(session.decrypt_symmetric(file, &passphrase)?);

    match output {
        Some(path) => {
            BackupManager::new(config.keep_backups)?.backup_if_exists(path)?;
            write_private_file(path, &content)?;
            prefs.remember_directory_of(path);
            info!("Decrypted {} to {}", file.display(), path.display());
            println!("Decrypted to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn edit_command(
    args: EditArgs,
    config: &Config,
    runner: &ProcessRunner,
    prefs: &mut PreferenceStore,
) -> AppResult<()> {
    let mode = resolve_mode(args.mode(), prefs);
    let EditArgs {
        file,
        save_as,
        new_passphrase,
        ..
    } = args;
    let file = file.as_path();

    let keys = load_keys(runner, prefs)?;
    if mode == EncryptionMode::KeyBased && keys.selected().is_none() {
        return Err(AppError::InvalidArgument(
            "no key is selected; run 'gpgpad keys select <FINGERPRINT>' first".to_string(),
        ));
    }

    let passphrase = prompt_passphrase(&format!("Passphrase for {}: ", file.display()))?;
    let needs_new_passphrase = mode == EncryptionMode::Symmetric
        && (new_passphrase || !config.reuse_passphrase);
    let new_passphrase = if needs_new_passphrase {
        let target = save_as.as_deref().unwrap_or(file);
        Some(prompt_new_passphrase(&target.display().to_string())?)
    } else {
        None
    };

    let options = EditOptions {
        save_as,
        mode,
        new_passphrase,
    };
    let mut session = CryptoSession::with_policy(runner, config.passphrase_policy());
    let outcome = edit_encrypted_file(
        &mut session,
        &keys,
        &SystemEditor::new(config.editor.clone()),
        &BackupManager::new(config.keep_backups)?,
        file,
        passphrase,
        options,
    )?;

    match outcome {
        EditOutcome::Unchanged => println!("No changes to {}", file.display()),
        EditOutcome::Saved { output, backup } => {
            prefs.remember_directory_of(&output);
            println!("Saved {} ({})", output.display(), mode);
            if let Some(record) = backup {
                println!("Previous version kept at {}", record.backup.display());
            }
        }
    }
    Ok(())
}

fn keys_command(
    command: KeysCommand,
    runner: &ProcessRunner,
    prefs: &mut PreferenceStore,
) -> AppResult<()> {
    let mut keys = load_keys(runner, prefs)?;

    match command {
        KeysCommand::List => {
            if keys.keys().is_empty() {
                println!("No secret keys found");
            }
            let selected = keys.selected().map(|k| k.fingerprint.clone());
            for key in keys.keys() {
                let marker = if selected.as_deref() == Some(key.fingerprint.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!("{} {}  {}", marker, key.fingerprint, key.identity);
            }
        }
        KeysCommand::Create {
            name,
            email,
            no_trust,
        } => {
            let identity = format_identity(&name, &email);
            let passphrase = prompt_new_passphrase(&identity)?;
            let record = keys.create(&name, &email, &passphrase, !no_trust)?;
            println!("Created key {}", record);
        }
        KeysCommand::Delete { fingerprint, yes } => {
            let record = keys.find(&fingerprint).cloned();
            if let Some(record) = &record {
                let question = format!("Delete {} and its secret key?", record);
                if !yes && !prompt_yes_no(&question, false) {
                    println!("Nothing deleted");
                    return Ok(());
                }
            }
            keys.delete(&fingerprint)?;
            sync_selection(&keys, prefs);
            println!("Deleted key {}", fingerprint);
        }
        KeysCommand::Import { file } => {
            let passphrase = prompt_passphrase(&format!("Passphrase for {}: ", file.display()))?;
            keys.import(&file, &passphrase)?;
            println!(
                "Imported {}; {} secret key(s) available",
                file.display(),
                keys.keys().len()
            );
        }
        KeysCommand::Export {
            fingerprint,
            output,
        } => {
            let passphrase = prompt_passphrase(&format!("Passphrase for key {}: ", fingerprint))?;
            keys.export(&fingerprint, &output, &passphrase)?;
            prefs.remember_directory_of(&output);
            println!("Exported key {} to {}", fingerprint, output.display());
        }
        KeysCommand::Select { fingerprint } => {
            let record = keys.select(&fingerprint)?.clone();
            sync_selection(&keys, prefs);
            println!("Selected {}", record);
        }
        KeysCommand::Deselect => {
            keys.clear_selection();
            sync_selection(&keys, prefs);
            println!("No key selected");
        }
    }
    Ok(())
}

fn sync_selection(keys: &KeyRegistry<&ProcessRunner>, prefs: &mut PreferenceStore) {
    let selection = keys.selection().cloned();
    if prefs.preferences().selected_key != selection {
        prefs.set_selected_key(selection);
    }
}

fn prefs_command(command: &PrefsCommand, prefs: &mut PreferenceStore) -> AppResult<()> {
    match command {
        PrefsCommand::Show => {
            let current = prefs.preferences();
            let mode = if current.use_key_encryption {
                EncryptionMode::KeyBased
            } else {
                EncryptionMode::Symmetric
            };
            println!("Preference file: {}", prefs.path().display());
            println!("Encryption mode: {}", mode);
            match &current.last_directory {
                Some(dir) => println!("Last directory:  {}", dir.display()),
                None => println!("Last directory:  (none)"),
            }
            match &current.selected_key {
                Some(key) => println!("Selected key:    {} ({})", key.identity, key.fingerprint),
                None => println!("Selected key:    (none)"),
            }
        }
        PrefsCommand::Mode { mode } => {
            let mode = EncryptionMode::from(*mode);
            prefs.set_use_key_encryption(mode == EncryptionMode::KeyBased);
            println!("Default encryption mode: {}", mode);
        }
    }
    Ok(())
}

fn input_error(path: &Path, error: io::Error) -> AppError {
    if error.kind() == io::ErrorKind::NotFound {
        AppError::InvalidArgument(format!("input file {} does not exist", path.display()))
    } else {
        AppError::Io(error)
    }
}

/// Writes `content` to `path`, readable by the owner only.
fn write_private_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use crate::constants::DEFAULT_FILE_PERMISSIONS;
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(DEFAULT_FILE_PERMISSIONS);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_input_error_kinds() {
        let missing = input_error(
            Path::new("nope.txt"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(missing, AppError::InvalidArgument(msg) if msg.contains("nope.txt")));

        let denied = input_error(
            Path::new("locked.txt"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(denied, AppError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        write_private_file(&path, b"hello world").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_prefs_mode_command() {
        let dir = tempdir().unwrap();
        let mut prefs = PreferenceStore::load(dir.path().join("prefs.json"));

        prefs_command(
            &PrefsCommand::Mode {
                mode: crate::cli::ModeArg::Key,
            },
            &mut prefs,
        )
        .unwrap();

        assert!(PreferenceStore::load(dir.path().join("prefs.json"))
            .preferences()
            .use_key_encryption);
    }

    #[test]
    fn test_resolve_mode_falls_back_to_preference() {
        let dir = tempdir().unwrap();
        let mut prefs = PreferenceStore::load(dir.path().join("prefs.json"));
        assert_eq!(resolve_mode(None, &prefs), EncryptionMode::Symmetric);

        prefs.set_use_key_encryption(true);
        assert_eq!(resolve_mode(None, &prefs), EncryptionMode::KeyBased);
        assert_eq!(
            resolve_mode(Some(EncryptionMode::Symmetric), &prefs),
            EncryptionMode::Symmetric
        );
    }
}
