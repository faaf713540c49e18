/*!
# gpgpad - Encrypted Files Through GnuPG

gpgpad encrypts, decrypts, and edits files through the `gpg` command-line
tool, and manages the secret keys it uses. Passphrases reach `gpg` only over
stdin, and plaintext only ever touches short-lived scratch files.

This file sets up logging and hands the parsed command to [`gpgpad::cli::run`].

## Usage

```text
gpgpad [OPTIONS] <COMMAND>

Commands:
  encrypt  Encrypt a file (or stdin) to an output file
  decrypt  Decrypt a file to stdout or an output file
  edit     Decrypt a file, edit it, and encrypt the result
  keys     Manage secret keys
  prefs    Show or change saved preferences

Options:
  -v, --verbose                  Print verbose output
      --log-format <LOG_FORMAT>  Log output format [default: text] [possible values: text, json]
```

## Configuration

See [`gpgpad::config`] for the environment variables that select the backend,
its key storage directory, timeouts, backup retention, and the editor.
*/

use clap::Parser;
use gpgpad::cli::{self, CliArgs, LogFormat};
use gpgpad::config::Config;
use gpgpad::constants::{DEFAULT_LOG_LEVEL, TRACING_ROOT_SPAN_NAME, TRACING_SERVICE_NAME};
use gpgpad::errors::AppResult;
use std::process::ExitCode;
use tracing::{debug, error, info, info_span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose, args.log_format);

    let invocation_id = Uuid::new_v4();
    let span = info_span!(
        TRACING_ROOT_SPAN_NAME,
        service = TRACING_SERVICE_NAME,
        invocation_id = %invocation_id
    );
    let _guard = span.enter();

    match run_app(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration and runs the parsed command.
///
/// # Errors
///
/// Returns configuration errors before anything else runs, then whatever the
/// command reports.
fn run_app(args: CliArgs) -> AppResult<()> {
    debug!("CLI arguments: {:?}", args);

    let config = Config::load()?;
    debug!("Configuration: {:?}", config);

    info!("Starting {}", TRACING_SERVICE_NAME);
    cli::run(args, &config)
}

/// Installs the global subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` with
/// `--verbose`.
fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { DEFAULT_LOG_LEVEL };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {}", e);
    }
}
