//! Non-interactive execution of the OpenPGP backend.
//!
//! Every invocation runs in batch mode with "yes" answers. Stdin is fed and
//! stdout and stderr are captured on their own threads, so an optional
//! deadline covers the whole invocation. Secrets are only ever passed
//! through stdin.

use crate::backend::{Backend, BackendOutput};
use crate::config::Config;
use crate::constants::{AGENT_CONTROL_PROGRAM, BACKEND_POLL_INTERVAL_MS, BATCH_ARGS};
use crate::errors::BackendError;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

/// Runs the backend executable as a subprocess.
///
/// # Example
///
/// ```no_run
/// use gpgpad::backend::{args, Backend, ProcessRunner};
/// use std::time::Duration;
///
/// let runner = ProcessRunner::new("/usr/bin/gpg").with_timeout(Some(Duration::from_secs(30)));
/// let output = runner.run(&args(["--version"]), None)?;
/// println!("{}", output.stdout_lossy());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    homedir: Option<PathBuf>,
    timeout: Option<Duration>,
    agent_control: Option<PathBuf>,
}

impl ProcessRunner {
    /// Creates a runner for `program` with no timeout and no explicit homedir.
    ///
    /// The agent control tool is looked up next to `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let agent_control = program
            .parent()
            .map(|dir| dir.join(AGENT_CONTROL_PROGRAM))
            .filter(|candidate| candidate.is_file());

        Self {
            program,
            homedir: None,
            timeout: None,
            agent_control,
        }
    }

    /// Creates a runner for `program` using the homedir and timeout from `config`.
    pub fn from_config(program: impl Into<PathBuf>, config: &Config) -> Self {
        Self::new(program)
            .with_homedir(config.homedir.clone())
            .with_timeout(config.backend_timeout)
    }

    /// Points every invocation at a specific key storage directory.
    pub fn with_homedir(mut self, homedir: Option<PathBuf>) -> Self {
        self.homedir = homedir;
        self
    }

    /// Sets the per-invocation deadline; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the agent control executable.
    pub fn with_agent_control(mut self, agent_control: Option<PathBuf>) -> Self {
        self.agent_control = agent_control;
        self
    }

    /// The backend executable this runner invokes.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn homedir_args(&self) -> Vec<OsString> {
        match &self.homedir {
            Some(dir) => vec![OsString::from("--homedir"), dir.clone().into_os_string()],
            None => Vec::new(),
        }
    }

    fn execute(
        &self,
        program: &Path,
        args: Vec<OsString>,
        stdin: Option<&[u8]>,
    ) -> Result<BackendOutput, BackendError> {
        trace!(?args, "Backend arguments");

        let mut child = Command::new(program)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());
        let stdin_writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(pipe)) => {
                Some(spawn_writer(pipe, Zeroizing::new(input.to_vec())))
            }
            _ => None,
        };

        let status = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit),
            None => child.wait().map(Some),
        }
        .map_err(|source| BackendError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

        // Processes the backend started can outlive it and hold the pipes
        // open, so the I/O threads are left detached after a timeout.
        let Some(status) = status else {
            let after = self.timeout.unwrap_or_default();
            warn!(
                "Backend exceeded timeout of {}s and was terminated",
                after.as_secs()
            );
            return Err(BackendError::Timeout { after });
        };

        if let Some(writer) = stdin_writer {
            let _ = writer.join();
        }
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            debug!(exit_code, "Backend exited with failure");
            return Err(BackendError::Execution {
                exit_code,
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }

        Ok(BackendOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

impl Backend for ProcessRunner {
    fn run(&self, args: &[OsString], stdin: Option<&[u8]>) -> Result<BackendOutput, BackendError> {
        let mut full_args = self.homedir_args();
        full_args.extend(BATCH_ARGS.iter().map(OsString::from));
        full_args.extend(args.iter().cloned());

        debug!(program = %self.program.display(), "Running backend");
        self.execute(&self.program, full_args, stdin)
    }

    fn reset_agent_cache(&self) -> Result<(), BackendError> {
        let Some(agent) = &self.agent_control else {
            debug!("No agent control tool next to backend; skipping cache reset");
            return Ok(());
        };

        let mut args = self.homedir_args();
        args.push(OsString::from("reloadagent"));
        args.push(OsString::from("/bye"));

        debug!("Resetting backend agent cache");
        self.execute(agent, args, None).map(|_| ())
    }
}

fn spawn_writer(mut pipe: ChildStdin, input: Zeroizing<Vec<u8>>) -> JoinHandle<()> {
    thread::spawn(move || {
        // The child may exit without reading its input
        match pipe.write_all(&input) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Backend closed stdin before reading all input");
            }
            Err(e) => warn!("Failed to write backend stdin: {}", e),
            Ok(()) => {}
        }
    })
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Waits for `child` until `limit` elapses.
///
/// Returns `Ok(None)` after killing a child that overran its deadline.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                warn!("Failed to kill backend process: {}", e);
            }
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(BACKEND_POLL_INTERVAL_MS));
    }
}
