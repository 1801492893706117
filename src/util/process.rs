//! Subprocess execution utilities.
//!
//! Every external tool (cmake, make, the Python interpreter) is launched
//! through a [`CommandRunner`], so builders never touch `std::process`
//! directly and tests can script toolchain behavior.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Exit code reported when a program could not be started at all.
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set stdin data.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    pub fn exec(&self) -> Result<ProcessOutput> {
        let mut cmd = self.build_command();

        if self.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        if let Some(ref stdin_data) = self.stdin {
            use std::io::Write;
            // Dropping the handle closes the pipe so the child sees EOF.
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(stdin_data)?;
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(ProcessOutput {
            status: ProcessStatus::from_code(output.status.code()),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Execute and return the exit status only.
    ///
    /// stdin and stderr are inherited. The child's stdout is sent to our
    /// stderr so that our own stdout only ever carries the manifest.
    pub fn status(&self) -> Result<ProcessStatus> {
        let mut cmd = self.build_command();
        cmd.stdout(std::io::stderr());
        let status = cmd
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;
        Ok(ProcessStatus::from_code(status.code()))
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Exit status of a finished process.
///
/// `code` is `None` when the process was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStatus {
    pub code: Option<i32>,
}

impl ProcessStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        ProcessStatus { code }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code to report, mapping signal termination to `-1`.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ProcessStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Seam between builders and the operating system's process API.
pub trait CommandRunner {
    /// Run with toolchain output streaming to the terminal on stderr.
    fn status(&self, cmd: &ProcessBuilder) -> Result<ProcessStatus>;

    /// Run with captured stdout and stderr.
    fn output(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn status(&self, cmd: &ProcessBuilder) -> Result<ProcessStatus> {
        tracing::debug!("running `{}`", cmd.display_command());
        cmd.status()
    }

    fn output(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        tracing::debug!("running `{}`", cmd.display_command());
        cmd.exec()
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve a program: explicit path first, then the first candidate found in PATH.
///
/// Falls back to the first candidate's bare name so that a missing tool
/// surfaces as a spawn failure of the stage that needs it.
pub fn resolve_program(configured: Option<&Path>, candidates: &[&str]) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    candidates
        .iter()
        .find_map(|name| find_executable(name))
        .unwrap_or_else(|| PathBuf::from(candidates.first().copied().unwrap_or_default()))
}
