//! Test utilities and mocks for fpbuild unit tests.
//!
//! Builders talk to the outside world through two seams, [`CommandRunner`]
//! and [`ExtensionToolchain`]. This module provides scripted versions of
//! both so the build pipeline can be exercised without cmake, make or a
//! Python interpreter.
//!
//! # Example
//!
//! ```rust,ignore
//! use fpbuild::test_support::{MockExecutor, MockProcessOutput, create_test_project};
//!
//! #[test]
//! fn test_example() {
//!     let project = create_test_project();
//!     let exec = MockExecutor::new();
//!     exec.expect_prefix("cmake ", MockProcessOutput::success(""));
//!     exec.expect_creating("make -j4", MockProcessOutput::success(""), [library]);
//!
//!     // Hand `&exec` to a builder...
//! }
//! ```

pub mod fixtures;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::builder::extension::{ExtensionError, ExtensionRequest, ExtensionToolchain};
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput, ProcessStatus};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Fail to start instead of returning output.
    pub spawn_failure: bool,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            spawn_failure: false,
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
            spawn_failure: false,
        }
    }

    /// A program that cannot be started.
    pub fn not_found() -> Self {
        MockProcessOutput {
            spawn_failure: true,
            ..MockProcessOutput::failure(-1, "")
        }
    }

    fn to_output(&self) -> ProcessOutput {
        ProcessOutput {
            status: ProcessStatus::from_code(Some(self.status)),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

/// Pattern for matching commands in MockExecutor.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match any command.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Any => true,
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
pub struct CommandExpectation {
    /// Pattern to match against commands.
    pub pattern: CommandPattern,
    /// Output to return when matched.
    pub output: MockProcessOutput,
    /// Files written when the command runs, standing in for build outputs.
    pub creates: Vec<PathBuf>,
    /// Number of times this expectation can be used (None = unlimited).
    pub times: Option<usize>,
    /// Number of times this expectation has been used.
    pub used: usize,
}

impl CommandExpectation {
    /// Create a new expectation.
    pub fn new(pattern: CommandPattern, output: MockProcessOutput) -> Self {
        CommandExpectation {
            pattern,
            output,
            creates: Vec::new(),
            times: None,
            used: 0,
        }
    }

    /// Set the number of times this expectation can be used.
    pub fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Files to create when matched.
    pub fn creating(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.creates.extend(files);
        self
    }

    /// Check if this expectation can still be used.
    pub fn available(&self) -> bool {
        match self.times {
            Some(n) => self.used < n,
            None => true,
        }
    }
}

/// A command as the executor saw it.
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct ExecutorState {
    expectations: Vec<CommandExpectation>,
    calls: Vec<RecordedCommand>,
    default_output: Option<MockProcessOutput>,
}

/// Mock process executor for testing command execution.
///
/// Records expected commands and their outputs, and verifies that
/// commands are called as expected. Builders take `&dyn CommandRunner`,
/// so the executor is scripted through `&self`.
#[derive(Debug, Default)]
pub struct MockExecutor {
    state: Mutex<ExecutorState>,
}

impl MockExecutor {
    /// Create a new mock executor.
    pub fn new() -> Self {
        MockExecutor::default()
    }

    fn push(&self, expectation: CommandExpectation) -> &Self {
        self.lock().expectations.push(expectation);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&self, cmd: &str, output: MockProcessOutput) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::Exact(cmd.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&self, prefix: &str, output: MockProcessOutput) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::StartsWith(prefix.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&self, substring: &str, output: MockProcessOutput) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::Contains(substring.to_string()),
            output,
        ))
    }

    /// Exact command that writes `files` when it runs.
    pub fn expect_creating(
        &self,
        cmd: &str,
        output: MockProcessOutput,
        files: impl IntoIterator<Item = PathBuf>,
    ) -> &Self {
        self.push(
            CommandExpectation::new(CommandPattern::Exact(cmd.to_string()), output)
                .creating(files),
        )
    }

    /// Make `program` impossible to start.
    pub fn expect_spawn_failure(&self, program: &str) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::StartsWith(program.to_string()),
            MockProcessOutput::not_found(),
        ))
    }

    /// Add a custom expectation.
    pub fn expect_pattern(&self, expectation: CommandExpectation) -> &Self {
        self.push(expectation)
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&self, output: MockProcessOutput) -> &Self {
        self.lock().default_output = Some(output);
        self
    }

    fn run(&self, cmd: &ProcessBuilder) -> Result<MockProcessOutput> {
        let full_cmd = cmd.display_command();
        let mut state = self.lock();

        state.calls.push(RecordedCommand {
            command: full_cmd.clone(),
            env: cmd.get_env().clone(),
            cwd: cmd.get_cwd().map(|p| p.to_path_buf()),
            stdin: cmd.get_stdin().map(|s| s.to_vec()),
        });

        // Find matching expectation
        let mut matched = None;
        for exp in state.expectations.iter_mut() {
            if exp.pattern.matches(&full_cmd) && exp.available() {
                exp.used += 1;
                matched = Some((exp.output.clone(), exp.creates.clone()));
                break;
            }
        }

        let (output, creates) = match matched {
            Some(found) => found,
            None => match state.default_output {
                Some(ref default) => (default.clone(), Vec::new()),
                None => bail!("unexpected command: {}", full_cmd),
            },
        };
        drop(state);

        if output.spawn_failure {
            bail!("failed to spawn `{}`", cmd.get_program().display());
        }

        for file in creates {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file, b"")?;
        }

        Ok(output)
    }

    /// Get all commands that were called.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.command.clone()).collect()
    }

    /// Get all calls with their environment, working directory and stdin.
    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.lock().calls.clone()
    }

    /// Whether any command started with `program`.
    pub fn was_called(&self, program: &str) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|c| c.command.starts_with(program))
    }

    /// Verify that all expectations with a specific count were satisfied.
    pub fn verify(&self) -> Result<()> {
        for (i, exp) in self.lock().expectations.iter().enumerate() {
            if let Some(expected) = exp.times {
                if exp.used != expected {
                    bail!(
                        "expectation {} was used {} times, expected {}",
                        i,
                        exp.used,
                        expected
                    );
                }
            }
        }
        Ok(())
    }
}

impl CommandRunner for MockExecutor {
    fn status(&self, cmd: &ProcessBuilder) -> Result<ProcessStatus> {
        Ok(self.run(cmd)?.to_output().status)
    }

    fn output(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        Ok(self.run(cmd)?.to_output())
    }
}

#[derive(Debug, Default)]
struct ToolchainLog {
    requests: Vec<ExtensionRequest>,
    built: Vec<String>,
}

/// Extension toolchain that writes `<build_dir>/<name>.so` instead of compiling.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    failing: Vec<String>,
    log: Mutex<ToolchainLog>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        FakeToolchain::default()
    }

    /// Make the named extension fail with exit code 1.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ToolchainLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ExtensionRequest> {
        self.lock().requests.clone()
    }

    /// Names of the extensions that were attempted.
    pub fn attempted(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.name.clone()).collect()
    }

    /// Names of the extensions that were built.
    pub fn built(&self) -> Vec<String> {
        self.lock().built.clone()
    }
}

impl ExtensionToolchain for FakeToolchain {
    fn load(&self, request: &ExtensionRequest) -> Result<PathBuf, ExtensionError> {
        self.lock().requests.push(request.clone());

        if self.failing.contains(&request.name) {
            return Err(ExtensionError::Failed {
                exit_code: 1,
                message: format!("Error building extension '{}'", request.name),
            });
        }

        let path = request.build_directory.join(format!("{}.so", request.name));
        std::fs::write(&path, b"").map_err(|e| ExtensionError::Launch(e.to_string()))?;
        self.lock().built.push(request.name.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_executor_exact() {
        let exec = MockExecutor::new();
        exec.expect("make -j4", MockProcessOutput::success("done"));

        let output = exec.output(&ProcessBuilder::new("make").arg("-j4")).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "done");
        assert_eq!(exec.calls(), vec!["make -j4"]);
    }

    #[test]
    fn test_mock_executor_unexpected() {
        let exec = MockExecutor::new();
        assert!(exec.status(&ProcessBuilder::new("cmake")).is_err());
    }

    #[test]
    fn test_mock_executor_times() {
        let exec = MockExecutor::new();
        exec.expect_pattern(
            CommandExpectation::new(CommandPattern::Any, MockProcessOutput::success("")).times(1),
        );

        assert!(exec.status(&ProcessBuilder::new("true")).is_ok());
        assert!(exec.verify().is_ok());
        assert!(exec.status(&ProcessBuilder::new("true")).is_err());
    }

    #[test]
    fn test_mock_executor_creates_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("out/lib.so");

        let exec = MockExecutor::new();
        exec.expect_creating("make", MockProcessOutput::success(""), [file.clone()]);
        exec.status(&ProcessBuilder::new("make")).unwrap();

        assert!(file.is_file());
    }

    #[test]
    fn test_was_called_matches_program() {
        let exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::success(""));
        exec.status(&ProcessBuilder::new("cmake").arg("/src")).unwrap();

        assert!(exec.was_called("cmake"));
        assert!(!exec.was_called("make"));
    }
}
