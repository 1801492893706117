//! Environment resolution.
//!
//! Produces the [`ResolvedEnvironment`] every builder is parameterized by.
//! Inputs are passed in explicitly through [`EnvInputs`]; nothing here reads
//! process environment variables.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::builder::error::BuildWarning;
use crate::util::process::{CommandRunner, ProcessBuilder};

/// Include directories that are always searched, in this order.
pub const DEFAULT_INCLUDE_DIRS: &[&str] = &["/usr/local/include/eigen3", "/usr/include/eigen3"];

/// Include directory appended below an environment prefix.
pub const PREFIX_INCLUDE_SUBDIR: &str = "include/eigen3";

const PYBIND11_QUERY: &str = "import pybind11; print(pybind11.get_cmake_dir())";

/// Result of looking for the toolchain-support directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainDiscovery {
    Found(PathBuf),
    Unavailable(String),
}

/// Locates the toolchain-support directory handed to the configure step.
pub trait ToolchainProbe {
    fn discover(&self) -> ToolchainDiscovery;
}

/// A fixed answer, for callers that already know the outcome.
impl ToolchainProbe for ToolchainDiscovery {
    fn discover(&self) -> ToolchainDiscovery {
        self.clone()
    }
}

/// Asks a Python interpreter where pybind11 keeps its CMake config.
pub struct Pybind11Probe<'a> {
    python: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> Pybind11Probe<'a> {
    pub fn new(python: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        Pybind11Probe {
            python: python.into(),
            runner,
        }
    }
}

impl ToolchainProbe for Pybind11Probe<'_> {
    fn discover(&self) -> ToolchainDiscovery {
        let cmd = ProcessBuilder::new(&self.python).args(["-c", PYBIND11_QUERY]);

        let output = match self.runner.output(&cmd) {
            Ok(output) => output,
            Err(e) => return ToolchainDiscovery::Unavailable(format!("{:#}", e)),
        };

        if !output.status.success() {
            let reason = output
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| {
                    format!("`{}` exited with code {}", cmd.display_command(), output.status.exit_code())
                });
            return ToolchainDiscovery::Unavailable(reason);
        }

        match output.stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(dir) => ToolchainDiscovery::Found(PathBuf::from(dir)),
            None => ToolchainDiscovery::Unavailable("pybind11 reported an empty path".to_string()),
        }
    }
}

/// Explicit inputs to environment resolution.
#[derive(Debug, Clone, Default)]
pub struct EnvInputs {
    /// Environment prefix (e.g. the active conda environment)
    pub prefix: Option<PathBuf>,

    /// Parallelism override; `None` or zero means auto-detect
    pub jobs: Option<usize>,
}

/// Toolchain paths and settings shared by all builders in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    /// pybind11's CMake config directory, if it could be found
    pub toolchain_support_dir: Option<PathBuf>,

    /// Environment prefix, if one was given
    pub prefix: Option<PathBuf>,

    /// Defaults first, then the prefix-derived directory
    pub extra_include_paths: Vec<PathBuf>,

    pub build_parallelism: NonZeroUsize,

    /// Non-fatal problems found while resolving
    pub warnings: Vec<BuildWarning>,
}

impl ResolvedEnvironment {
    pub fn toolchain_support_dir(&self) -> Option<&Path> {
        self.toolchain_support_dir.as_deref()
    }

    pub fn prefix(&self) -> Option<&Path> {
        self.prefix.as_deref()
    }
}

/// Computes a [`ResolvedEnvironment`] once per run.
pub struct EnvironmentResolver<'a> {
    inputs: EnvInputs,
    probe: &'a dyn ToolchainProbe,
}

impl<'a> EnvironmentResolver<'a> {
    pub fn new(inputs: EnvInputs, probe: &'a dyn ToolchainProbe) -> Self {
        EnvironmentResolver { inputs, probe }
    }

    /// Resolve the environment. Never fails; problems become warnings.
    pub fn resolve(&self) -> ResolvedEnvironment {
        let mut warnings = Vec::new();

        let toolchain_support_dir = match self.probe.discover() {
            ToolchainDiscovery::Found(dir) => {
                tracing::info!("Using pybind11 CMake directory {}", dir.display());
                Some(dir)
            }
            ToolchainDiscovery::Unavailable(reason) => {
                let warning = BuildWarning::ToolchainDiscovery { reason };
                tracing::warn!("{}", warning);
                warnings.push(warning);
                None
            }
        };

        // An empty prefix is the same as no prefix.
        let prefix = self
            .inputs
            .prefix
            .clone()
            .filter(|p| !p.as_os_str().is_empty());

        let mut extra_include_paths: Vec<PathBuf> =
            DEFAULT_INCLUDE_DIRS.iter().map(PathBuf::from).collect();
        if let Some(ref prefix) = prefix {
            extra_include_paths.push(prefix.join(PREFIX_INCLUDE_SUBDIR));
        }

        let build_parallelism = self
            .inputs
            .jobs
            .and_then(NonZeroUsize::new)
            .or_else(|| std::thread::available_parallelism().ok())
            .unwrap_or(NonZeroUsize::MIN);

        tracing::debug!(
            "Resolved environment: prefix={:?}, parallelism={}, includes={:?}",
            prefix,
            build_parallelism,
            extra_include_paths
        );

        ResolvedEnvironment {
            toolchain_support_dir,
            prefix,
            extra_include_paths,
            build_parallelism,
            warnings,
        }
    }
}
