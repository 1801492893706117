//! JIT extension builder.
//!
//! GPU extensions are compiled by the extension toolchain itself through a
//! single load-and-build call. The toolchain owns incremental compilation
//! inside the target's build directory; this module only prepares the
//! request and interprets the result.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use crate::builder::collect::ArtifactDestination;
use crate::builder::env::ResolvedEnvironment;
use crate::builder::{BuildOutcome, TargetBuilder};
use crate::core::target::{DEVICE_COMPILER, HOST_COMPILER};
use crate::core::{BuildResult, BuildStage, BuildTarget};
use crate::util::fs::ensure_dir;
use crate::util::process::{CommandRunner, ProcessBuilder, SPAWN_FAILURE_CODE};

/// Line prefix the driver uses to report the built module's path.
pub const ARTIFACT_MARKER: &str = "FPBUILD_ARTIFACT=";

/// Trailing stderr lines kept in a toolchain failure message.
const FAILURE_TAIL_LINES: usize = 5;

/// Python driver run by [`TorchExtensionToolchain`]. Reads the request as JSON on stdin.
const TORCH_DRIVER: &str = r#"
import json
import sys

from torch.utils.cpp_extension import load

req = json.load(sys.stdin)
module = load(
    name=req["name"],
    sources=req["sources"],
    extra_cflags=req["extra_cflags"],
    extra_cuda_cflags=req["extra_cuda_cflags"],
    extra_include_paths=req["extra_include_paths"],
    build_directory=req["build_directory"],
    verbose=req["verbose"],
)
print("FPBUILD_ARTIFACT=" + module.__file__, flush=True)
"#;

/// Everything the toolchain needs to build one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionRequest {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub extra_cflags: Vec<String>,
    pub extra_cuda_cflags: Vec<String>,
    pub extra_include_paths: Vec<PathBuf>,
    pub build_directory: PathBuf,
    pub verbose: bool,
    #[serde(skip)]
    pub parallelism: NonZeroUsize,
}

impl ExtensionRequest {
    pub fn from_target(target: &BuildTarget, env: &ResolvedEnvironment, verbose: bool) -> Self {
        ExtensionRequest {
            name: target.name().to_string(),
            sources: target.sources().to_vec(),
            extra_cflags: target.flags(HOST_COMPILER).to_vec(),
            extra_cuda_cflags: target.flags(DEVICE_COMPILER).to_vec(),
            extra_include_paths: target.include_paths().to_vec(),
            build_directory: target.build_dir().to_path_buf(),
            verbose,
            parallelism: env.build_parallelism,
        }
    }
}

/// Why the extension toolchain did not produce a module.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("failed to launch the extension toolchain: {0}")]
    Launch(String),

    #[error("extension toolchain exited with code {exit_code}: {message}")]
    Failed { exit_code: i32, message: String },

    #[error("extension toolchain did not report a module path")]
    NoArtifact,
}

impl ExtensionError {
    /// Exit code recorded in the build failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExtensionError::Launch(_) => SPAWN_FAILURE_CODE,
            ExtensionError::Failed { exit_code, .. } => *exit_code,
            ExtensionError::NoArtifact => 1,
        }
    }
}

/// A toolchain that builds an extension in place and reports the binary it produced.
pub trait ExtensionToolchain {
    fn load(&self, request: &ExtensionRequest) -> Result<PathBuf, ExtensionError>;
}

/// `torch.utils.cpp_extension.load`, driven through a Python interpreter.
pub struct TorchExtensionToolchain<'a> {
    python: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> TorchExtensionToolchain<'a> {
    pub fn new(python: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        TorchExtensionToolchain {
            python: python.into(),
            runner,
        }
    }

    fn command(&self, request: &ExtensionRequest) -> Result<ProcessBuilder, ExtensionError> {
        let payload =
            serde_json::to_string(request).map_err(|e| ExtensionError::Launch(e.to_string()))?;

        Ok(ProcessBuilder::new(&self.python)
            .args(["-c", TORCH_DRIVER])
            .env("MAX_JOBS", request.parallelism.to_string())
            .stdin(payload))
    }
}

impl ExtensionToolchain for TorchExtensionToolchain<'_> {
    fn load(&self, request: &ExtensionRequest) -> Result<PathBuf, ExtensionError> {
        let cmd = self.command(request)?;
        let output = self
            .runner
            .output(&cmd)
            .map_err(|e| ExtensionError::Launch(format!("{:#}", e)))?;

        let mut artifact = None;
        for line in output.stdout.lines() {
            match line.strip_prefix(ARTIFACT_MARKER) {
                Some(path) => artifact = Some(PathBuf::from(path.trim())),
                None if request.verbose => tracing::info!("[{}] {}", request.name, line),
                None => tracing::debug!("[{}] {}", request.name, line),
            }
        }
        let failed = !output.status.success();
        for line in output.stderr.lines() {
            if failed {
                tracing::warn!("[{}] {}", request.name, line);
            } else if request.verbose {
                tracing::info!("[{}] {}", request.name, line);
            } else {
                tracing::debug!("[{}] {}", request.name, line);
            }
        }

        if failed {
            let mut tail: Vec<&str> = output
                .stderr
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .rev()
                .take(FAILURE_TAIL_LINES)
                .collect();
            tail.reverse();
            let message = if tail.is_empty() {
                "no error output".to_string()
            } else {
                tail.join("\n")
            };
            return Err(ExtensionError::Failed {
                exit_code: output.status.exit_code(),
                message,
            });
        }

        artifact.ok_or(ExtensionError::NoArtifact)
    }
}

/// Builds GPU extensions through an [`ExtensionToolchain`].
pub struct JitExtensionBuilder<'a> {
    toolchain: &'a dyn ExtensionToolchain,
    project_root: PathBuf,
    verbose: bool,
}

impl<'a> JitExtensionBuilder<'a> {
    /// Artifacts land next to their extension's sources, relative to `project_root`.
    pub fn new(toolchain: &'a dyn ExtensionToolchain, project_root: &Path) -> Self {
        JitExtensionBuilder {
            toolchain,
            project_root: project_root.to_path_buf(),
            verbose: true,
        }
    }

    fn destination(&self, target: &BuildTarget) -> ArtifactDestination {
        ArtifactDestination::ProjectRelative {
            root: self.project_root.clone(),
            namespace_dir: target.root().to_path_buf(),
        }
    }

    /// Whether to ask the toolchain for verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl TargetBuilder for JitExtensionBuilder<'_> {
    fn build(&self, target: &BuildTarget, env: &ResolvedEnvironment) -> Result<BuildOutcome> {
        tracing::info!("Building {} extension...", target.name());

        // The toolchain expects its cache directory to exist.
        ensure_dir(target.build_dir())?;

        let request = ExtensionRequest::from_target(target, env, self.verbose);
        match self.toolchain.load(&request) {
            Ok(path) => {
                let path = if path.is_relative() {
                    target.build_dir().join(path)
                } else {
                    path
                };
                tracing::info!("Successfully built {} extension", target.name());
                let artifact = self.destination(target).artifact(path);
                Ok(BuildOutcome::new(BuildResult::Success(
                    [artifact].into_iter().collect(),
                )))
            }
            Err(e) => {
                tracing::error!("Error building {} extension: {}", target.name(), e);
                Ok(BuildOutcome::new(BuildResult::failure(
                    BuildStage::Compile,
                    target.name(),
                    e.exit_code(),
                )))
            }
        }
    }
}
