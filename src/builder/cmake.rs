//! CMake module builder.
//!
//! Builds the native module in two phases, `cmake <src>` then `make -jN`,
//! inside a build directory that is wiped before every run.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::collect::{ArtifactCollector, ArtifactDestination};
use crate::builder::env::ResolvedEnvironment;
use crate::builder::error::BuildWarning;
use crate::builder::{BuildOutcome, TargetBuilder};
use crate::core::target::CONFIGURE_TOOL;
use crate::core::{BuildResult, BuildStage, BuildTarget};
use crate::util::fs::recreate_dir;
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessStatus, SPAWN_FAILURE_CODE};

/// CMake build adapter.
pub struct CMakeBuilder<'a> {
    runner: &'a dyn CommandRunner,
    cmake: PathBuf,
    make: PathBuf,
    destination: ArtifactDestination,
    collector: ArtifactCollector,
}

impl<'a> CMakeBuilder<'a> {
    /// Create a new CMake builder whose artifacts land at the top of `package`.
    pub fn new(runner: &'a dyn CommandRunner, package: impl Into<String>) -> Self {
        CMakeBuilder {
            runner,
            cmake: PathBuf::from("cmake"),
            make: PathBuf::from("make"),
            destination: ArtifactDestination::PackageRoot {
                package: package.into(),
            },
            collector: ArtifactCollector::new(),
        }
    }

    /// Use a specific cmake executable.
    pub fn cmake(mut self, cmake: impl Into<PathBuf>) -> Self {
        self.cmake = cmake.into();
        self
    }

    /// Use a specific make executable.
    pub fn make(mut self, make: impl Into<PathBuf>) -> Self {
        self.make = make.into();
        self
    }

    /// Arguments for the configure phase, after the source directory.
    pub fn configure_args(target: &BuildTarget, env: &ResolvedEnvironment) -> Vec<String> {
        let mut args: Vec<String> = target.flags(CONFIGURE_TOOL).to_vec();

        if let Some(dir) = env.toolchain_support_dir() {
            args.push(format!("-Dpybind11_DIR={}", dir.display()));
        }

        if let Some(prefix) = env.prefix() {
            args.push(format!("-DCMAKE_PREFIX_PATH={}", prefix.display()));
        }

        args
    }

    fn configure_command(&self, target: &BuildTarget, env: &ResolvedEnvironment) -> ProcessBuilder {
        ProcessBuilder::new(&self.cmake)
            .arg(target.root())
            .args(Self::configure_args(target, env))
            .cwd(target.build_dir())
    }

    fn compile_command(&self, target: &BuildTarget, env: &ResolvedEnvironment) -> ProcessBuilder {
        ProcessBuilder::new(&self.make)
            .arg(format!("-j{}", env.build_parallelism))
            .cwd(target.build_dir())
    }

    /// Run a phase; a program that cannot be started counts as a failed phase.
    fn run_phase(&self, cmd: &ProcessBuilder) -> ProcessStatus {
        tracing::info!("Running `{}`", cmd.display_command());
        match self.runner.status(cmd) {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("{:#}", e);
                ProcessStatus::from_code(Some(SPAWN_FAILURE_CODE))
            }
        }
    }
}

impl TargetBuilder for CMakeBuilder<'_> {
    fn build(&self, target: &BuildTarget, env: &ResolvedEnvironment) -> Result<BuildOutcome> {
        tracing::info!("Building {} extension with CMake", target.name());

        // Stale CMakeCache.txt entries would survive a reconfigure.
        recreate_dir(target.build_dir())?;

        let status = self.run_phase(&self.configure_command(target, env));
        if !status.success() {
            tracing::error!(
                "Error building {}: configure exited with code {}",
                target.name(),
                status.exit_code()
            );
            return Ok(BuildOutcome::new(BuildResult::failure(
                BuildStage::Configure,
                target.name(),
                status.exit_code(),
            )));
        }

        let status = self.run_phase(&self.compile_command(target, env));
        if !status.success() {
            tracing::error!(
                "Error building {}: compile exited with code {}",
                target.name(),
                status.exit_code()
            );
            return Ok(BuildOutcome::new(BuildResult::failure(
                BuildStage::Compile,
                target.name(),
                status.exit_code(),
            )));
        }

        tracing::info!(
            "Successfully built {} in {}",
            target.name(),
            target.build_dir().display()
        );

        let artifacts = self.collector.collect(
            target.build_dir(),
            target.output_pattern(),
            &self.destination,
        )?;

        let mut outcome = BuildOutcome::new(BuildResult::Success(artifacts.clone()));
        if artifacts.is_empty() {
            let warning = BuildWarning::ArtifactNotFound {
                target: target.name().to_string(),
                pattern: target.output_pattern().to_string(),
                build_dir: target.build_dir().to_path_buf(),
            };
            tracing::warn!("{}", warning);
            outcome.warnings.push(warning);
        }

        Ok(outcome)
    }
}
