//! Build error and warning types.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::{BuildFailure, BuildStage};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Non-fatal conditions. They are logged and the pipeline continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildWarning {
    #[error("could not locate the pybind11 CMake directory: {reason}")]
    ToolchainDiscovery { reason: String },

    #[error("`{target}` reported success but no file matching `{pattern}` was found in {}", .build_dir.display())]
    ArtifactNotFound {
        target: String,
        pattern: String,
        build_dir: PathBuf,
    },
}

/// Fatal conditions. Any of these aborts the whole orchestration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configure phase failed for `{target}` (exit code {exit_code})")]
    Configure { target: String, exit_code: i32 },

    #[error("compile phase failed for `{target}` (exit code {exit_code})")]
    Compile { target: String, exit_code: i32 },

    #[error("no library produced for `{target}`")]
    ArtifactNotFound {
        target: String,
        pattern: String,
        build_dir: PathBuf,
    },

    #[error("`{first}` and `{second}` share build directory {}", .dir.display())]
    SharedBuildDirectory {
        first: String,
        second: String,
        dir: PathBuf,
    },

    #[error("build of `{target}` could not run: {message}")]
    Setup { target: String, message: String },
}

impl BuildError {
    /// Stage and target of a toolchain failure.
    pub fn stage(&self) -> Option<BuildStage> {
        match self {
            BuildError::Configure { .. } => Some(BuildStage::Configure),
            BuildError::Compile { .. } => Some(BuildStage::Compile),
            _ => None,
        }
    }

    /// Name of the target the error is about, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            BuildError::Configure { target, .. }
            | BuildError::Compile { target, .. }
            | BuildError::ArtifactNotFound { target, .. }
            | BuildError::Setup { target, .. } => Some(target.as_str()),
            BuildError::SharedBuildDirectory { .. } => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            BuildError::Configure { .. } => diag
                .with_context("stage: configure")
                .with_suggestion(suggestions::CONFIGURE_FAILED)
                .with_suggestion(suggestions::COMPILE_FAILED),
            BuildError::Compile { .. } => diag
                .with_context("stage: compile")
                .with_suggestion(suggestions::COMPILE_FAILED)
                .with_suggestion(suggestions::EXTENSION_TOOLCHAIN),
            BuildError::ArtifactNotFound {
                pattern, build_dir, ..
            } => diag
                .with_location(build_dir.clone())
                .with_context(format!("pattern: {}", pattern))
                .with_suggestion(suggestions::ARTIFACT_NOT_FOUND),
            BuildError::SharedBuildDirectory { dir, .. } => diag
                .with_location(dir.clone())
                .with_suggestion(suggestions::SHARED_BUILD_DIR),
            BuildError::Setup { .. } => diag.with_suggestion(suggestions::COMPILE_FAILED),
        }
    }
}

impl From<BuildFailure> for BuildError {
    fn from(failure: BuildFailure) -> Self {
        let BuildFailure {
            stage,
            target,
            exit_code,
        } = failure;
        match stage {
            BuildStage::Configure => BuildError::Configure { target, exit_code },
            BuildStage::Compile => BuildError::Compile { target, exit_code },
        }
    }
}

impl From<BuildWarning> for Diagnostic {
    fn from(warning: BuildWarning) -> Self {
        Diagnostic::warning(warning.to_string())
    }
}
