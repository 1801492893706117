//! Builders for the native module and the GPU extensions.
//!
//! Each builder turns one [`BuildTarget`] into a [`BuildResult`]. Toolchain
//! failures are results, not errors; `Err` is reserved for problems that
//! keep a build from running at all (e.g. an unwritable build directory).

pub mod clean;
pub mod cmake;
pub mod collect;
pub mod env;
pub mod error;
pub mod extension;

use anyhow::Result;

use crate::core::{BuildResult, BuildTarget};

pub use clean::{CleanReport, Cleaner};
pub use cmake::CMakeBuilder;
pub use collect::{ArtifactCollector, ArtifactDestination};
pub use env::{
    EnvInputs, EnvironmentResolver, Pybind11Probe, ResolvedEnvironment, ToolchainDiscovery,
    ToolchainProbe,
};
pub use error::{BuildError, BuildWarning};
pub use extension::{
    ExtensionError, ExtensionRequest, ExtensionToolchain, JitExtensionBuilder,
    TorchExtensionToolchain,
};

/// Result of one builder invocation plus the warnings it raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub result: BuildResult,
    pub warnings: Vec<BuildWarning>,
}

impl BuildOutcome {
    pub fn new(result: BuildResult) -> Self {
        BuildOutcome {
            result,
            warnings: Vec::new(),
        }
    }
}

/// Builds a single target.
pub trait TargetBuilder {
    fn build(&self, target: &BuildTarget, env: &ResolvedEnvironment) -> Result<BuildOutcome>;
}
