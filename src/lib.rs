//! fpbuild - build orchestration for the FoundationPose native extensions
//!
//! This crate builds the CMake-based native module and the JIT-compiled GPU
//! extensions, then reports the produced binaries as a packaging manifest.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for fpbuild unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides scripted process execution and a fake
/// extension toolchain.
#[cfg(test)]
pub mod test_support;

pub use core::{BuildArtifact, BuildResult, BuildTarget, PackagingManifest, ProjectLayout};
pub use ops::{BuildOptions, BuildOrchestrator, BuildReport};
pub use util::context::GlobalContext;
