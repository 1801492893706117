//! Core data types: build targets, the project layout and build outcomes.

pub mod artifact;
pub mod layout;
pub mod target;

pub use artifact::{BuildArtifact, BuildFailure, BuildResult, BuildStage, PackagingManifest};
pub use layout::{ProjectLayout, TargetSet};
pub use target::{BuildTarget, TargetKind};
