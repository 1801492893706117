//! High-level operations.
//!
//! This module contains the implementation of fpbuild commands.

pub mod build;
pub mod clean;
pub mod frontend;

pub use build::{build, BuildOptions, BuildOrchestrator, BuildReport, OrchestratorState};
pub use clean::clean;
pub use frontend::{Frontend, HookFrontend, SetupFrontend};
