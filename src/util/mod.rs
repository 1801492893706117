//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod process;

pub use config::Config;
pub use context::{GlobalContext, Programs};
pub use diagnostic::Diagnostic;
pub use process::{CommandRunner, ProcessBuilder, SystemRunner};
