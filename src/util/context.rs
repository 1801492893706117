//! Global context for fpbuild operations.
//!
//! Bundles the project root, the merged configuration and the external
//! programs discovered for this run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{global_config_path, load_config, project_config_path, Config, ToolchainSettings};
use crate::util::fs::normalize_path;
use crate::util::process::resolve_program;

/// External programs invoked by the builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programs {
    pub cmake: PathBuf,
    pub make: PathBuf,
    pub python: PathBuf,
}

impl Programs {
    /// Resolve programs from config overrides, falling back to PATH lookup.
    pub fn detect(settings: &ToolchainSettings) -> Self {
        Programs {
            cmake: resolve_program(settings.cmake.as_deref(), &["cmake"]),
            make: resolve_program(settings.make.as_deref(), &["make", "gmake"]),
            python: resolve_program(settings.python.as_deref(), &["python3", "python"]),
        }
    }
}

/// Per-invocation context.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    project_root: PathBuf,
    config: Config,
    programs: Programs,
}

impl GlobalContext {
    /// Create a context rooted at `root`, or at the current directory.
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir().context("failed to get current directory")?,
        };

        if !root.is_dir() {
            anyhow::bail!("project root `{}` is not a directory", root.display());
        }

        let project_root = normalize_path(&root);
        let config = load_config(
            global_config_path().as_deref(),
            &project_config_path(&project_root),
        );

        Ok(Self::with_config(project_root, config))
    }

    /// Create a context from an already-loaded configuration.
    pub fn with_config(project_root: PathBuf, config: Config) -> Self {
        let programs = Programs::detect(&config.toolchain);
        GlobalContext {
            project_root,
            config,
            programs,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn programs(&self) -> &Programs {
        &self.programs
    }
}
