//! Configuration file support for fpbuild.
//!
//! Two optional locations are consulted:
//! - Global: `~/.fpbuild/config.toml` - User-wide defaults
//! - Project: `fpbuild.toml` at the project root - Project-specific overrides
//!
//! Project config takes precedence over global config. Missing files are not
//! an error; every field has a default matching the FoundationPose layout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project-level config file.
pub const PROJECT_CONFIG_FILE: &str = "fpbuild.toml";

/// fpbuild configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source layout of the package being built
    pub project: ProjectConfig,

    /// Build settings
    pub build: BuildConfig,

    /// External program overrides
    pub toolchain: ToolchainSettings,
}

/// Where sources live and what the produced binaries look like.
///
/// Fields left unset fall back to the defaults in [`crate::core::layout`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Top-level Python package that receives the module library
    pub package: Option<String>,

    /// CMake source directory of the native module, relative to the root
    pub module_dir: Option<PathBuf>,

    /// Glob for the module library inside its build directory
    pub module_pattern: Option<String>,

    /// Directory holding the GPU extension sources, relative to the root
    pub extension_dir: Option<PathBuf>,

    /// Glob for extension binaries inside their build directories
    pub extension_pattern: Option<String>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Parallel jobs handed to the toolchains (None = auto-detect)
    pub jobs: Option<usize>,

    /// Treat a module build with no located library as a failure
    pub strict_artifacts: bool,

    /// Ask the extension toolchain for verbose output
    pub verbose_extensions: Option<bool>,
}

/// Paths to the external programs the builders invoke.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to cmake
    pub cmake: Option<PathBuf>,

    /// Path to make
    pub make: Option<PathBuf>,

    /// Python interpreter with torch and pybind11 installed
    pub python: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let Config {
            project,
            build,
            toolchain,
        } = other;

        if project.package.is_some() {
            self.project.package = project.package;
        }
        if project.module_dir.is_some() {
            self.project.module_dir = project.module_dir;
        }
        if project.module_pattern.is_some() {
            self.project.module_pattern = project.module_pattern;
        }
        if project.extension_dir.is_some() {
            self.project.extension_dir = project.extension_dir;
        }
        if project.extension_pattern.is_some() {
            self.project.extension_pattern = project.extension_pattern;
        }

        if build.jobs.is_some() {
            self.build.jobs = build.jobs;
        }
        if build.strict_artifacts {
            self.build.strict_artifacts = true;
        }
        if build.verbose_extensions.is_some() {
            self.build.verbose_extensions = build.verbose_extensions;
        }

        if toolchain.cmake.is_some() {
            self.toolchain.cmake = toolchain.cmake;
        }
        if toolchain.make.is_some() {
            self.toolchain.make = toolchain.make;
        }
        if toolchain.python.is_some() {
            self.toolchain.python = toolchain.python;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`fpbuild.toml`)
/// 2. Global config (`~/.fpbuild/config.toml`)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global fpbuild config directory (`~/.fpbuild`).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".fpbuild"))
}

/// Get the global config path (`~/.fpbuild/config.toml`).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (`<root>/fpbuild.toml`).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_FILE)
}
