//! Source layout of the package and the targets derived from it.
//!
//! The defaults describe the FoundationPose tree:
//!
//! ```text
//! <root>/
//!   mycpp/                              CMake module, built into mycpp/build/
//!   foundationpose/bundlesdf/mycuda/    GPU extension sources
//!     build/common/                     cache + binary of `common`
//!     build/gridencoder/                cache + binary of `gridencoder`
//! ```
//!
//! Every path can be overridden from the `[project]` section of `fpbuild.toml`.

use std::path::{Path, PathBuf};

use crate::core::target::{
    BuildTarget, TargetKind, CONFIGURE_TOOL, DEVICE_COMPILER, EXTENSION_DEVICE_FLAGS,
    EXTENSION_HOST_FLAGS, HOST_COMPILER, MODULE_CONFIGURE_FLAGS,
};
use crate::util::config::ProjectConfig;

pub const DEFAULT_PACKAGE: &str = "foundationpose";
pub const DEFAULT_MODULE_DIR: &str = "mycpp";
pub const DEFAULT_MODULE_PATTERN: &str = "mycpp*.so";
pub const DEFAULT_EXTENSION_DIR: &str = "foundationpose/bundlesdf/mycuda";
pub const DEFAULT_EXTENSION_PATTERN: &str = "*.so";

/// Build directory of the module, relative to its source directory.
pub const MODULE_BUILD_SUBDIR: &str = "build";

/// Parent of the per-extension build directories, relative to the extension dir.
pub const EXTENSION_BUILD_SUBDIR: &str = "build";

/// A GPU extension: its name and its sources relative to the extension dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub name: &'static str,
    pub sources: &'static [&'static str],
}

/// The GPU extensions in build order.
pub const EXTENSIONS: &[ExtensionSpec] = &[
    ExtensionSpec {
        name: "common",
        sources: &["bindings.cpp", "common.cu"],
    },
    ExtensionSpec {
        name: "gridencoder",
        sources: &[
            "torch_ngp_grid_encoder/gridencoder.cu",
            "torch_ngp_grid_encoder/bindings.cpp",
        ],
    },
];

/// Resolved project layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    package: String,
    module_dir: PathBuf,
    module_pattern: String,
    extension_dir: PathBuf,
    extension_pattern: String,
}

impl ProjectLayout {
    /// Layout with all defaults, rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &ProjectConfig::default())
    }

    /// Layout rooted at `root` with overrides from `config`.
    pub fn from_config(root: impl Into<PathBuf>, config: &ProjectConfig) -> Self {
        let root = root.into();
        let module_dir = config
            .module_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE_DIR));
        let extension_dir = config
            .extension_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXTENSION_DIR));

        ProjectLayout {
            package: config
                .package
                .clone()
                .unwrap_or_else(|| DEFAULT_PACKAGE.to_string()),
            module_dir: root.join(module_dir),
            module_pattern: config
                .module_pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_MODULE_PATTERN.to_string()),
            extension_dir: root.join(extension_dir),
            extension_pattern: config
                .extension_pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTENSION_PATTERN.to_string()),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Top-level package that receives the module library.
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// Name of the CMake module, taken from its directory name.
    pub fn module_name(&self) -> String {
        self.module_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MODULE_DIR.to_string())
    }

    pub fn module_build_dir(&self) -> PathBuf {
        self.module_dir.join(MODULE_BUILD_SUBDIR)
    }

    pub fn module_pattern(&self) -> &str {
        &self.module_pattern
    }

    pub fn extension_dir(&self) -> &Path {
        &self.extension_dir
    }

    pub fn extension_build_dir(&self, name: &str) -> PathBuf {
        self.extension_dir.join(EXTENSION_BUILD_SUBDIR).join(name)
    }

    pub fn extension_pattern(&self) -> &str {
        &self.extension_pattern
    }

    /// The CMake module target.
    ///
    /// `include_paths` are recorded for completeness; the CMake project
    /// finds its dependencies through the prefix path instead.
    pub fn module_target(&self, include_paths: &[PathBuf]) -> BuildTarget {
        BuildTarget::new(
            self.module_name(),
            TargetKind::Module,
            self.module_dir.clone(),
            self.module_build_dir(),
            self.module_pattern.clone(),
        )
        .with_sources(["CMakeLists.txt"])
        .with_flags(CONFIGURE_TOOL, MODULE_CONFIGURE_FLAGS.iter().copied())
        .with_include_paths(include_paths.iter().cloned())
    }

    /// One target per GPU extension, in build order.
    pub fn extension_targets(&self, include_paths: &[PathBuf]) -> Vec<BuildTarget> {
        EXTENSIONS
            .iter()
            .map(|spec| {
                BuildTarget::new(
                    spec.name,
                    TargetKind::Extension,
                    self.extension_dir.clone(),
                    self.extension_build_dir(spec.name),
                    self.extension_pattern.clone(),
                )
                .with_sources(spec.sources.iter())
                .with_flags(HOST_COMPILER, EXTENSION_HOST_FLAGS.iter().copied())
                .with_flags(DEVICE_COMPILER, EXTENSION_DEVICE_FLAGS.iter().copied())
                .with_include_paths(include_paths.iter().cloned())
            })
            .collect()
    }

    /// All targets of one run.
    pub fn targets(&self, include_paths: &[PathBuf]) -> TargetSet {
        TargetSet {
            module: self.module_target(include_paths),
            extensions: self.extension_targets(include_paths),
        }
    }
}

/// The module target followed by the extension targets.
#[derive(Debug, Clone)]
pub struct TargetSet {
    pub module: BuildTarget,
    pub extensions: Vec<BuildTarget>,
}

impl TargetSet {
    pub fn iter(&self) -> impl Iterator<Item = &BuildTarget> {
        std::iter::once(&self.module).chain(self.extensions.iter())
    }

    /// First pair of targets whose build directories overlap, if any.
    ///
    /// Directories overlap when equal or when one contains the other, since
    /// the module build wipes its whole directory.
    pub fn overlapping_build_dirs(&self) -> Option<(&BuildTarget, &BuildTarget)> {
        let targets: Vec<&BuildTarget> = self.iter().collect();
        for (i, a) in targets.iter().enumerate() {
            for b in &targets[i + 1..] {
                if a.build_dir().starts_with(b.build_dir())
                    || b.build_dir().starts_with(a.build_dir())
                {
                    return Some((a, b));
                }
            }
        }
        None
    }
}
