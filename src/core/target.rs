//! Build target descriptors.
//!
//! A [`BuildTarget`] is the static description of one buildable unit: the
//! CMake-built module or one of the JIT-compiled GPU extensions. Targets are
//! assembled once per run by [`crate::core::layout::ProjectLayout`] and are
//! never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Flag-table key for arguments passed to the configure step.
pub const CONFIGURE_TOOL: &str = "cmake";

/// Flag-table key for host (C++) compiler flags.
pub const HOST_COMPILER: &str = "gcc";

/// Flag-table key for device (CUDA) compiler flags.
pub const DEVICE_COMPILER: &str = "nvcc";

/// Configure arguments every module build starts with.
pub const MODULE_CONFIGURE_FLAGS: &[&str] = &["-DCMAKE_BUILD_TYPE=Release"];

/// Host compiler flags for the GPU extensions.
pub const EXTENSION_HOST_FLAGS: &[&str] = &["-O3", "-std=c++17"];

/// Device compiler flags for the GPU extensions.
///
/// The `-U` entries re-enable the half-precision operators and conversions
/// that torch's extension toolchain disables by default.
pub const EXTENSION_DEVICE_FLAGS: &[&str] = &[
    "-Xcompiler",
    "-O3",
    "-std=c++17",
    "-U__CUDA_NO_HALF_OPERATORS__",
    "-U__CUDA_NO_HALF_CONVERSIONS__",
    "-U__CUDA_NO_HALF2_OPERATORS__",
];

/// How a target is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Configure + compile through CMake and make.
    Module,
    /// Single load-and-build call into the extension toolchain.
    Extension,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Module => write!(f, "module"),
            TargetKind::Extension => write!(f, "extension"),
        }
    }
}

/// Static description of one buildable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    name: String,
    kind: TargetKind,
    root: PathBuf,
    sources: Vec<PathBuf>,
    compile_flags: BTreeMap<String, Vec<String>>,
    include_paths: Vec<PathBuf>,
    build_dir: PathBuf,
    output_pattern: String,
}

impl BuildTarget {
    /// Create a target with no sources, flags or include paths.
    ///
    /// `root` is the directory the target's sources are relative to; for a
    /// module it is the CMake source directory.
    pub fn new(
        name: impl Into<String>,
        kind: TargetKind,
        root: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        output_pattern: impl Into<String>,
    ) -> Self {
        BuildTarget {
            name: name.into(),
            kind,
            root: root.into(),
            sources: Vec::new(),
            compile_flags: BTreeMap::new(),
            include_paths: Vec::new(),
            build_dir: build_dir.into(),
            output_pattern: output_pattern.into(),
        }
    }

    /// Append source files, keeping their order.
    pub fn with_sources<I, P>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let root = self.root.clone();
        self.sources
            .extend(sources.into_iter().map(|s| root.join(s.as_ref())));
        self
    }

    /// Set the flags for one toolchain.
    pub fn with_flags<I, S>(mut self, toolchain: &str, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compile_flags.insert(
            toolchain.to_string(),
            flags.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Append include directories, keeping their order.
    pub fn with_include_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_paths.extend(paths);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Flags registered for `toolchain`, empty if none.
    pub fn flags(&self, toolchain: &str) -> &[String] {
        self.compile_flags
            .get(toolchain)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn compile_flags(&self) -> &BTreeMap<String, Vec<String>> {
        &self.compile_flags
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn output_pattern(&self) -> &str {
        &self.output_pattern
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.name)
    }
}
