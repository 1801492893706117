//! Artifact collection.
//!
//! Finds produced binaries and decides where each one goes in the
//! distributable layout. Collection only reads the filesystem.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::BuildArtifact;
use crate::util::fs::{glob_files, relative_path, to_slash};

/// Placement rule for collected binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactDestination {
    /// Relocate to the top of the installed package: `<package>/<filename>`.
    PackageRoot { package: String },

    /// Place in the import namespace of `namespace_dir`:
    /// `<namespace_dir relative to root>/<filename>`.
    ///
    /// Where the file was built does not matter, only its name.
    ProjectRelative { root: PathBuf, namespace_dir: PathBuf },
}

impl ArtifactDestination {
    /// Destination of `source`. Same input, same answer.
    pub fn destination_for(&self, source: &Path) -> String {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self {
            ArtifactDestination::PackageRoot { package } => format!("{}/{}", package, file_name),
            ArtifactDestination::ProjectRelative {
                root,
                namespace_dir,
            } => {
                let namespace = to_slash(&relative_path(root, namespace_dir));
                if namespace.is_empty() {
                    file_name
                } else {
                    format!("{}/{}", namespace, file_name)
                }
            }
        }
    }

    pub fn artifact(&self, source: impl Into<PathBuf>) -> BuildArtifact {
        let source = source.into();
        let destination = self.destination_for(&source);
        BuildArtifact::new(source, destination)
    }
}

/// Scans build directories for binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactCollector;

impl ArtifactCollector {
    pub fn new() -> Self {
        ArtifactCollector
    }

    /// Collect every file in `build_dir` matching `pattern`.
    ///
    /// A missing directory or zero matches give an empty set; whoever ran the
    /// build decides whether that deserves a warning.
    pub fn collect(
        &self,
        build_dir: &Path,
        pattern: &str,
        destination: &ArtifactDestination,
    ) -> Result<BTreeSet<BuildArtifact>> {
        let artifacts: BTreeSet<_> = glob_files(build_dir, pattern)?
            .into_iter()
            .map(|path| destination.artifact(path))
            .collect();

        for artifact in &artifacts {
            tracing::debug!(
                "Collected {} as {}",
                artifact.source_path.display(),
                artifact.destination
            );
        }

        Ok(artifacts)
    }
}
