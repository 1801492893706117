//! Build outcomes and the packaging manifest.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A produced binary and where it belongs in the distributable package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BuildArtifact {
    /// Absolute path of the binary on disk
    pub source_path: PathBuf,

    /// Path inside the package layout, `/`-separated
    pub destination: String,
}

impl BuildArtifact {
    pub fn new(source_path: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        BuildArtifact {
            source_path: source_path.into(),
            destination: destination.into(),
        }
    }
}

/// The external phase a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildStage {
    Configure,
    Compile,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStage::Configure => write!(f, "configure"),
            BuildStage::Compile => write!(f, "compile"),
        }
    }
}

/// A failed build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub stage: BuildStage,
    pub target: String,
    pub exit_code: i32,
}

/// Outcome of building a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildResult {
    Success(BTreeSet<BuildArtifact>),
    Failure(BuildFailure),
}

impl BuildResult {
    pub fn failure(stage: BuildStage, target: impl Into<String>, exit_code: i32) -> Self {
        BuildResult::Failure(BuildFailure {
            stage,
            target: target.into(),
            exit_code,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success(_))
    }
}

/// Mapping from absolute artifact path to destination inside the package.
///
/// This is the only thing handed to the packaging step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackagingManifest {
    entries: BTreeMap<PathBuf, String>,
}

impl PackagingManifest {
    pub fn new() -> Self {
        PackagingManifest::default()
    }

    /// Record an artifact. A later entry for the same source path wins.
    pub fn insert(&mut self, artifact: BuildArtifact) {
        self.entries
            .insert(artifact.source_path, artifact.destination);
    }

    pub fn extend(&mut self, artifacts: impl IntoIterator<Item = BuildArtifact>) {
        for artifact in artifacts {
            self.insert(artifact);
        }
    }

    pub fn get(&self, source_path: &Path) -> Option<&str> {
        self.entries.get(source_path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, String> {
        self.entries.iter()
    }

    /// Destinations in source-path order.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a PackagingManifest {
    type Item = (&'a PathBuf, &'a String);
    type IntoIter = btree_map::Iter<'a, PathBuf, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
