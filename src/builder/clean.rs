//! Teardown of build outputs.

use std::path::{Path, PathBuf};

use crate::core::ProjectLayout;
use crate::util::fs::{glob_files, remove_dir_all_if_exists};

/// What a clean pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Directories and files that were deleted
    pub removed: Vec<PathBuf>,

    /// Paths that could not be deleted, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Removes the module build directory and extension binaries, both from
/// each extension's build directory and from the extension directory itself.
///
/// Safe to run any number of times, including on a fresh checkout.
pub struct Cleaner<'a> {
    layout: &'a ProjectLayout,
    extensions: Vec<String>,
}

impl<'a> Cleaner<'a> {
    /// Cleaner for the module and every known extension.
    pub fn new(layout: &'a ProjectLayout) -> Self {
        let extensions = layout
            .extension_targets(&[])
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        Cleaner { layout, extensions }
    }

    pub fn clean(&self) -> CleanReport {
        tracing::info!("Cleaning build artifacts...");
        let mut report = CleanReport::default();

        let module_build = self.layout.module_build_dir();
        match remove_dir_all_if_exists(&module_build) {
            Ok(true) => {
                tracing::info!("Removed {}", module_build.display());
                report.removed.push(module_build);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("{:#}", e);
                report.failed.push((module_build, format!("{:#}", e)));
            }
        }

        for name in &self.extensions {
            self.remove_binaries(&self.layout.extension_build_dir(name), &mut report);
        }

        // Binaries left next to the sources by builds that shared one directory
        self.remove_binaries(self.layout.extension_dir(), &mut report);

        report
    }

    /// Delete the extension binaries directly inside `dir`.
    fn remove_binaries(&self, dir: &Path, report: &mut CleanReport) {
        let files = match glob_files(dir, self.layout.extension_pattern()) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("{:#}", e);
                report.failed.push((dir.to_path_buf(), format!("{:#}", e)));
                return;
            }
        };

        for file in files {
            match std::fs::remove_file(&file) {
                Ok(()) => {
                    tracing::info!("Removed {}", file.display());
                    report.removed.push(file);
                }
                Err(e) => {
                    tracing::warn!("failed to remove {}: {}", file.display(), e);
                    report.failed.push((file, e.to_string()));
                }
            }
        }
    }
}
