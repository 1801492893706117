//! Packaging front-ends.
//!
//! A front-end takes the manifest of a finished build and hands it to a
//! packaging system: either as force-include data for a build hook, or by
//! copying the binaries into a setup-style build tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::PackagingManifest;
use crate::util::fs::{copy_file, write_string};

/// Publishes a packaging manifest.
pub trait Frontend {
    fn name(&self) -> &'static str;

    fn publish(&self, manifest: &PackagingManifest) -> Result<()>;
}

#[derive(Serialize)]
struct HookBuildData<'a> {
    force_include: &'a PackagingManifest,
}

/// Emits `{"force_include": {source: destination}}` for a wheel build hook.
#[derive(Debug, Clone, Default)]
pub struct HookFrontend {
    output: Option<PathBuf>,
}

impl HookFrontend {
    /// Write to `output`, or stdout when `None`.
    pub fn new(output: Option<PathBuf>) -> Self {
        HookFrontend { output }
    }

    pub fn render(manifest: &PackagingManifest) -> Result<String> {
        let data = HookBuildData {
            force_include: manifest,
        };
        serde_json::to_string_pretty(&data).context("failed to serialize build data")
    }
}

impl Frontend for HookFrontend {
    fn name(&self) -> &'static str {
        "hook"
    }

    fn publish(&self, manifest: &PackagingManifest) -> Result<()> {
        for (source, destination) in manifest {
            tracing::info!("Will include {} as {}", source.display(), destination);
        }

        let rendered = Self::render(manifest)?;
        match self.output {
            Some(ref path) => {
                write_string(path, &(rendered + "\n"))?;
                tracing::info!("Wrote build data to {}", path.display());
            }
            None => println!("{}", rendered),
        }
        Ok(())
    }
}

/// Copies each artifact to `<build_lib>/<destination>`.
#[derive(Debug, Clone)]
pub struct SetupFrontend {
    build_lib: PathBuf,
    package: String,
}

impl SetupFrontend {
    pub fn new(build_lib: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        SetupFrontend {
            build_lib: build_lib.into(),
            package: package.into(),
        }
    }

    pub fn build_lib(&self) -> &Path {
        &self.build_lib
    }
}

impl Frontend for SetupFrontend {
    fn name(&self) -> &'static str {
        "setup"
    }

    fn publish(&self, manifest: &PackagingManifest) -> Result<()> {
        let package_root = format!("{}/", self.package);
        let has_module = manifest
            .destinations()
            .any(|d| d.starts_with(&package_root) && !d[package_root.len()..].contains('/'));
        if !has_module {
            tracing::warn!("Could not find built module library to copy");
        }

        for (source, destination) in manifest {
            let target = self.build_lib.join(destination);
            copy_file(source, &target)?;
            tracing::info!("Copied {} to {}", source.display(), target.display());
        }
        Ok(())
    }
}
