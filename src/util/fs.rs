//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};

/// Remove a directory and all its contents, if it exists.
///
/// Returns whether anything was removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path)
        .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    Ok(true)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Delete `path` if present and create it again, empty.
pub fn recreate_dir(path: &Path) -> Result<()> {
    remove_dir_all_if_exists(path)?;
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Copy a file to `dst`, creating parent directories if needed.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Files directly inside `dir` whose name matches `pattern`, sorted.
///
/// A missing directory yields an empty list. Subdirectories are not searched.
pub fn glob_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    // Escape the directory part so brackets in user paths are not treated as classes.
    let escaped_dir = Pattern::escape(&dir.to_string_lossy());
    let full_pattern = format!("{}/{}", escaped_dir.trim_end_matches('/'), pattern);

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut results = Vec::new();
    for entry in glob_with(&full_pattern, options)
        .with_context(|| format!("invalid glob pattern: {}", pattern))?
    {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    results.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
