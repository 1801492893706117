//! Test fixtures for common test scenarios.

use std::fs;
use std::path::Path;

use crate::core::layout::{DEFAULT_EXTENSION_DIR, DEFAULT_MODULE_DIR, EXTENSIONS};

/// Minimal CMakeLists.txt for the native module.
pub fn module_cmakelists() -> &'static str {
    r#"cmake_minimum_required(VERSION 3.15)
project(mycpp LANGUAGES CXX)

find_package(pybind11 REQUIRED)
pybind11_add_module(mycpp src/app/pybind_api.cpp)
"#
}

/// Create a temporary checkout with the module and extension sources in place.
///
/// Returns the TempDir handle - dropping it will clean up the directory.
pub fn create_test_project() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().expect("failed to create temp dir");
    write_project(tmp.path()).expect("failed to write test project");
    tmp
}

fn write_project(root: &Path) -> std::io::Result<()> {
    let module_dir = root.join(DEFAULT_MODULE_DIR);
    fs::create_dir_all(module_dir.join("src/app"))?;
    fs::write(module_dir.join("CMakeLists.txt"), module_cmakelists())?;
    fs::write(
        module_dir.join("src/app/pybind_api.cpp"),
        "#include <pybind11/pybind11.h>\n",
    )?;

    let extension_dir = root.join(DEFAULT_EXTENSION_DIR);
    for extension in EXTENSIONS {
        for source in extension.sources {
            let path = extension_dir.join(source);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, "// source\n")?;
        }
    }

    Ok(())
}
