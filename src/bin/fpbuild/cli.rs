//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// fpbuild - builds the FoundationPose native module and GPU extensions
#[derive(Parser)]
#[command(name = "fpbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the native module and the GPU extensions
    Build(BuildArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Show the resolved build environment
    Env(EnvArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Environment prefix searched for headers and CMake packages
    #[arg(long, env = "CONDA_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Fail when the module library cannot be found after a build
    #[arg(long)]
    pub strict: bool,

    /// Do not ask the extension toolchain for verbose output
    #[arg(long)]
    pub quiet_extensions: bool,

    /// Write force-include build data as JSON to this file
    #[arg(long, conflicts_with = "build_lib")]
    pub manifest: Option<PathBuf>,

    /// Copy built binaries into this directory, setup-style
    #[arg(long)]
    pub build_lib: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Args)]
pub struct EnvArgs {
    /// Environment prefix searched for headers and CMake packages
    #[arg(long, env = "CONDA_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
