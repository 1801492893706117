//! fpbuild CLI - native extension builds for FoundationPose

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fpbuild::builder::BuildError;
use fpbuild::util::diagnostic::emit;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<BuildError>() {
            Some(build_error) => emit(&build_error.to_diagnostic(), color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("fpbuild=debug")
    } else {
        EnvFilter::new("fpbuild=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    let root = cli.root.as_deref();

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, root),
        Commands::Clean(args) => commands::clean::execute(args, root),
        Commands::Env(args) => commands::env::execute(args, root),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
