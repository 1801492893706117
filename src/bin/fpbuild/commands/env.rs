//! `fpbuild env` command
//!
//! Prints what a build would be parameterized by, without building.

use std::path::Path;

use anyhow::Result;

use crate::cli::EnvArgs;
use fpbuild::builder::{EnvInputs, EnvironmentResolver, Pybind11Probe};
use fpbuild::core::ProjectLayout;
use fpbuild::util::{GlobalContext, SystemRunner};

pub fn execute(args: EnvArgs, root: Option<&Path>) -> Result<()> {
    let ctx = GlobalContext::new(root)?;
    let programs = ctx.programs();

    let runner = SystemRunner;
    let probe = Pybind11Probe::new(&programs.python, &runner);
    let env = EnvironmentResolver::new(
        EnvInputs {
            prefix: args.prefix,
            jobs: args.jobs.or(ctx.config().build.jobs),
        },
        &probe,
    )
    .resolve();

    let layout = ProjectLayout::from_config(ctx.project_root(), &ctx.config().project);

    println!("project root:    {}", layout.root().display());
    println!("cmake:           {}", programs.cmake.display());
    println!("make:            {}", programs.make.display());
    println!("python:          {}", programs.python.display());
    match env.toolchain_support_dir() {
        Some(dir) => println!("pybind11 dir:    {}", dir.display()),
        None => println!("pybind11 dir:    (not found)"),
    }
    match env.prefix() {
        Some(prefix) => println!("prefix:          {}", prefix.display()),
        None => println!("prefix:          (none)"),
    }
    println!("parallelism:     {}", env.build_parallelism);
    println!("include paths:");
    for path in &env.extra_include_paths {
        println!("  {}", path.display());
    }

    println!("targets:");
    for target in layout.targets(&env.extra_include_paths).iter() {
        println!("  {} -> {}", target, target.build_dir().display());
    }

    Ok(())
}
