//! `fpbuild build` command

use std::path::Path;

use anyhow::Result;

use crate::cli::BuildArgs;
use fpbuild::core::ProjectLayout;
use fpbuild::ops::build::{build, BuildOptions};
use fpbuild::ops::frontend::{Frontend, HookFrontend, SetupFrontend};
use fpbuild::util::diagnostic::emit;
use fpbuild::util::{Diagnostic, GlobalContext};

pub fn execute(args: BuildArgs, root: Option<&Path>) -> Result<()> {
    let ctx = GlobalContext::new(root)?;
    let config = &ctx.config().build;

    // CLI > config > default
    let opts = BuildOptions {
        prefix: args.prefix,
        jobs: args.jobs.or(config.jobs),
        strict_artifacts: args.strict || config.strict_artifacts,
        verbose_extensions: !args.quiet_extensions && config.verbose_extensions.unwrap_or(true),
    };

    let report = build(&ctx, &opts)?;

    for warning in &report.warnings {
        emit(&Diagnostic::from(warning.clone()), false);
    }

    let frontend: Box<dyn Frontend> = match args.build_lib {
        Some(build_lib) => {
            let layout = ProjectLayout::from_config(ctx.project_root(), &ctx.config().project);
            Box::new(SetupFrontend::new(build_lib, layout.package()))
        }
        None => Box::new(HookFrontend::new(args.manifest)),
    };
    tracing::debug!("Publishing through the {} front-end", frontend.name());
    frontend.publish(&report.manifest)?;

    eprintln!(
        "    Finished {} artifact(s) with {} warning(s)",
        report.manifest.len(),
        report.warnings.len()
    );

    Ok(())
}
