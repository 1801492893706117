//! `fpbuild clean` command

use std::path::Path;

use anyhow::Result;

use crate::cli::CleanArgs;
use fpbuild::ops::clean;
use fpbuild::util::GlobalContext;

pub fn execute(_args: CleanArgs, root: Option<&Path>) -> Result<()> {
    // A root that does not exist has nothing in it to remove.
    let ctx = match GlobalContext::new(root) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::info!("Nothing to clean: {:#}", e);
            return Ok(());
        }
    };

    clean(&ctx);
    Ok(())
}
