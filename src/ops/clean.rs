//! Implementation of `fpbuild clean`.

use crate::builder::{CleanReport, Cleaner};
use crate::core::ProjectLayout;
use crate::util::GlobalContext;

/// Remove build outputs for the project in `ctx`.
///
/// Never fails. Each removal and each problem is logged once, by the cleaner.
pub fn clean(ctx: &GlobalContext) -> CleanReport {
    let layout = ProjectLayout::from_config(ctx.project_root(), &ctx.config().project);
    let report = Cleaner::new(&layout).clean();

    if report.is_empty() {
        tracing::info!("Nothing to clean");
    }

    report
}
