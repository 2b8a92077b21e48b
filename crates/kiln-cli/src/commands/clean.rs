//! `kiln clean`: drop records whose directories were deleted.

use crate::{context::AppContext, error::CliResult, output::OutputManager};

pub fn execute(ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let removed = ctx.projects.clean_projects()?;
    if removed.is_empty() {
        output.info("Registry is clean")?;
        return Ok(());
    }
    for project in &removed {
        output.success(&format!(
            "Forgot {} (missing {})",
            project.name,
            project.path.display()
        ))?;
    }
    Ok(())
}
