//! `kiln add`: register a directory that already exists.

use tracing::instrument;

use crate::{cli::AddArgs, context::AppContext, error::CliResult, output::OutputManager};

#[instrument(skip_all, fields(label = %args.label))]
pub fn execute(args: AddArgs, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let path = super::absolute_path(Some(&args.path))?;
    let project = ctx.projects.add_project(&args.label, &path)?;

    let id = project
        .id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    output.success(&format!(
        "Added {} as #{} ({})",
        project.name,
        id,
        project.path.display()
    ))?;
    Ok(())
}
