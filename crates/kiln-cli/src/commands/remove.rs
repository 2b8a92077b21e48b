//! `kiln rm`: forget registered projects. Files on disk are kept.

use tracing::instrument;

use kiln_core::prelude::*;

use crate::{
    cli::RmArgs,
    context::AppContext,
    error::{CliError, CliResult},
    output::OutputManager,
};

#[instrument(skip_all, fields(all = args.all, count = args.ids.len()))]
pub fn execute(args: RmArgs, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let selection = if args.all {
        RemoveSelection::All
    } else {
        RemoveSelection::Ids(parse_ids(&args.ids)?)
    };

    if !args.force {
        let prompt = match &selection {
            RemoveSelection::All => "Remove every registered project?".to_string(),
            RemoveSelection::Ids(ids) => format!("Remove {} project(s) from the registry?", ids.len()),
        };
        if !super::confirm(&prompt)? {
            return Err(CliError::Cancelled);
        }
    }

    let removed = ctx.projects.remove_projects(selection)?;
    if removed.is_empty() {
        output.info("Nothing to remove")?;
    }
    for project in &removed {
        output.success(&format!(
            "Removed {} ({})",
            project.name,
            project.path.display()
        ))?;
    }
    Ok(())
}

fn parse_ids(raw: &[String]) -> CliResult<Vec<ProjectId>> {
    raw.iter()
        .map(|id| {
            id.parse::<ProjectId>().map_err(|e| CliError::InvalidInput {
                message: format!("'{id}' is not a project id"),
                source: Some(Box::new(e)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_in_order() {
        let ids = parse_ids(&["3".into(), " 10 ".into()]).unwrap();
        assert_eq!(ids, vec![ProjectId(3), ProjectId(10)]);
    }

    #[test]
    fn non_numeric_id_is_a_user_error() {
        let err = parse_ids(&["api".into()]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("'api'"));
    }
}
