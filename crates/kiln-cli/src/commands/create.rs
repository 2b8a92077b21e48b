//! `kiln create`: materialize projects from a package.

use serde::Serialize;
use tracing::{debug, instrument};

use kiln_core::prelude::*;

use crate::{
    cli::CreateArgs,
    context::AppContext,
    error::{CliError, CliResult, ErrorCategory},
    output::OutputManager,
};

#[derive(Serialize)]
struct ResultRow<'a> {
    name: &'a str,
    outcome: &'static str,
    id: Option<i64>,
    path: Option<String>,
    error: Option<String>,
    post_hook_error: Option<String>,
}

#[instrument(skip_all, fields(label = %args.label, count = args.names.len()))]
pub fn execute(args: CreateArgs, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let destination = super::absolute_path(args.dir.as_deref())?;
    debug!(destination = %destination.display(), "Destination resolved");

    if args.refresh {
        ctx.packages.load(true, &args.label)?;
    }

    let report = if args.replace {
        ctx.projects
            .create_projects(&args.label, &args.names, &destination, &ReplacePolicy::Replace)?
    } else if args.no_replace || !super::can_prompt() {
        ctx.projects
            .create_projects(&args.label, &args.names, &destination, &ReplacePolicy::Abort)?
    } else {
        let ask = |existing: &Project| ask_replace(existing);
        ctx.projects
            .create_projects(&args.label, &args.names, &destination, &ask)?
    };

    if output.is_json() {
        let rows: Vec<_> = report.results.iter().map(row).collect();
        output.json(&rows)?;
    } else {
        print_report(&report, output)?;
    }

    let failed: Vec<_> = report.failed().collect();
    match failed.first() {
        None => Ok(()),
        Some(first) => Err(CliError::BatchFailed {
            failed: failed.len(),
            total: report.results.len(),
            category: first
                .error
                .as_ref()
                .map(|e| ErrorCategory::from(e.category()))
                .unwrap_or(ErrorCategory::Internal),
        }),
    }
}

/// Prompt failures count as "no".
fn ask_replace(existing: &Project) -> ReplacePolicy {
    let prompt = format!(
        "Project '{}' is already registered at {}. Replace it?",
        existing.name,
        existing.path.display()
    );
    match super::confirm(&prompt) {
        Ok(true) => ReplacePolicy::Replace,
        Ok(false) => ReplacePolicy::Abort,
        Err(e) => {
            debug!(error = %e, "Prompt failed");
            ReplacePolicy::Abort
        }
    }
}

fn print_report(report: &BatchReport, output: &OutputManager) -> CliResult<()> {
    for result in &report.results {
        match (&result.outcome, &result.project) {
            (MaterializeOutcome::Created | MaterializeOutcome::Replaced, Some(project)) => {
                let counts = result
                    .tree
                    .map(|t| {
                        format!(
                            " ({} written, {} unchanged)",
                            t.created + t.updated,
                            t.unchanged
                        )
                    })
                    .unwrap_or_default();
                output.success(&format!(
                    "{} {} at {}{}",
                    result.outcome,
                    result.name,
                    project.path.display(),
                    counts
                ))?;
            }
            (MaterializeOutcome::Aborted, _) => {
                output.warning(&format!(
                    "{}: already registered, skipped (pass --replace to re-create)",
                    result.name
                ))?;
            }
            (outcome, _) => {
                let reason = result
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| outcome.to_string());
                output.error(&format!("{}: {}", result.name, reason))?;
            }
        }

        if let Some(e) = &result.post_hook_error {
            output.warning(&format!("{}: post plugin failed: {}", result.name, e))?;
        }
    }
    Ok(())
}

fn row(result: &ProjectReport) -> ResultRow<'_> {
    ResultRow {
        name: &result.name,
        outcome: match result.outcome {
            MaterializeOutcome::Created => "created",
            MaterializeOutcome::Replaced => "replaced",
            MaterializeOutcome::Aborted => "aborted",
            MaterializeOutcome::Failed(_) => "failed",
        },
        id: result.project.as_ref().and_then(|p| p.id).map(|id| id.0),
        path: result
            .project
            .as_ref()
            .map(|p| p.path.display().to_string()),
        error: result.error.as_ref().map(ToString::to_string),
        post_hook_error: result.post_hook_error.as_ref().map(ToString::to_string),
    }
}
