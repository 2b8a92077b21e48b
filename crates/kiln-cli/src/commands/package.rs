//! `kiln package …`: manage the stored packages.

use std::path::Path;

use tracing::{debug, instrument};

use kiln_adapters::{
    FileFormat,
    mimic::{self, is_remote},
    portability,
};
use kiln_core::{domain::PackageSummary, error::KilnError};

use crate::{
    cli::{ExportArgs, MimicArgs, PackageCommands},
    context::AppContext,
    error::{CliError, CliResult},
    output::OutputManager,
};

pub fn execute(cmd: PackageCommands, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    match cmd {
        PackageCommands::Ls => list(ctx, output),
        PackageCommands::Show { label } => show(&label, ctx, output),
        PackageCommands::Import { files } => import(&files, ctx, output),
        PackageCommands::Export(args) => export(args, ctx, output),
        PackageCommands::Rm { labels } => {
            for label in &labels {
                ctx.remove_package(label)?;
                output.success(&format!("Removed package {label}"))?;
            }
            Ok(())
        }
        PackageCommands::Mimic(args) => mimic_sources(args, ctx, output),
    }
}

fn list(ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let summaries = ctx.packages.list()?;
    if output.is_json() {
        return output.json(&summaries);
    }
    if summaries.is_empty() {
        output.info("No packages stored. Add one with: kiln package import <FILE>")?;
        return Ok(());
    }

    let width = summaries
        .iter()
        .map(|s| s.label.len())
        .max()
        .unwrap_or(0)
        .max(5);
    output.header(&format!("{:<width$}  {:>7}  {:>7}  NAME", "LABEL", "ENTRIES", "PLUGINS"))?;
    for summary in &summaries {
        output.line(&summary_line(summary, width))?;
    }
    Ok(())
}

fn summary_line(summary: &PackageSummary, width: usize) -> String {
    format!(
        "{:<width$}  {:>7}  {:>7}  {}",
        summary.label,
        summary.entries,
        format!("{}/{}", summary.pre_plugins, summary.post_plugins),
        summary.name
    )
}

/// JSON with `--output-format json`, TOML otherwise.
fn show(label: &str, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let package = ctx.packages.get(label)?;
    let format = if output.is_json() {
        FileFormat::Json
    } else {
        FileFormat::Toml
    };
    let text = portability::to_string(&package, format)
        .map_err(|message| CliError::Core(KilnError::Internal { message }))?;
    output.line(text.trim_end())?;
    Ok(())
}

#[instrument(skip_all, fields(count = files.len()))]
fn import(files: &[String], ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let client = if files.iter().any(|f| is_remote(f)) {
        Some(ctx.remote_client()?)
    } else {
        None
    };

    for file in files {
        let package = match &client {
            Some(client) if is_remote(file) => client.fetch_package(file)?,
            _ => portability::import(Path::new(file))?,
        };
        let replaced = ctx.packages.add(&package)?;
        debug!(label = %package.label, replaced, "Package imported");
        output.success(&format!(
            "{} package {} from {}",
            if replaced { "Replaced" } else { "Imported" },
            package.label,
            file
        ))?;
    }
    Ok(())
}

fn export(args: ExportArgs, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let package = ctx.packages.get(&args.label)?;
    let dir = super::absolute_path(args.dir.as_deref())?;
    let path = portability::export(&package, args.format.into(), &dir)?;
    output.success(&format!("Exported {} to {}", package.label, path.display()))?;
    Ok(())
}

#[instrument(skip_all, fields(count = args.sources.len()))]
fn mimic_sources(args: MimicArgs, ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    if args.label.is_some() && args.sources.len() > 1 {
        return Err(CliError::InvalidInput {
            message: "--label can only be used with a single source".into(),
            source: None,
        });
    }

    let mut options = ctx.config().mimic_options(args.exclude.as_deref())?;
    if let Some(label) = args.label {
        options = options.with_label(label);
    }
    let client = ctx.remote_client()?;

    for source in &args.sources {
        let package = mimic::mimic(source, &options, &client)?;
        let replaced = ctx.packages.add(&package)?;
        output.success(&format!(
            "{} package {} with {} entries from {}",
            if replaced { "Replaced" } else { "Stored" },
            package.label,
            package.dir_tree.len(),
            source
        ))?;
    }
    Ok(())
}
