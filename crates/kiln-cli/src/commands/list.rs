//! `kiln ls`: show registered projects.

use serde::Serialize;

use kiln_core::domain::Project;

use crate::{context::AppContext, error::CliResult, output::OutputManager};

#[derive(Serialize)]
struct ProjectRow<'a> {
    id: Option<i64>,
    name: &'a str,
    package: &'a str,
    status: &'static str,
    path: String,
}

impl<'a> From<&'a Project> for ProjectRow<'a> {
    fn from(project: &'a Project) -> Self {
        Self {
            id: project.id.map(|id| id.0),
            name: &project.name,
            package: &project.package_label,
            status: project.status.as_str(),
            path: project.path.display().to_string(),
        }
    }
}

pub fn execute(ctx: &AppContext, output: &OutputManager) -> CliResult<()> {
    let projects = ctx.projects.list_projects()?;

    if output.is_json() {
        let rows: Vec<ProjectRow<'_>> = projects.iter().map(ProjectRow::from).collect();
        return output.json(&rows);
    }

    if projects.is_empty() {
        output.info("No projects registered. Create one with: kiln create <LABEL> <NAME>")?;
        return Ok(());
    }

    for line in render_table(&projects) {
        match line {
            Line::Header(text) => output.header(&text)?,
            Line::Row(text) => output.line(&text)?,
        }
    }
    Ok(())
}

enum Line {
    Header(String),
    Row(String),
}

fn render_table(projects: &[Project]) -> Vec<Line> {
    let rows: Vec<ProjectRow<'_>> = projects.iter().map(ProjectRow::from).collect();
    let id_width = rows
        .iter()
        .map(|r| r.id.map_or(1, |id| id.to_string().len()))
        .max()
        .unwrap_or(0)
        .max(2);
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    let package_width = rows.iter().map(|r| r.package.len()).max().unwrap_or(0).max(7);

    let mut lines = vec![Line::Header(format!(
        "{:<id_width$}  {:<name_width$}  {:<package_width$}  {:<8}  PATH",
        "ID", "NAME", "PACKAGE", "STATUS"
    ))];
    lines.extend(rows.iter().map(|r| {
        let id = r.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        Line::Row(format!(
            "{:<id_width$}  {:<name_width$}  {:<package_width$}  {:<8}  {}",
            id, r.name, r.package, r.status, r.path
        ))
    }));
    lines
}
