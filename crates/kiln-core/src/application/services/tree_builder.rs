//! Directory tree builder.
//!
//! Applies a package's ordered entries under a project root. Entries run
//! strictly in order and the first failure stops the build; whatever was
//! created before it stays on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::{
    application::{ApplicationError, ports::Filesystem},
    domain::{DirEntry, DirTree, RenderContext, TemplateRef, TemplateRenderer},
    error::{KilnError, KilnResult},
};

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    Created,
    Updated,
    Unchanged,
}

/// Per-build counts. A re-run over an identical tree reports only `unchanged`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl TreeReport {
    fn record(&mut self, change: EntryChange) {
        match change {
            EntryChange::Created => self.created += 1,
            EntryChange::Updated => self.updated += 1,
            EntryChange::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }

    pub fn changed(&self) -> bool {
        self.created + self.updated > 0
    }
}

pub struct TreeBuilder {
    filesystem: Arc<dyn Filesystem>,
    renderer: TemplateRenderer,
}

impl TreeBuilder {
    pub fn new(filesystem: Arc<dyn Filesystem>, renderer: TemplateRenderer) -> Self {
        Self {
            filesystem,
            renderer,
        }
    }

    /// Materialize `tree` under `root`.
    ///
    /// Template sources are read relative to `template_root`. Failures are
    /// wrapped in [`ApplicationError::EntryFailed`] naming the entry and how
    /// many entries completed before it.
    #[instrument(skip_all, fields(root = %root.display(), entries = tree.len()))]
    pub fn build(
        &self,
        tree: &DirTree,
        root: &Path,
        template_root: &Path,
        ctx: &RenderContext,
    ) -> KilnResult<TreeReport> {
        self.ensure_dir(root)?;

        let mut report = TreeReport::default();
        for (index, entry) in tree.iter().enumerate() {
            let change = self
                .apply(entry, root, template_root, ctx)
                .map_err(|source| ApplicationError::EntryFailed {
                    entry: entry.path.to_string(),
                    completed: index,
                    source: Box::new(source),
                })?;

            trace!(entry = %entry.path, ?change, "Entry applied");
            report.record(change);
        }

        debug!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            "Tree built"
        );
        Ok(report)
    }

    fn apply(
        &self,
        entry: &DirEntry,
        root: &Path,
        template_root: &Path,
        ctx: &RenderContext,
    ) -> KilnResult<EntryChange> {
        let target = root.join(entry.path.as_path());

        if entry.is_dir {
            return self.ensure_dir(&target);
        }

        if self.filesystem.is_dir(&target) {
            return Err(conflict(target, "file"));
        }
        if let Some(parent) = target.parent() {
            self.ensure_dir(parent)?;
        }

        let content = match &entry.template {
            Some(template) => self.load_template(template, template_root, ctx)?,
            // Template-less files are only created, never truncated.
            None if self.filesystem.is_file(&target) => return Ok(EntryChange::Unchanged),
            None => Vec::new(),
        };

        if self.filesystem.is_file(&target) {
            if self.filesystem.read(&target)? == content {
                return Ok(EntryChange::Unchanged);
            }
            self.filesystem.write(&target, &content)?;
            return Ok(EntryChange::Updated);
        }

        self.filesystem.write(&target, &content)?;
        Ok(EntryChange::Created)
    }

    fn ensure_dir(&self, path: &Path) -> KilnResult<EntryChange> {
        if self.filesystem.is_dir(path) {
            return Ok(EntryChange::Unchanged);
        }
        if self.filesystem.exists(path) {
            return Err(conflict(path.to_path_buf(), "directory"));
        }
        self.filesystem.create_dir_all(path)?;
        Ok(EntryChange::Created)
    }

    fn load_template(
        &self,
        template: &TemplateRef,
        template_root: &Path,
        ctx: &RenderContext,
    ) -> KilnResult<Vec<u8>> {
        let source = template_root.join(template.path.as_path());
        let render_failed = |reason: String| ApplicationError::RenderFailed {
            path: source.clone(),
            reason,
        };

        let bytes = self
            .filesystem
            .read(&source)
            .map_err(|e| render_failed(e.to_string()))?;

        if !template.render {
            return Ok(bytes);
        }

        let rendered = self
            .renderer
            .render_bytes(&bytes, ctx)
            .map_err(|e| render_failed(e.to_string()))?;
        Ok(rendered.into_bytes())
    }
}

fn conflict(path: PathBuf, expected: &'static str) -> KilnError {
    ApplicationError::Conflict { path, expected }.into()
}
