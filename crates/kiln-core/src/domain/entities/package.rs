//! Package aggregate: the reusable descriptor a project is materialized from.
//!
//! ```text
//! Package (Aggregate Root)
//! ├── label / name / upstream_url / description
//! ├── DirTree
//! │    └── Vec<DirEntry>            applied strictly in order
//! │         └── Option<TemplateRef> file content source
//! └── PluginSchedule
//!      ├── pre:  Vec<Plugin>        before the tree is built
//!      └── post: Vec<Plugin>        after the tree is built
//! ```
//!
//! A `Package` is immutable once built. Every path inside it has already been
//! checked to stay within the project root, so the tree builder never has to
//! re-validate before writing.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{entities::common::RelativePath, error::DomainError};

/// Longest accepted package label, in bytes.
pub const MAX_LABEL_LEN: usize = 32;

// ============================================================================
// Package
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub label: String,
    pub name: String,
    pub upstream_url: Option<String>,
    pub description: Option<String>,
    pub dir_tree: DirTree,
    pub plugins: PluginSchedule,
}

impl Package {
    pub fn builder() -> PackageBuilder {
        PackageBuilder::default()
    }

    /// Validate the package invariants.
    ///
    /// `PackageBuilder::build` already calls this; adapters that construct a
    /// `Package` field by field must call it themselves.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_label(&self.label)?;

        if self.name.trim().is_empty() {
            return Err(DomainError::MissingRequiredField { field: "name" });
        }

        self.dir_tree.validate()
    }

    /// Shorthand used in logs and listings.
    pub fn summary(&self) -> PackageSummary {
        PackageSummary {
            label: self.label.clone(),
            name: self.name.clone(),
            entries: self.dir_tree.len(),
            pre_plugins: self.plugins.pre.len(),
            post_plugins: self.plugins.post.len(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.label)
    }
}

/// Flat view of a package for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub label: String,
    pub name: String,
    pub entries: usize,
    pub pre_plugins: usize,
    pub post_plugins: usize,
}

/// Labels are typed on the command line for every `create`, so they stay
/// short and shell-safe.
pub fn validate_label(label: &str) -> Result<(), DomainError> {
    let invalid = |reason: &str| DomainError::InvalidLabel {
        label: label.to_string(),
        reason: reason.to_string(),
    };

    if label.is_empty() {
        return Err(invalid("label cannot be empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(invalid("label is longer than 32 characters"));
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid("only ASCII letters, digits, '-' and '_' are allowed"));
    }
    Ok(())
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Default)]
pub struct PackageBuilder {
    label: Option<String>,
    name: Option<String>,
    upstream_url: Option<String>,
    description: Option<String>,
    dir_tree: DirTree,
    plugins: PluginSchedule,
}

impl PackageBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = Some(url.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn dir_tree(mut self, tree: DirTree) -> Self {
        self.dir_tree = tree;
        self
    }

    pub fn entry(mut self, entry: DirEntry) -> Self {
        self.dir_tree.push(entry);
        self
    }

    pub fn pre_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.pre.push(plugin);
        self
    }

    pub fn post_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.post.push(plugin);
        self
    }

    pub fn plugins(mut self, plugins: PluginSchedule) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn build(self) -> Result<Package, DomainError> {
        let package = Package {
            label: self
                .label
                .ok_or(DomainError::MissingRequiredField { field: "label" })?,
            name: self
                .name
                .ok_or(DomainError::MissingRequiredField { field: "name" })?,
            upstream_url: self.upstream_url,
            description: self.description,
            dir_tree: self.dir_tree,
            plugins: self.plugins,
        };

        package.validate()?;
        Ok(package)
    }
}

// ============================================================================
// Directory Tree
// ============================================================================

/// Ordered list of entries. Order is creation order; nothing reorders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirTree {
    pub entries: Vec<DirEntry>,
}

impl DirTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DirEntry) {
        self.entries.push(entry);
    }

    pub fn with_entry(mut self, entry: DirEntry) -> Self {
        self.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.path.clone()) {
                return Err(DomainError::DuplicatePath {
                    path: entry.path.to_string(),
                });
            }
            if entry.is_dir && entry.template.is_some() {
                return Err(DomainError::InvalidPackage(format!(
                    "directory entry '{}' cannot carry a template",
                    entry.path
                )));
            }
        }
        Ok(())
    }
}

/// One node of the target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: RelativePath,
    pub is_dir: bool,
    pub template: Option<TemplateRef>,
}

impl DirEntry {
    pub fn dir(path: RelativePath) -> Self {
        Self {
            path,
            is_dir: true,
            template: None,
        }
    }

    /// A file that is created empty when missing.
    pub fn file(path: RelativePath) -> Self {
        Self {
            path,
            is_dir: false,
            template: None,
        }
    }

    pub fn templated(path: RelativePath, template: TemplateRef) -> Self {
        Self {
            path,
            is_dir: false,
            template: Some(template),
        }
    }

    /// Convenience for descriptors assembled in code.
    pub fn parse_dir(path: &str) -> Result<Self, DomainError> {
        Ok(Self::dir(RelativePath::try_new(path)?))
    }

    pub fn parse_file(path: &str) -> Result<Self, DomainError> {
        Ok(Self::file(RelativePath::try_new(path)?))
    }
}

/// Where a file entry's content comes from.
///
/// `path` is relative to the templates directory. With `render` unset the
/// source bytes are copied as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub path: RelativePath,
    pub render: bool,
}

impl TemplateRef {
    pub fn rendered(path: RelativePath) -> Self {
        Self { path, render: true }
    }

    pub fn verbatim(path: RelativePath) -> Self {
        Self {
            path,
            render: false,
        }
    }
}

// ============================================================================
// Plugins
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external lifecycle script. Opaque beyond its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub path: PathBuf,
}

impl Plugin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Relative plugin paths live under the configured plugins directory.
    pub fn resolve(&self, plugin_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            plugin_root.join(&self.path)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSchedule {
    pub pre: Vec<Plugin>,
    pub post: Vec<Plugin>,
}

impl PluginSchedule {
    pub fn phase(&self, phase: Phase) -> &[Plugin] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}
