//! Build package descriptors by copying the shape of an existing tree.
//!
//! A mimic records directories and files but no content: every file entry is
//! template-less, so materializing the package recreates the layout with empty
//! files. Sources are local directories or GitHub/GitLab repositories.

mod local;
pub mod remote;

pub use local::mimic_directory;
pub use remote::{RemoteClient, RemoteRepository, RemoteTokens, TreeEntry};

use regex::Regex;
use tracing::instrument;

use kiln_core::{
    domain::{DirEntry, DirTree, MAX_LABEL_LEN, Package, RelativePath, validate_label},
    error::{KilnError, KilnResult},
};

/// Skips the git metadata directory and everything below it.
pub const DEFAULT_EXCLUDE: &str = r"^\.git(/|$)";

#[derive(Debug, Clone)]
pub struct MimicOptions {
    /// Matched against forward-slash relative paths.
    pub exclude: Regex,
    /// Overrides the label derived from the source name.
    pub label: Option<String>,
}

impl MimicOptions {
    pub fn new(exclude: &str) -> KilnResult<Self> {
        let exclude = Regex::new(exclude).map_err(|e| KilnError::Configuration {
            message: format!("invalid exclude pattern '{exclude}': {e}"),
        })?;
        Ok(Self {
            exclude,
            label: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl Default for MimicOptions {
    fn default() -> Self {
        Self {
            exclude: Regex::new(DEFAULT_EXCLUDE).expect("default exclude pattern compiles"),
            label: None,
        }
    }
}

/// True when `source` should be fetched rather than walked.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("https://")
        || source.starts_with("http://")
        || source.starts_with("gh:")
        || source.starts_with("gl:")
}

/// Mimic a local path or a repository URL.
#[instrument(skip(options, client))]
pub fn mimic(source: &str, options: &MimicOptions, client: &RemoteClient) -> KilnResult<Package> {
    if is_remote(source) {
        let repo = client.resolve(source)?;
        remote::mimic_repository(repo.as_ref(), options)
    } else {
        mimic_directory(std::path::Path::new(source), options)
    }
}

/// Turn an arbitrary directory or repository name into a valid label.
pub fn derive_label(name: &str) -> String {
    let label: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .take(MAX_LABEL_LEN)
        .collect();
    let label = label.trim_matches('-').to_string();
    if label.is_empty() {
        "package".to_string()
    } else {
        label
    }
}

/// Assemble the package from sorted `(path, is_dir)` pairs.
pub(crate) fn build_package(
    source_name: &str,
    upstream_url: Option<String>,
    entries: impl IntoIterator<Item = (String, bool)>,
    options: &MimicOptions,
) -> KilnResult<Package> {
    let label = options
        .label
        .clone()
        .unwrap_or_else(|| derive_label(source_name));
    validate_label(&label)?;

    let mut tree = DirTree::new();
    for (path, is_dir) in entries {
        if options.exclude.is_match(&path) {
            continue;
        }
        let path = RelativePath::try_new(&path)?;
        tree.push(if is_dir {
            DirEntry::dir(path)
        } else {
            DirEntry::file(path)
        });
    }

    let mut builder = Package::builder()
        .label(label)
        .name(source_name)
        .dir_tree(tree);
    if let Some(url) = upstream_url {
        builder = builder.upstream_url(url);
    }
    Ok(builder.build()?)
}
