//! Application layer errors.
//!
//! These errors represent failures in orchestration, not descriptor validity.
//! Descriptor errors are `DomainError` from `crate::domain`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::Phase;
use crate::error::{ErrorCategory, KilnError};

/// How a lifecycle script ended when it did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitInfo {
    /// Exited on its own with this status.
    Code(i32),
    /// Killed by a signal (unix) before exiting.
    Signal,
    /// Ran past its deadline and was killed.
    TimedOut { after: Duration },
    /// Could not be started at all.
    SpawnFailed(String),
}

impl ExitInfo {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit status {code}"),
            Self::Signal => f.write_str("terminated by signal"),
            Self::TimedOut { after } => write!(f, "timed out after {after:?}"),
            Self::SpawnFailed(reason) => write!(f, "could not start: {reason}"),
        }
    }
}

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// A project is already registered at this path.
    #[error("Project already exists at {path}")]
    ProjectExists { path: PathBuf },

    /// Something of the wrong kind occupies a path the tree needs.
    #[error("Conflict at {path}: expected a {expected}, found something else")]
    Conflict { path: PathBuf, expected: &'static str },

    /// A lifecycle script did not succeed.
    #[error("{phase}-phase plugin {script} failed: {exit}")]
    PluginFailed {
        phase: Phase,
        script: PathBuf,
        exit: ExitInfo,
    },

    /// A template source could not be read or decoded.
    #[error("Failed to render {path}: {reason}")]
    RenderFailed { path: PathBuf, reason: String },

    /// Tree building stopped at this entry. Earlier entries stay on disk.
    #[error("Failed to create '{entry}' ({completed} entries done before it): {source}")]
    EntryFailed {
        entry: String,
        completed: usize,
        source: Box<KilnError>,
    },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// The project or package registry failed.
    #[error("Registry error: {reason}")]
    Registry { reason: String },

    #[error("Package '{label}' not found")]
    PackageNotFound { label: String },

    #[error("Project '{reference}' not found")]
    ProjectNotFound { reference: String },

    /// Store access failed (lock poisoned, etc.).
    #[error("Store lock error")]
    StoreLockError,

    /// A package file could not be written or read back.
    #[error("Cannot convert package file {path}: {reason}")]
    Portability { path: PathBuf, reason: String },

    /// Fetching a remote repository failed.
    #[error("Remote repository {url}: {reason}")]
    Remote { url: String, reason: String },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProjectExists { path } => vec![
                format!("A project is already registered at {}", path.display()),
                "Pass --replace to re-create it over the existing directory".into(),
                "Or choose a different project name".into(),
            ],
            Self::Conflict { path, expected } => vec![
                format!("{} should be a {}", path.display(), expected),
                "Move the existing entry out of the way and try again".into(),
            ],
            Self::PluginFailed { script, .. } => vec![
                format!("Run {} by hand to see its output", script.display()),
                "Increase verbosity with -vv to log plugin output".into(),
            ],
            Self::RenderFailed { path, .. } => vec![
                format!("Check that {} exists under the templates directory", path.display()),
                "Binary files need render = false in the package".into(),
            ],
            Self::EntryFailed { source, .. } => source.suggestions(),
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::PackageNotFound { .. } => vec![
                "Try: kiln package ls to see installed packages".into(),
                "Import one with: kiln package import <FILE>".into(),
            ],
            Self::ProjectNotFound { .. } => {
                vec!["Try: kiln ls to see registered projects".into()]
            }
            Self::StoreLockError => vec![
                "The store is locked".into(),
                "Try again in a moment".into(),
            ],
            Self::Portability { .. } => vec![
                "Package files must end in .toml or .json".into(),
                "Check the file against an exported package".into(),
            ],
            Self::Remote { .. } => vec![
                "Check the repository URL and your network connection".into(),
                "Private repositories need auth.github_token or auth.gitlab_token".into(),
            ],
            Self::Registry { .. } => vec!["Check paths.database in your configuration".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProjectExists { .. } | Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::PackageNotFound { .. } | Self::ProjectNotFound { .. } => ErrorCategory::NotFound,
            Self::PluginFailed { .. } | Self::Remote { .. } => ErrorCategory::External,
            Self::RenderFailed { .. } | Self::Portability { .. } => ErrorCategory::Validation,
            Self::EntryFailed { source, .. } => source.category(),
            Self::FilesystemError { .. } | Self::Registry { .. } | Self::StoreLockError => {
                ErrorCategory::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_failure_takes_category_of_cause() {
        let err = ApplicationError::EntryFailed {
            entry: "src".into(),
            completed: 2,
            source: Box::new(
                ApplicationError::Conflict {
                    path: "/w/p/src".into(),
                    expected: "directory",
                }
                .into(),
            ),
        };
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(err.to_string().contains("'src'"));
        assert!(err.to_string().contains("2 entries done"));
    }

    #[test]
    fn exit_info_display() {
        assert_eq!(ExitInfo::Code(3).to_string(), "exit status 3");
        assert_eq!(
            ExitInfo::TimedOut {
                after: Duration::from_secs(30)
            }
            .to_string(),
            "timed out after 30s"
        );
        assert_eq!(
            ExitInfo::TimedOut {
                after: Duration::from_millis(500)
            }
            .to_string(),
            "timed out after 500ms"
        );
        assert!(ExitInfo::Code(0).is_success());
        assert!(!ExitInfo::Signal.is_success());
    }
}
