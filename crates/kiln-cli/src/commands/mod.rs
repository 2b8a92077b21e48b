//! One module per subcommand. Handlers translate arguments, call a service
//! and print; no business logic lives here.

use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult, IntoCli};

pub mod add;
pub mod clean;
pub mod completions;
pub mod create;
pub mod init;
pub mod list;
pub mod package;
pub mod remove;

/// Absolute form of `path`, or of the current directory when `None`.
///
/// Existing paths are canonicalized so they match what the registry stored
/// for them earlier.
pub(crate) fn absolute_path(path: Option<&Path>) -> CliResult<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            return std::env::current_dir()
                .with_cli_context(|| "failed to read the current directory");
        }
    };
    match path.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(_) => std::path::absolute(&path)
            .with_cli_context(|| format!("failed to resolve '{}'", path.display())),
    }
}

/// True when a yes/no question can be put to the user.
pub(crate) fn can_prompt() -> bool {
    cfg!(feature = "interactive") && std::io::stdin().is_terminal()
}

/// Ask a yes/no question; the default answer is no.
#[cfg(feature = "interactive")]
pub(crate) fn confirm(prompt: &str) -> CliResult<bool> {
    if !can_prompt() {
        return Err(CliError::InvalidInput {
            message: "cannot ask for confirmation without a terminal; pass --force".into(),
            source: None,
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| CliError::IoError {
            message: "failed to read confirmation".into(),
            source: std::io::Error::other(e),
        })
}

#[cfg(not(feature = "interactive"))]
pub(crate) fn confirm(_prompt: &str) -> CliResult<bool> {
    Err(CliError::FeatureNotAvailable {
        feature: "interactive",
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn existing_paths_are_canonical() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();

        let resolved = absolute_path(Some(&nested.join("../a"))).unwrap();
        assert_eq!(resolved, nested.canonicalize().unwrap());
    }

    #[test]
    fn missing_paths_are_made_absolute() {
        let resolved = absolute_path(Some(Path::new("not/there"))).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("not/there"));
    }

    #[test]
    fn none_is_the_current_directory() {
        assert_eq!(
            absolute_path(None).unwrap(),
            std::env::current_dir().unwrap()
        );
    }
}
