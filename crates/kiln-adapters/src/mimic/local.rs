use std::path::Path;

use tracing::{debug, instrument};
use walkdir::WalkDir;

use kiln_core::{
    application::ApplicationError,
    domain::Package,
    error::{KilnError, KilnResult},
};

use super::{MimicOptions, build_package};

fn walk_error(dir: &Path, reason: impl std::fmt::Display) -> KilnError {
    ApplicationError::FilesystemError {
        path: dir.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

/// Mimic a local directory. Entries come out sorted, parents before children.
#[instrument(skip(options), fields(dir = %dir.display()))]
pub fn mimic_directory(dir: &Path, options: &MimicOptions) -> KilnResult<Package> {
    if !dir.is_dir() {
        return Err(walk_error(dir, "not a directory"));
    }
    let dir = dir.canonicalize().map_err(|e| walk_error(dir, e))?;

    let mut entries = Vec::new();
    for walk_entry in WalkDir::new(&dir).min_depth(1).sort_by_file_name() {
        let walk_entry = walk_entry.map_err(|e| walk_error(&dir, e))?;
        let relative = walk_entry
            .path()
            .strip_prefix(&dir)
            .map_err(|e| walk_error(walk_entry.path(), e))?;
        let path = relative.to_string_lossy().replace('\\', "/");
        entries.push((path, walk_entry.file_type().is_dir()));
    }
    debug!(count = entries.len(), "Directory walked");

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    build_package(&name, None, entries, options)
}
