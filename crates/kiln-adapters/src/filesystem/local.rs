//! Local filesystem adapter using std::fs.

use std::io;
use std::path::Path;

use kiln_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{KilnError, KilnResult},
};

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> KilnResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn exists(&self, path: &Path) -> bool {
        // Dangling symlinks still occupy the path.
        path.symlink_metadata().is_ok()
    }

    fn read(&self, path: &Path) -> KilnResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn write(&self, path: &Path, content: &[u8]) -> KilnResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }
}

pub(crate) fn map_io_error(path: &Path, e: io::Error, operation: &str) -> KilnError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {}: {}", operation, e),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFilesystem::new();
        let nested = dir.path().join("a/b");

        fs.create_dir_all(&nested).unwrap();
        fs.write(&nested.join("f.txt"), b"hello").unwrap();

        assert!(fs.is_dir(&nested));
        assert!(fs.is_file(&nested.join("f.txt")));
        assert_eq!(fs.read(&nested.join("f.txt")).unwrap(), b"hello");
    }

    #[test]
    fn write_without_parent_fails() {
        let dir = TempDir::new().unwrap();
        let err = LocalFilesystem
            .write(&dir.path().join("missing/f.txt"), b"x")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to write file"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_exists() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();

        assert!(LocalFilesystem.exists(&link));
        assert!(!LocalFilesystem.is_file(&link));
    }
}
