//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `kiln-adapters` crate provides implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::application::error::ExitInfo;
use crate::domain::{Package, Phase, Project, ProjectId, RenderContext};
use crate::error::KilnResult;

/// Version of the data handed to lifecycle scripts.
pub const HOOK_CONTRACT_VERSION: u32 = 1;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `kiln_adapters::filesystem::LocalFilesystem` (production)
/// - `kiln_adapters::filesystem::MemoryFilesystem` (testing)
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> KilnResult<()>;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    /// Check if anything exists at path.
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> KilnResult<Vec<u8>>;

    /// Create or truncate a file. The parent must exist.
    fn write(&self, path: &Path, content: &[u8]) -> KilnResult<()>;
}

/// Port for running one lifecycle script as a separate process.
///
/// Implemented by:
/// - `kiln_adapters::script_runner::ProcessScriptRunner`
///
/// `Ok` means the script was started and reached a terminal state; the
/// scheduler inspects `ScriptOutcome::exit`. `Err` means it never ran.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptRunner: Send + Sync {
    fn run(&self, invocation: &ScriptInvocation) -> KilnResult<ScriptOutcome>;
}

/// Port for the persistent project registry.
///
/// Implemented by:
/// - `kiln_adapters::registry::SqliteRegistry`
/// - `kiln_adapters::registry::InMemoryRegistry`
///
/// The registry owns path uniqueness: `store` fails with
/// `ApplicationError::ProjectExists` when the path is taken.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectRegistry: Send + Sync {
    fn find_by_path(&self, path: &Path) -> KilnResult<Option<Project>>;

    /// Persist a new record and return it with its assigned id.
    fn store(&self, project: &Project) -> KilnResult<Project>;

    /// Delete the record at `path`. Returns whether one existed.
    fn remove_by_path(&self, path: &Path) -> KilnResult<bool>;

    /// Delete by id. `ProjectNotFound` if absent.
    fn remove(&self, id: ProjectId) -> KilnResult<()>;

    /// `ProjectNotFound` if absent.
    fn load(&self, id: ProjectId) -> KilnResult<Project>;

    /// All records ordered by id.
    fn load_all(&self) -> KilnResult<Vec<Project>>;
}

/// Port for package storage.
///
/// Implemented by:
/// - `kiln_adapters::registry::SqliteRegistry`
/// - `kiln_adapters::registry::InMemoryPackageStore`
#[cfg_attr(test, mockall::automock)]
pub trait PackageStore: Send + Sync {
    fn get(&self, label: &str) -> KilnResult<Option<Package>>;

    /// Insert or overwrite by label.
    fn insert(&self, package: &Package) -> KilnResult<()>;

    /// Returns whether a package was removed.
    fn remove(&self, label: &str) -> KilnResult<bool>;

    /// All packages ordered by label.
    fn list(&self) -> KilnResult<Vec<Package>>;
}

/// Port supplying packages to materialization.
///
/// Implemented by:
/// - `kiln_adapters::loader::CachedPackageLoader`
///
/// Returned packages are shared read-only; `refresh` bypasses any cache.
#[cfg_attr(test, mockall::automock)]
pub trait PackageLoader: Send + Sync {
    fn load_package(&self, refresh: bool, label: &str) -> KilnResult<Arc<Package>>;
}

// ============================================================================
// Script contract
// ============================================================================

/// Everything a runner needs to start one script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInvocation {
    pub script: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    /// Serialized to JSON on the script's stdin.
    pub payload: HookPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub exit: ExitInfo,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutcome {
    pub fn success(&self) -> bool {
        self.exit.is_success()
    }
}

/// Data passed to lifecycle scripts, versioned by [`HOOK_CONTRACT_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookPayload {
    pub version: u32,
    pub phase: Phase,
    pub project: HookProject,
    pub package: HookPackage,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookProject {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookPackage {
    pub label: String,
    pub name: String,
}

impl HookPayload {
    pub fn new(
        phase: Phase,
        project_name: &str,
        project_path: &Path,
        package: &Package,
        ctx: &RenderContext,
    ) -> Self {
        Self {
            version: HOOK_CONTRACT_VERSION,
            phase,
            project: HookProject {
                name: project_name.to_string(),
                path: project_path.to_path_buf(),
            },
            package: HookPackage {
                label: package.label.clone(),
                name: package.name.clone(),
            },
            variables: ctx.variables().clone(),
        }
    }

    /// Same payload for another phase.
    pub fn for_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    /// Environment variables mirroring the payload's fixed fields.
    pub fn env(&self) -> Vec<(String, String)> {
        vec![
            ("KILN_CONTRACT_VERSION".into(), self.version.to_string()),
            ("KILN_PHASE".into(), self.phase.to_string()),
            ("KILN_PROJECT_NAME".into(), self.project.name.clone()),
            (
                "KILN_PROJECT_PATH".into(),
                self.project.path.display().to_string(),
            ),
            ("KILN_PACKAGE_LABEL".into(), self.package.label.clone()),
            ("KILN_PACKAGE_NAME".into(), self.package.name.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_env_mirrors_fields() {
        let package = Package::builder().label("py").name("Python").build().unwrap();
        let ctx = RenderContext::empty().with_variable("AUTHOR", "Ada");
        let payload = HookPayload::new(Phase::Pre, "demo", Path::new("/w/demo"), &package, &ctx);

        let env = payload.env();
        assert!(env.contains(&("KILN_CONTRACT_VERSION".into(), "1".into())));
        assert!(env.contains(&("KILN_PHASE".into(), "pre".into())));
        assert!(env.contains(&("KILN_PROJECT_PATH".into(), "/w/demo".into())));
        assert!(env.contains(&("KILN_PACKAGE_LABEL".into(), "py".into())));

        let post = payload.for_phase(Phase::Post);
        assert_eq!(post.phase, Phase::Post);
        assert_eq!(post.variables.get("AUTHOR").map(String::as_str), Some("Ada"));
    }
}
