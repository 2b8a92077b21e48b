//! Project Service - project use cases on top of the registry.
//!
//! Batch creation loads the package once and materializes every name on its
//! own: one failed name never stops the others.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        ports::{Filesystem, PackageLoader, ProjectRegistry},
        services::{
            conflict::{ConflictPolicy, MaterializeOutcome},
            materialize_service::MaterializeService,
            tree_builder::TreeReport,
        },
    },
    domain::{DomainValidator as validator, Package, Project, ProjectId, ProjectStatus},
    error::{KilnError, KilnResult},
};

/// Result for one requested name.
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub name: String,
    pub outcome: MaterializeOutcome,
    /// The stored record, on success.
    pub project: Option<Project>,
    pub tree: Option<TreeReport>,
    /// Why the project failed or was aborted.
    pub error: Option<KilnError>,
    pub post_hook_error: Option<KilnError>,
}

impl ProjectReport {
    fn failed(name: &str, error: KilnError) -> Self {
        let outcome = if error.is_project_exists() {
            MaterializeOutcome::Aborted
        } else {
            MaterializeOutcome::Failed(error.to_string())
        };
        Self {
            name: name.to_string(),
            outcome,
            project: None,
            tree: None,
            error: Some(error),
            post_hook_error: None,
        }
    }
}

/// Per-name results of one `create_projects` call, in request order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub package: String,
    pub results: Vec<ProjectReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProjectReport> {
        self.results.iter().filter(|r| r.outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProjectReport> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }
}

/// Which records `remove_projects` deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveSelection {
    Ids(Vec<ProjectId>),
    All,
}

pub struct ProjectService {
    registry: Arc<dyn ProjectRegistry>,
    loader: Arc<dyn PackageLoader>,
    filesystem: Arc<dyn Filesystem>,
    materializer: MaterializeService,
}

impl ProjectService {
    pub fn new(
        registry: Arc<dyn ProjectRegistry>,
        loader: Arc<dyn PackageLoader>,
        filesystem: Arc<dyn Filesystem>,
        materializer: MaterializeService,
    ) -> Self {
        Self {
            registry,
            loader,
            filesystem,
            materializer,
        }
    }

    /// Create one project per name from the package `label`.
    ///
    /// Only a missing package fails the whole call. Each record is stored
    /// right after its tree is built.
    #[instrument(skip(self, policy), fields(count = names.len()))]
    pub fn create_projects(
        &self,
        label: &str,
        names: &[String],
        destination_root: &Path,
        policy: &dyn ConflictPolicy,
    ) -> KilnResult<BatchReport> {
        let package = self.loader.load_package(false, label)?;

        let results: Vec<_> = names
            .iter()
            .map(|name| self.create_one(&package, name, destination_root, policy))
            .collect();

        let report = BatchReport {
            package: package.label.clone(),
            results,
        };
        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "Batch finished"
        );
        Ok(report)
    }

    fn create_one(
        &self,
        package: &Arc<Package>,
        name: &str,
        destination_root: &Path,
        policy: &dyn ConflictPolicy,
    ) -> ProjectReport {
        let materialized =
            match self
                .materializer
                .materialize(package, name, destination_root, policy)
            {
                Ok(m) => m,
                Err(e) => {
                    warn!(project = name, error = %e, "Project not created");
                    return ProjectReport::failed(name, e);
                }
            };

        match self.registry.store(&materialized.project) {
            Ok(stored) => ProjectReport {
                name: name.to_string(),
                outcome: materialized.outcome,
                project: Some(stored),
                tree: Some(materialized.tree),
                error: None,
                post_hook_error: materialized.post_hook_error,
            },
            Err(e) => {
                warn!(project = name, error = %e, "Project built but not stored");
                ProjectReport {
                    tree: Some(materialized.tree),
                    post_hook_error: materialized.post_hook_error,
                    ..ProjectReport::failed(name, e)
                }
            }
        }
    }

    /// Register an existing directory without materializing anything.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn add_project(&self, label: &str, path: &Path) -> KilnResult<Project> {
        self.loader.load_package(false, label)?;

        if !self.filesystem.is_dir(path) {
            return Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "not an existing directory".into(),
            }
            .into());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "path has no final component".into(),
            })?;
        validator::validate_project_name(&name)?;

        let project = Project::new(name, path, label).with_status(ProjectStatus::Adopted);
        let stored = self.registry.store(&project)?;
        info!(id = ?stored.id, "Project adopted");
        Ok(stored)
    }

    pub fn list_projects(&self) -> KilnResult<Vec<Project>> {
        self.registry.load_all()
    }

    pub fn get_project(&self, id: ProjectId) -> KilnResult<Project> {
        self.registry.load(id)
    }

    /// Delete registry records. Files on disk are kept.
    ///
    /// With explicit ids every id is looked up first, so an unknown id
    /// removes nothing.
    #[instrument(skip(self))]
    pub fn remove_projects(&self, selection: RemoveSelection) -> KilnResult<Vec<Project>> {
        let targets = match selection {
            RemoveSelection::All => self.registry.load_all()?,
            RemoveSelection::Ids(ids) => ids
                .into_iter()
                .map(|id| self.registry.load(id))
                .collect::<KilnResult<Vec<_>>>()?,
        };

        for project in &targets {
            if let Some(id) = project.id {
                self.registry.remove(id)?;
            }
        }

        info!(removed = targets.len(), "Projects removed");
        Ok(targets)
    }

    /// Drop records whose directory no longer exists.
    #[instrument(skip(self))]
    pub fn clean_projects(&self) -> KilnResult<Vec<Project>> {
        let mut removed = Vec::new();
        for project in self.registry.load_all()? {
            if self.filesystem.exists(&project.path) {
                continue;
            }
            if let Some(id) = project.id {
                self.registry.remove(id)?;
                removed.push(project);
            }
        }
        info!(removed = removed.len(), "Registry cleaned");
        Ok(removed)
    }
}
