//! Materialize Service - turns a package and a name into a project on disk.
//!
//! This service coordinates one project's workflow:
//! 1. Resolve the absolute project path
//! 2. Check the registry for a conflict and apply the replace policy
//! 3. Run pre-phase plugins (a failure stops everything before any write)
//! 4. Build the directory tree
//! 5. Run post-phase plugins (a failure is reported, never fatal)
//! 6. Hand back the `Project` record
//!
//! Storing the record is the caller's job, see `ProjectService`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::{
    application::{
        ports::{Filesystem, HookPayload, ProjectRegistry, ScriptRunner},
        services::{
            conflict::{ConflictPolicy, ConflictResolver, MaterializeOutcome},
            plugin_scheduler::{DEFAULT_PLUGIN_TIMEOUT, PluginScheduler},
            tree_builder::{TreeBuilder, TreeReport},
        },
    },
    domain::{
        Delimiters, DomainValidator as validator, Package, Phase, Project, ProjectStatus,
        RenderContext, TemplateRenderer,
    },
    error::{KilnError, KilnResult},
};

/// Settings a materialization needs besides its ports.
#[derive(Debug, Clone)]
pub struct MaterializeSettings {
    /// Where `TemplateRef` paths are resolved.
    pub template_root: PathBuf,
    /// Where relative plugin paths are resolved.
    pub plugin_root: PathBuf,
    pub delimiters: Delimiters,
    /// User variables, layered over the built-ins.
    pub variables: BTreeMap<String, String>,
    pub plugin_timeout: Duration,
}

impl MaterializeSettings {
    pub fn new(template_root: impl Into<PathBuf>, plugin_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
            plugin_root: plugin_root.into(),
            delimiters: Delimiters::default(),
            variables: BTreeMap::new(),
            plugin_timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }
}

/// A successful materialization.
#[derive(Debug, Clone)]
pub struct Materialization {
    /// Not yet stored; `id` is `None`.
    pub project: Project,
    /// `Created` or `Replaced`.
    pub outcome: MaterializeOutcome,
    pub tree: TreeReport,
    pub post_hook_error: Option<KilnError>,
}

pub struct MaterializeService {
    resolver: ConflictResolver,
    scheduler: PluginScheduler,
    builder: TreeBuilder,
    filesystem: Arc<dyn Filesystem>,
    template_root: PathBuf,
    variables: BTreeMap<String, String>,
}

impl MaterializeService {
    pub fn new(
        registry: Arc<dyn ProjectRegistry>,
        filesystem: Arc<dyn Filesystem>,
        runner: Arc<dyn ScriptRunner>,
        settings: MaterializeSettings,
    ) -> Self {
        Self {
            resolver: ConflictResolver::new(registry),
            scheduler: PluginScheduler::new(runner, settings.plugin_root)
                .with_timeout(settings.plugin_timeout),
            builder: TreeBuilder::new(
                filesystem.clone(),
                TemplateRenderer::new(settings.delimiters),
            ),
            filesystem,
            template_root: settings.template_root,
            variables: settings.variables,
        }
    }

    /// Materialize `package` as `project_name` under `destination_root`.
    ///
    /// Fails with `ProjectExists` and touches nothing when the path is
    /// registered and `policy` says abort.
    #[instrument(
        skip_all,
        fields(
            package = %package.label,
            project = %project_name,
            destination = %destination_root.display()
        )
    )]
    pub fn materialize(
        &self,
        package: &Package,
        project_name: &str,
        destination_root: &Path,
        policy: &dyn ConflictPolicy,
    ) -> KilnResult<Materialization> {
        // 1. Resolve path
        validator::validate_project_name(project_name)?;
        let project_path = destination_root.join(project_name);

        // 2. Conflicts
        let replaced = self.resolver.clear(&project_path, policy)?;
        let (outcome, status) = match replaced {
            Some(_) => (MaterializeOutcome::Replaced, ProjectStatus::Replaced),
            None => (MaterializeOutcome::Created, ProjectStatus::Created),
        };

        let ctx = RenderContext::for_project(project_name, &project_path, package)
            .with_variables(self.variables.clone());
        let payload = HookPayload::new(Phase::Pre, project_name, &project_path, package, &ctx);

        // 3. Pre-phase, in the project root or its nearest existing ancestor
        let pre_dir = project_path
            .ancestors()
            .find(|dir| self.filesystem.is_dir(dir))
            .unwrap_or(destination_root);
        self.scheduler
            .run_phase(package.plugins.phase(Phase::Pre), &payload, pre_dir)?;

        // 4. Tree
        let tree = self
            .builder
            .build(&package.dir_tree, &project_path, &self.template_root, &ctx)?;

        // 5. Post-phase
        let post_hook_error = self
            .scheduler
            .run_phase(
                package.plugins.phase(Phase::Post),
                &payload.for_phase(Phase::Post),
                &project_path,
            )
            .err()
            .map(KilnError::from);
        if let Some(e) = &post_hook_error {
            warn!(error = %e, "Post-phase failed; project kept");
        }

        info!(
            %outcome,
            created = tree.created,
            updated = tree.updated,
            unchanged = tree.unchanged,
            "Project materialized"
        );

        // 6. Record
        Ok(Materialization {
            project: Project::new(project_name, project_path, package.label.clone())
                .with_status(status),
            outcome,
            tree,
            post_hook_error,
        })
    }
}
