//! Wiring of adapters into services for one CLI invocation.

use std::sync::Arc;

use tracing::debug;

use kiln_adapters::{
    CachedPackageLoader, LocalFilesystem, ProcessScriptRunner, SqliteRegistry, mimic::RemoteClient,
};
use kiln_core::prelude::*;

use crate::config::AppConfig;
use crate::error::CliResult;

/// Services backed by the SQLite registry named in the configuration.
pub struct AppContext {
    pub projects: ProjectService,
    pub packages: PackageService,
    loader: Arc<CachedPackageLoader>,
    config: AppConfig,
}

impl AppContext {
    pub fn open(config: AppConfig) -> CliResult<Self> {
        let registry = SqliteRegistry::open(&config.paths.database)?;
        debug!(database = %config.paths.database.display(), "Registry opened");

        let filesystem: Arc<dyn Filesystem> = Arc::new(LocalFilesystem::new());
        let loader = Arc::new(CachedPackageLoader::new(Arc::new(registry.clone())));

        let materializer = MaterializeService::new(
            Arc::new(registry.clone()),
            filesystem.clone(),
            Arc::new(ProcessScriptRunner::new()),
            config.materialize_settings()?,
        );
        let projects = ProjectService::new(
            Arc::new(registry.clone()),
            loader.clone(),
            filesystem,
            materializer,
        );
        let packages = PackageService::new(Arc::new(registry), loader.clone());

        Ok(Self {
            projects,
            packages,
            loader,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Delete a stored package and drop it from the loader cache.
    pub fn remove_package(&self, label: &str) -> CliResult<()> {
        self.packages.remove(label)?;
        self.loader.invalidate(label)?;
        Ok(())
    }

    /// HTTP client for repository sources, authenticated from config.
    pub fn remote_client(&self) -> CliResult<RemoteClient> {
        Ok(RemoteClient::new(self.config.remote_tokens())?)
    }
}
