//! Package Service - package management operations.
//!
//! Handles package CRUD against the store. Separated from ProjectService for
//! single responsibility.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    application::{
        ApplicationError,
        ports::{PackageLoader, PackageStore},
    },
    domain::{DomainValidator as validator, Package, PackageSummary},
    error::KilnResult,
};

/// Service for package operations.
pub struct PackageService {
    store: Arc<dyn PackageStore>,
    loader: Arc<dyn PackageLoader>,
}

impl PackageService {
    pub fn new(store: Arc<dyn PackageStore>, loader: Arc<dyn PackageLoader>) -> Self {
        Self { store, loader }
    }

    /// Shared copy through the loader. `refresh` skips its cache.
    pub fn load(&self, refresh: bool, label: &str) -> KilnResult<Arc<Package>> {
        self.loader.load_package(refresh, label)
    }

    /// Get a package straight from the store.
    pub fn get(&self, label: &str) -> KilnResult<Package> {
        self.store
            .get(label)?
            .ok_or_else(|| not_found(label).into())
    }

    /// Add or replace a package. Returns whether one was replaced.
    #[instrument(skip_all, fields(label = %package.label))]
    pub fn add(&self, package: &Package) -> KilnResult<bool> {
        validator::validate_package(package)?;
        let replaced = self.store.get(&package.label)?.is_some();
        self.store.insert(package)?;
        info!(replaced, "Package stored");
        Ok(replaced)
    }

    pub fn remove(&self, label: &str) -> KilnResult<()> {
        if !self.store.remove(label)? {
            return Err(not_found(label).into());
        }
        info!(label, "Package removed");
        Ok(())
    }

    pub fn list(&self) -> KilnResult<Vec<PackageSummary>> {
        Ok(self
            .store
            .list()?
            .iter()
            .map(Package::summary)
            .collect())
    }
}

fn not_found(label: &str) -> ApplicationError {
    ApplicationError::PackageNotFound {
        label: label.to_string(),
    }
}
