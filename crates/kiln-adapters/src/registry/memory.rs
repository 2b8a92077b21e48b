//! In-memory registry and package store.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use kiln_core::{
    application::{
        ApplicationError,
        ports::{PackageStore, ProjectRegistry},
    },
    domain::{Package, Project, ProjectId},
    error::KilnResult,
};

/// Thread-safe project registry kept in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: i64,
    projects: BTreeMap<i64, Project>,
}

impl RegistryInner {
    fn id_for(&self, path: &Path) -> Option<i64> {
        self.projects
            .iter()
            .find(|(_, p)| p.path == path)
            .map(|(id, _)| *id)
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.projects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> KilnResult<RwLockReadGuard<'_, RegistryInner>> {
        self.inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError.into())
    }

    fn write(&self) -> KilnResult<RwLockWriteGuard<'_, RegistryInner>> {
        self.inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError.into())
    }
}

impl ProjectRegistry for InMemoryRegistry {
    fn find_by_path(&self, path: &Path) -> KilnResult<Option<Project>> {
        let inner = self.read()?;
        Ok(inner.id_for(path).and_then(|id| inner.projects.get(&id).cloned()))
    }

    fn store(&self, project: &Project) -> KilnResult<Project> {
        let mut inner = self.write()?;
        if inner.id_for(&project.path).is_some() {
            return Err(ApplicationError::ProjectExists {
                path: project.path.clone(),
            }
            .into());
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let stored = project.clone().with_id(ProjectId(id));
        inner.projects.insert(id, stored.clone());
        Ok(stored)
    }

    fn remove_by_path(&self, path: &Path) -> KilnResult<bool> {
        let mut inner = self.write()?;
        match inner.id_for(path) {
            Some(id) => Ok(inner.projects.remove(&id).is_some()),
            None => Ok(false),
        }
    }

    fn remove(&self, id: ProjectId) -> KilnResult<()> {
        self.write()?
            .projects
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| {
                ApplicationError::ProjectNotFound {
                    reference: id.to_string(),
                }
                .into()
            })
    }

    fn load(&self, id: ProjectId) -> KilnResult<Project> {
        self.read()?.projects.get(&id.0).cloned().ok_or_else(|| {
            ApplicationError::ProjectNotFound {
                reference: id.to_string(),
            }
            .into()
        })
    }

    fn load_all(&self) -> KilnResult<Vec<Project>> {
        Ok(self.read()?.projects.values().cloned().collect())
    }
}

/// Package store keyed by label.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPackageStore {
    inner: Arc<RwLock<BTreeMap<String, Package>>>,
}

impl InMemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a package (testing helper).
    pub fn with_package(self, package: Package) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner.insert(package.label.clone(), package);
        }
        self
    }
}

impl PackageStore for InMemoryPackageStore {
    fn get(&self, label: &str) -> KilnResult<Option<Package>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.get(label).cloned())
    }

    fn insert(&self, package: &Package) -> KilnResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.insert(package.label.clone(), package.clone());
        Ok(())
    }

    fn remove(&self, label: &str) -> KilnResult<bool> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.remove(label).is_some())
    }

    fn list(&self) -> KilnResult<Vec<Package>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_are_not_reused() {
        let registry = InMemoryRegistry::new();
        let a = registry.store(&Project::new("a", "/w/a", "py")).unwrap();
        ProjectRegistry::remove(&registry, a.id.unwrap()).unwrap();
        let b = registry.store(&Project::new("b", "/w/b", "py")).unwrap();

        assert!(b.id.unwrap() > a.id.unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let registry = InMemoryRegistry::new();
        registry.store(&Project::new("a", "/w/a", "py")).unwrap();
        let err = registry
            .store(&Project::new("other", "/w/a", "go"))
            .unwrap_err();
        assert!(err.is_project_exists());
    }

    #[test]
    fn remove_by_path_reports_presence() {
        let registry = InMemoryRegistry::new();
        registry.store(&Project::new("a", "/w/a", "py")).unwrap();

        assert!(registry.remove_by_path(Path::new("/w/a")).unwrap());
        assert!(!registry.remove_by_path(Path::new("/w/a")).unwrap());
        assert!(registry.load_all().unwrap().is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = InMemoryRegistry::new();
        assert!(registry.load(ProjectId(9)).is_err());
        assert!(ProjectRegistry::remove(&registry, ProjectId(9)).is_err());
    }

    #[test]
    fn package_store_upserts_by_label() {
        let store = InMemoryPackageStore::new();
        let v1 = Package::builder().label("py").name("Python").build().unwrap();
        let v2 = Package::builder().label("py").name("Python 3").build().unwrap();

        store.insert(&v1).unwrap();
        store.insert(&v2).unwrap();

        assert_eq!(store.list().unwrap(), vec![v2.clone()]);
        assert_eq!(PackageStore::get(&store, "py").unwrap(), Some(v2));
        assert!(PackageStore::remove(&store, "py").unwrap());
        assert_eq!(PackageStore::get(&store, "py").unwrap(), None);
    }
}
