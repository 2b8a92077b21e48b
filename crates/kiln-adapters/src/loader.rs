//! Package loader backed by a [`PackageStore`], with a per-process cache.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::{debug, instrument};

use kiln_core::{
    application::{
        ApplicationError,
        ports::{PackageLoader, PackageStore},
    },
    domain::Package,
    error::KilnResult,
};

/// Loads packages from the store once, then serves them from memory.
///
/// `refresh = true` bypasses the cache and replaces the cached copy.
pub struct CachedPackageLoader {
    store: Arc<dyn PackageStore>,
    cache: RwLock<HashMap<String, Arc<Package>>>,
}

impl CachedPackageLoader {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop a cached entry, e.g. after the package was removed.
    pub fn invalidate(&self, label: &str) -> KilnResult<()> {
        self.cache
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?
            .remove(label);
        Ok(())
    }
}

impl PackageLoader for CachedPackageLoader {
    #[instrument(skip(self))]
    fn load_package(&self, refresh: bool, label: &str) -> KilnResult<Arc<Package>> {
        if !refresh {
            let cache = self
                .cache
                .read()
                .map_err(|_| ApplicationError::StoreLockError)?;
            if let Some(package) = cache.get(label) {
                debug!("Package served from cache");
                return Ok(Arc::clone(package));
            }
        }

        let package = self
            .store
            .get(label)?
            .map(Arc::new)
            .ok_or_else(|| ApplicationError::PackageNotFound {
                label: label.to_string(),
            })?;

        self.cache
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?
            .insert(label.to_string(), Arc::clone(&package));
        debug!("Package loaded from store");
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryPackageStore;

    fn package(name: &str) -> Package {
        Package::builder().label("py").name(name).build().unwrap()
    }

    #[test]
    fn caches_until_refresh() {
        let store = InMemoryPackageStore::new().with_package(package("Python"));
        let loader = CachedPackageLoader::new(Arc::new(store.clone()));

        assert_eq!(loader.load_package(false, "py").unwrap().name, "Python");

        store.insert(&package("Python 3")).unwrap();
        assert_eq!(loader.load_package(false, "py").unwrap().name, "Python");
        assert_eq!(loader.load_package(true, "py").unwrap().name, "Python 3");
        assert_eq!(loader.load_package(false, "py").unwrap().name, "Python 3");
    }

    #[test]
    fn missing_label_is_not_found() {
        let loader = CachedPackageLoader::new(Arc::new(InMemoryPackageStore::new()));
        let err = loader.load_package(false, "nope").unwrap_err();
        assert!(matches!(
            err,
            kiln_core::error::KilnError::Application(ApplicationError::PackageNotFound { .. })
        ));
    }

    #[test]
    fn invalidate_forces_reload() {
        let store = InMemoryPackageStore::new().with_package(package("Python"));
        let loader = CachedPackageLoader::new(Arc::new(store.clone()));
        loader.load_package(false, "py").unwrap();

        PackageStore::remove(&store, "py").unwrap();
        loader.invalidate("py").unwrap();
        assert!(loader.load_package(false, "py").is_err());
    }
}
