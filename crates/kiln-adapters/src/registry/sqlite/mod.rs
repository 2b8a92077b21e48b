//! SQLite-backed project registry and package store.

mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use tracing::{debug, info};

use kiln_core::{
    application::{
        ApplicationError,
        ports::{PackageStore, ProjectRegistry},
    },
    domain::{
        DirEntry, DirTree, Package, Plugin, PluginSchedule, Project, ProjectId, ProjectStatus,
        RelativePath, TemplateRef,
    },
    error::{KilnError, KilnResult},
};

/// One database file holding both projects and packages. Clones share the
/// connection.
#[derive(Clone)]
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open (creating parents and schema as needed).
    pub fn open(path: impl AsRef<Path>) -> KilnResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::filesystem::map_io_error(parent, e, "create directory"))?;
        }
        let conn = Connection::open(path).map_err(registry_error)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(registry_error)?;
        debug!(path = %path.display(), "Registry opened");
        Self::init(conn)
    }

    pub fn open_memory() -> KilnResult<Self> {
        Self::init(Connection::open_in_memory().map_err(registry_error)?)
    }

    fn init(conn: Connection) -> KilnResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(registry_error)?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> KilnResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ApplicationError::StoreLockError.into())
    }
}

fn registry_error(e: rusqlite::Error) -> KilnError {
    ApplicationError::Registry {
        reason: e.to_string(),
    }
    .into()
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> KilnError {
    ApplicationError::Registry {
        reason: format!("corrupt {what} row: {detail}"),
    }
    .into()
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================
// Projects
// ============================================================

const PROJECT_COLUMNS: &str = "id, name, path, package_label, status";

struct ProjectRow {
    id: i64,
    name: String,
    path: String,
    package_label: String,
    status: String,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            path: row.get(2)?,
            package_label: row.get(3)?,
            status: row.get(4)?,
        })
    }

    fn into_project(self) -> KilnResult<Project> {
        let status: ProjectStatus = self
            .status
            .parse()
            .map_err(|e| corrupt("project", e))?;
        Ok(Project::new(self.name, PathBuf::from(self.path), self.package_label)
            .with_status(status)
            .with_id(ProjectId(self.id)))
    }
}

fn find_project(conn: &Connection, path: &Path) -> KilnResult<Option<Project>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE path = ?"),
        [path_text(path)],
        ProjectRow::from_row,
    )
    .optional()
    .map_err(registry_error)?
    .map(ProjectRow::into_project)
    .transpose()
}

fn project_not_found(id: ProjectId) -> KilnError {
    ApplicationError::ProjectNotFound {
        reference: id.to_string(),
    }
    .into()
}

impl ProjectRegistry for SqliteRegistry {
    fn find_by_path(&self, path: &Path) -> KilnResult<Option<Project>> {
        let conn = self.lock()?;
        find_project(&conn, path)
    }

    fn store(&self, project: &Project) -> KilnResult<Project> {
        let conn = self.lock()?;

        if find_project(&conn, &project.path)?.is_some() {
            return Err(ApplicationError::ProjectExists {
                path: project.path.clone(),
            }
            .into());
        }

        conn.execute(
            "INSERT INTO projects (name, path, package_label, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                project.name,
                path_text(&project.path),
                project.package_label,
                project.status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(registry_error)?;

        let id = ProjectId(conn.last_insert_rowid());
        info!(%id, path = %project.path.display(), "Project stored");
        Ok(project.clone().with_id(id))
    }

    fn remove_by_path(&self, path: &Path) -> KilnResult<bool> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM projects WHERE path = ?", [path_text(path)])
            .map_err(registry_error)?;
        Ok(removed > 0)
    }

    fn remove(&self, id: ProjectId) -> KilnResult<()> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM projects WHERE id = ?", [id.0])
            .map_err(registry_error)?;
        if removed == 0 {
            return Err(project_not_found(id));
        }
        Ok(())
    }

    fn load(&self, id: ProjectId) -> KilnResult<Project> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"),
            [id.0],
            ProjectRow::from_row,
        )
        .optional()
        .map_err(registry_error)?
        .ok_or_else(|| project_not_found(id))?
        .into_project()
    }

    fn load_all(&self) -> KilnResult<Vec<Project>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"))
            .map_err(registry_error)?;
        let rows = stmt
            .query_map([], ProjectRow::from_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(registry_error)?;
        rows.into_iter().map(ProjectRow::into_project).collect()
    }
}

// ============================================================
// Packages
// ============================================================

fn load_package(conn: &Connection, label: &str) -> KilnResult<Option<Package>> {
    let header = conn
        .query_row(
            "SELECT label, name, upstream_url, description FROM packages WHERE label = ?",
            [label],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()
        .map_err(registry_error)?;

    let Some((label, name, upstream_url, description)) = header else {
        return Ok(None);
    };

    let package = Package {
        dir_tree: load_entries(conn, &label)?,
        plugins: load_plugins(conn, &label)?,
        label,
        name,
        upstream_url,
        description,
    };
    package.validate().map_err(|e| corrupt("package", e))?;
    Ok(Some(package))
}

fn load_entries(conn: &Connection, label: &str) -> KilnResult<DirTree> {
    let mut stmt = conn
        .prepare(
            "SELECT path, is_dir, template_path, template_render
             FROM package_entries WHERE package_label = ? ORDER BY position",
        )
        .map_err(registry_error)?;
    let rows = stmt
        .query_map([label], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(registry_error)?;

    let mut tree = DirTree::new();
    for (path, is_dir, template_path, render) in rows {
        let path = RelativePath::try_new(&path).map_err(|e| corrupt("entry", e))?;
        let template = template_path
            .map(|t| RelativePath::try_new(&t).map(|path| TemplateRef { path, render }))
            .transpose()
            .map_err(|e| corrupt("entry", e))?;
        tree.push(DirEntry {
            path,
            is_dir,
            template,
        });
    }
    Ok(tree)
}

fn load_plugins(conn: &Connection, label: &str) -> KilnResult<PluginSchedule> {
    let mut stmt = conn
        .prepare(
            "SELECT phase, path FROM package_plugins
             WHERE package_label = ? ORDER BY phase DESC, position",
        )
        .map_err(registry_error)?;
    let rows = stmt
        .query_map([label], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(registry_error)?;

    let mut schedule = PluginSchedule::default();
    for (phase, path) in rows {
        match phase.as_str() {
            "pre" => schedule.pre.push(Plugin::new(path)),
            "post" => schedule.post.push(Plugin::new(path)),
            other => return Err(corrupt("plugin", format!("unknown phase '{other}'"))),
        }
    }
    Ok(schedule)
}

fn insert_package(tx: &Transaction<'_>, package: &Package) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM packages WHERE label = ?", [&package.label])?;
    tx.execute(
        "INSERT INTO packages (label, name, upstream_url, description, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
            package.label,
            package.name,
            package.upstream_url,
            package.description,
            Utc::now().to_rfc3339(),
        ],
    )?;

    let mut entry = tx.prepare(
        "INSERT INTO package_entries
         (package_label, position, path, is_dir, template_path, template_render)
         VALUES (?, ?, ?, ?, ?, ?)",
    )?;
    for (position, e) in package.dir_tree.iter().enumerate() {
        entry.execute(params![
            package.label,
            position as i64,
            e.path.to_slash_string(),
            e.is_dir,
            e.template.as_ref().map(|t| t.path.to_slash_string()),
            e.template.as_ref().is_none_or(|t| t.render),
        ])?;
    }

    let mut plugin = tx.prepare(
        "INSERT INTO package_plugins (package_label, phase, position, path)
         VALUES (?, ?, ?, ?)",
    )?;
    for (phase, plugins) in [("pre", &package.plugins.pre), ("post", &package.plugins.post)] {
        for (position, p) in plugins.iter().enumerate() {
            plugin.execute(params![
                package.label,
                phase,
                position as i64,
                path_text(&p.path),
            ])?;
        }
    }
    Ok(())
}

impl PackageStore for SqliteRegistry {
    fn get(&self, label: &str) -> KilnResult<Option<Package>> {
        let conn = self.lock()?;
        load_package(&conn, label)
    }

    fn insert(&self, package: &Package) -> KilnResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(registry_error)?;
        insert_package(&tx, package).map_err(registry_error)?;
        tx.commit().map_err(registry_error)?;
        info!(label = %package.label, "Package stored");
        Ok(())
    }

    fn remove(&self, label: &str) -> KilnResult<bool> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM packages WHERE label = ?", [label])
            .map_err(registry_error)?;
        Ok(removed > 0)
    }

    fn list(&self) -> KilnResult<Vec<Package>> {
        let conn = self.lock()?;
        let labels = {
            let mut stmt = conn
                .prepare("SELECT label FROM packages ORDER BY label")
                .map_err(registry_error)?;
            stmt.query_map([], |row| row.get::<_, String>(0))
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(registry_error)?
        };

        labels
            .iter()
            .filter_map(|label| load_package(&conn, label).transpose())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rel(p: &str) -> RelativePath {
        RelativePath::try_new(p).unwrap()
    }

    fn package() -> Package {
        Package::builder()
            .label("py")
            .name("Python")
            .upstream_url("https://github.com/me/py-template")
            .entry(DirEntry::dir(rel("src")))
            .entry(DirEntry::templated(
                rel("README.md"),
                TemplateRef::rendered(rel("py/README.md")),
            ))
            .entry(DirEntry::templated(
                rel("logo.png"),
                TemplateRef::verbatim(rel("py/logo.png")),
            ))
            .entry(DirEntry::file(rel("src/__init__.py")))
            .pre_plugin(Plugin::new("check.sh"))
            .post_plugin(Plugin::new("git-init.sh"))
            .post_plugin(Plugin::new("/usr/local/bin/venv"))
            .build()
            .unwrap()
    }

    #[test]
    fn store_assigns_ids_and_enforces_unique_paths() {
        let registry = SqliteRegistry::open_memory().unwrap();
        let a = registry.store(&Project::new("a", "/w/a", "py")).unwrap();
        let b = registry.store(&Project::new("b", "/w/b", "py")).unwrap();
        assert_ne!(a.id, b.id);

        let err = registry
            .store(&Project::new("a2", "/w/a", "py"))
            .unwrap_err();
        assert!(err.is_project_exists());
    }

    #[test]
    fn project_lookup_and_removal() {
        let registry = SqliteRegistry::open_memory().unwrap();
        let stored = registry
            .store(&Project::new("a", "/w/a", "py").with_status(ProjectStatus::Adopted))
            .unwrap();
        let id = stored.id.unwrap();

        assert_eq!(registry.load(id).unwrap(), stored);
        assert_eq!(
            registry.find_by_path(Path::new("/w/a")).unwrap(),
            Some(stored.clone())
        );

        assert!(registry.remove_by_path(Path::new("/w/a")).unwrap());
        assert!(!registry.remove_by_path(Path::new("/w/a")).unwrap());
        assert!(ProjectRegistry::remove(&registry, id).is_err());
        assert!(registry.load(id).is_err());
    }

    #[test]
    fn load_all_is_ordered_by_id() {
        let registry = SqliteRegistry::open_memory().unwrap();
        for name in ["c", "a", "b"] {
            registry
                .store(&Project::new(name, format!("/w/{name}"), "py"))
                .unwrap();
        }
        let names: Vec<_> = registry
            .load_all()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn package_survives_storage() {
        let registry = SqliteRegistry::open_memory().unwrap();
        registry.insert(&package()).unwrap();

        assert_eq!(PackageStore::get(&registry, "py").unwrap(), Some(package()));
        assert_eq!(PackageStore::get(&registry, "go").unwrap(), None);
    }

    #[test]
    fn insert_overwrites_by_label() {
        let registry = SqliteRegistry::open_memory().unwrap();
        registry.insert(&package()).unwrap();

        let smaller = Package::builder()
            .label("py")
            .name("Python (slim)")
            .entry(DirEntry::dir(rel("lib")))
            .build()
            .unwrap();
        registry.insert(&smaller).unwrap();

        assert_eq!(PackageStore::get(&registry, "py").unwrap(), Some(smaller));
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn removing_a_package_drops_its_rows() {
        let registry = SqliteRegistry::open_memory().unwrap();
        registry.insert(&package()).unwrap();

        assert!(PackageStore::remove(&registry, "py").unwrap());
        assert!(!PackageStore::remove(&registry, "py").unwrap());

        let conn = registry.lock().unwrap();
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM package_entries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn data_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested/kiln.db");

        {
            let registry = SqliteRegistry::open(&db).unwrap();
            registry.store(&Project::new("a", "/w/a", "py")).unwrap();
            registry.insert(&package()).unwrap();
        }

        let reopened = SqliteRegistry::open(&db).unwrap();
        assert_eq!(reopened.load_all().unwrap().len(), 1);
        assert_eq!(reopened.list().unwrap(), vec![package()]);
    }
}
