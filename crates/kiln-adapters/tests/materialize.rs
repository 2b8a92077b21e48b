//! End-to-end materialization against the real filesystem, real `sh` plugins
//! and a SQLite registry.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kiln_adapters::{
    CachedPackageLoader, FileFormat, InMemoryPackageStore, LocalFilesystem, ProcessScriptRunner,
    SqliteRegistry, portability,
};
use kiln_core::prelude::*;
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    root: PathBuf,
    store: InMemoryPackageStore,
    registry: SqliteRegistry,
    projects: ProjectService,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for sub in ["templates/py", "plugins", "dest"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(
            root.join("templates/py/README.md"),
            "# %{{PROJECT_NAME}}%\npackage %{{PACKAGE_LABEL}}% by %{{AUTHOR}}%\n",
        )
        .unwrap();
        fs::write(root.join("templates/py/logo.bin"), [0u8, 159, 146, 150]).unwrap();

        let store = InMemoryPackageStore::new();
        let registry = SqliteRegistry::open(root.join("kiln.db")).unwrap();
        let fs_port: Arc<dyn Filesystem> = Arc::new(LocalFilesystem::new());

        let mut settings = MaterializeSettings::new(root.join("templates"), root.join("plugins"));
        settings.plugin_timeout = Duration::from_secs(10);
        settings
            .variables
            .insert("AUTHOR".to_string(), "kiln tests".to_string());

        let materializer = MaterializeService::new(
            Arc::new(registry.clone()),
            fs_port.clone(),
            Arc::new(ProcessScriptRunner::new()),
            settings,
        );
        let projects = ProjectService::new(
            Arc::new(registry.clone()),
            Arc::new(CachedPackageLoader::new(Arc::new(store.clone()))),
            fs_port,
            materializer,
        );

        Self {
            _dir: dir,
            root,
            store,
            registry,
            projects,
        }
    }

    fn dest(&self) -> PathBuf {
        self.root.join("dest")
    }

    fn log(&self) -> PathBuf {
        self.root.join("hooks.log")
    }

    /// A plugin that appends `tag` to the shared log, then exits with `code`.
    fn plugin(&self, name: &str, tag: &str, code: i32) -> Plugin {
        let path = self.root.join("plugins").join(name);
        fs::write(
            &path,
            format!(
                "#!/bin/sh\necho {tag} >> '{}'\nexit {code}\n",
                self.log().display()
            ),
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Plugin::new(name)
    }

    fn hook_log(&self) -> Vec<String> {
        fs::read_to_string(self.log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn install(&self, package: &Package) {
        self.store.insert(package).unwrap();
    }

    fn create(&self, names: &[&str], policy: ReplacePolicy) -> BatchReport {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.projects
            .create_projects("py", &names, &self.dest(), &policy)
            .unwrap()
    }
}

fn rel(p: &str) -> RelativePath {
    RelativePath::try_new(p).unwrap()
}

fn base_package() -> kiln_core::domain::PackageBuilder {
    Package::builder()
        .label("py")
        .name("Python")
        .entry(DirEntry::dir(rel("src")))
        .entry(DirEntry::templated(
            rel("README.md"),
            TemplateRef::rendered(rel("py/README.md")),
        ))
        .entry(DirEntry::templated(
            rel("assets/logo.bin"),
            TemplateRef::verbatim(rel("py/logo.bin")),
        ))
        .entry(DirEntry::file(rel("src/__init__.py")))
}

#[test]
fn plugins_run_in_order_around_the_tree() {
    let ws = Workspace::new();
    let package = base_package()
        .pre_plugin(ws.plugin("a.sh", "a", 0))
        .pre_plugin(ws.plugin("b.sh", "b", 0))
        .post_plugin(ws.plugin("c.sh", "c", 0))
        .build()
        .unwrap();
    ws.install(&package);

    let report = ws.create(&["demo"], ReplacePolicy::Abort);

    assert!(report.is_success());
    assert_eq!(report.results[0].outcome, MaterializeOutcome::Created);
    assert_eq!(ws.hook_log(), vec!["a", "b", "c"]);

    let project = ws.dest().join("demo");
    assert_eq!(
        fs::read_to_string(project.join("README.md")).unwrap(),
        "# demo\npackage py by kiln tests\n"
    );
    assert_eq!(
        fs::read(project.join("assets/logo.bin")).unwrap(),
        vec![0u8, 159, 146, 150]
    );
    assert_eq!(fs::read(project.join("src/__init__.py")).unwrap(), b"");

    let stored = ws.registry.load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].path, project);
    assert_eq!(stored[0].status, ProjectStatus::Created);
}

#[test]
fn failing_pre_plugin_stops_before_any_write() {
    let ws = Workspace::new();
    let package = base_package()
        .pre_plugin(ws.plugin("a.sh", "a", 0))
        .pre_plugin(ws.plugin("b.sh", "b", 1))
        .pre_plugin(ws.plugin("c.sh", "c", 0))
        .post_plugin(ws.plugin("d.sh", "d", 0))
        .build()
        .unwrap();
    ws.install(&package);

    let report = ws.create(&["demo"], ReplacePolicy::Abort);

    assert!(!report.is_success());
    assert!(matches!(
        report.results[0].outcome,
        MaterializeOutcome::Failed(_)
    ));
    assert_eq!(ws.hook_log(), vec!["a", "b"]);
    assert!(!ws.dest().join("demo").exists());
    assert!(ws.registry.load_all().unwrap().is_empty());
}

#[test]
fn pre_plugins_work_when_the_destination_does_not_exist_yet() {
    let ws = Workspace::new();
    let package = base_package()
        .pre_plugin(ws.plugin("a.sh", "a", 0))
        .build()
        .unwrap();
    ws.install(&package);
    let dest = ws.root.join("not-yet/deeper");

    let report = ws
        .projects
        .create_projects("py", &["demo".to_string()], &dest, &ReplacePolicy::Abort)
        .unwrap();

    assert!(report.is_success(), "{:?}", report.results[0].error);
    assert_eq!(report.results[0].outcome, MaterializeOutcome::Created);
    assert_eq!(ws.hook_log(), vec!["a"]);
    assert!(dest.join("demo/README.md").is_file());
}

#[test]
fn failing_post_plugin_keeps_the_project() {
    let ws = Workspace::new();
    let package = base_package()
        .post_plugin(ws.plugin("x.sh", "x", 2))
        .post_plugin(ws.plugin("y.sh", "y", 0))
        .build()
        .unwrap();
    ws.install(&package);

    let report = ws.create(&["demo"], ReplacePolicy::Abort);
    let result = &report.results[0];

    assert_eq!(result.outcome, MaterializeOutcome::Created);
    assert!(result.post_hook_error.is_some());
    assert_eq!(ws.hook_log(), vec!["x"]);
    assert_eq!(ws.registry.load_all().unwrap().len(), 1);
}

#[test]
fn one_bad_name_does_not_stop_the_batch() {
    let ws = Workspace::new();
    ws.install(&base_package().build().unwrap());

    let report = ws.create(&["one", ".hidden", "two"], ReplacePolicy::Abort);

    let outcomes: Vec<_> = report.results.iter().map(|r| r.outcome.is_success()).collect();
    assert_eq!(outcomes, vec![true, false, true]);
    assert!(ws.dest().join("one/README.md").is_file());
    assert!(ws.dest().join("two/README.md").is_file());
    assert!(!ws.dest().join(".hidden").exists());
    assert_eq!(ws.registry.load_all().unwrap().len(), 2);
}

#[test]
fn abort_on_conflict_touches_nothing() {
    let ws = Workspace::new();
    let package = base_package()
        .pre_plugin(ws.plugin("a.sh", "a", 0))
        .build()
        .unwrap();
    ws.install(&package);
    ws.create(&["demo"], ReplacePolicy::Abort);

    let readme = ws.dest().join("demo/README.md");
    fs::write(&readme, "local edits").unwrap();

    let report = ws.create(&["demo"], ReplacePolicy::Abort);

    assert_eq!(report.results[0].outcome, MaterializeOutcome::Aborted);
    assert_eq!(fs::read_to_string(&readme).unwrap(), "local edits");
    assert_eq!(ws.hook_log(), vec!["a"]);
    assert_eq!(ws.registry.load_all().unwrap().len(), 1);
}

#[test]
fn replace_rewrites_and_is_idempotent() {
    let ws = Workspace::new();
    ws.install(&base_package().build().unwrap());
    ws.create(&["demo"], ReplacePolicy::Abort);

    let readme = ws.dest().join("demo/README.md");
    fs::write(&readme, "local edits").unwrap();

    let first = ws.create(&["demo"], ReplacePolicy::Replace);
    let tree = first.results[0].tree.as_ref().unwrap();
    assert_eq!(first.results[0].outcome, MaterializeOutcome::Replaced);
    assert_eq!(tree.updated, 1);
    assert_eq!(fs::read_to_string(&readme).unwrap(), "# demo\npackage py by kiln tests\n");

    let second = ws.create(&["demo"], ReplacePolicy::Replace);
    let tree = second.results[0].tree.as_ref().unwrap();
    assert!(!tree.changed());
    assert_eq!(tree.unchanged, 4);

    let stored = ws.registry.load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, ProjectStatus::Replaced);
}

#[test]
fn hooks_receive_the_contract() {
    let ws = Workspace::new();
    let script = ws.root.join("plugins/dump.sh");
    fs::write(
        &script,
        "#!/bin/sh\ncat > payload.json\necho \"$KILN_CONTRACT_VERSION $KILN_PHASE $1\" > env.txt\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    ws.install(
        &base_package()
            .post_plugin(Plugin::new("dump.sh"))
            .build()
            .unwrap(),
    );

    ws.create(&["demo"], ReplacePolicy::Abort);

    let project = ws.dest().join("demo");
    let payload: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(project.join("payload.json")).unwrap()).unwrap();
    assert_eq!(payload["version"], 1);
    assert_eq!(payload["phase"], "post");
    assert_eq!(payload["project"]["name"], "demo");
    assert_eq!(payload["variables"]["AUTHOR"], "kiln tests");
    assert_eq!(
        fs::read_to_string(project.join("env.txt")).unwrap().trim(),
        format!("1 post {}", project.display())
    );
}

#[test]
fn exported_package_materializes_identically() {
    let ws = Workspace::new();
    let original = base_package().build().unwrap();
    let file = portability::export(&original, FileFormat::Json, &ws.root).unwrap();

    let imported = portability::import(&file).unwrap();
    assert_eq!(imported, original);
    ws.install(&imported);

    let report = ws.create(&["demo"], ReplacePolicy::Abort);
    assert!(report.is_success());
    assert!(ws.dest().join("demo/assets/logo.bin").is_file());
}

#[test]
fn clean_drops_records_of_deleted_projects() {
    let ws = Workspace::new();
    ws.install(&base_package().build().unwrap());
    ws.create(&["keep", "gone"], ReplacePolicy::Abort);

    fs::remove_dir_all(ws.dest().join("gone")).unwrap();
    let removed = ws.projects.clean_projects().unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].name, "gone");
    let left: Vec<_> = ws
        .projects
        .list_projects()
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(left, vec!["keep"]);
}

#[test]
fn escaping_paths_never_reach_the_disk() {
    assert!(RelativePath::try_new("../outside").is_err());
    assert!(RelativePath::try_new("/etc/passwd").is_err());

    let text = r#"{"label":"evil","name":"Evil","dir_tree":{"entries":[{"path":"a/../../x"}]}}"#;
    assert!(portability::from_str(text, FileFormat::Json).is_err());
}
