//! A throwaway kiln home: config, registry, templates and plugins in a tempdir.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

pub const PY_PACKAGE: &str = r#"
label = "py"
name = "Python service"
description = "Minimal python layout"

[[dir_tree.entries]]
path = "src"
is_dir = true

[[dir_tree.entries]]
path = "src/__init__.py"

[[dir_tree.entries]]
path = "README.md"
template = { path = "py/README.md" }
"#;

pub struct Sandbox {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for sub in ["templates/py", "plugins", "work"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(
            root.join("templates/py/README.md"),
            "# %{{PROJECT_NAME}}%\nfrom %{{PACKAGE_LABEL}}% by %{{author}}%\n",
        )
        .unwrap();
        fs::write(
            root.join("config.toml"),
            format!(
                r#"
[paths]
database = "{db}"
templates = "{templates}"
plugins = "{plugins}"

[template.variables]
author = "sandbox"
"#,
                db = root.join("kiln.db").display(),
                templates = root.join("templates").display(),
                plugins = root.join("plugins").display(),
            ),
        )
        .unwrap();
        fs::write(root.join("py.toml"), PY_PACKAGE).unwrap();

        Self { _dir: dir, root }
    }

    /// `kiln --config <sandbox>/config.toml ...`, run from `work/`.
    pub fn kiln(&self) -> Command {
        let mut cmd = cargo::cargo_bin_cmd!("kiln");
        cmd.current_dir(self.work())
            .env_remove("RUST_LOG")
            .env_remove("KILN_CONFIG")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.root.join("config.toml"));
        cmd
    }

    pub fn work(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Store the `py` package.
    pub fn import_py(&self) {
        self.kiln()
            .args(["package", "import"])
            .arg(self.path("py.toml"))
            .assert()
            .success();
    }

    /// Projects as reported by `kiln ls --output-format json`.
    pub fn projects(&self) -> Vec<serde_json::Value> {
        let out = self
            .kiln()
            .args(["ls", "--output-format", "json"])
            .output()
            .unwrap();
        assert!(out.status.success());
        serde_json::from_slice(&out.stdout).unwrap()
    }
}
