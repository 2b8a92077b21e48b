//! Package files: export a package to TOML or JSON and import it back.
//!
//! # File layout (TOML)
//!
//! ```toml
//! label        = "py"
//! name         = "Python"
//! upstream_url = "https://github.com/me/py-template"   # optional
//! description  = "Python service skeleton"             # optional
//!
//! [[dir_tree.entries]]
//! path   = "src"
//! is_dir = true
//!
//! [[dir_tree.entries]]
//! path   = "README.md"
//! is_dir = false
//! template = { path = "py/README.md", render = true }
//!
//! [[plugins.pre]]
//! path = "check-tools.sh"
//!
//! [[plugins.post]]
//! path = "git-init.sh"
//! ```
//!
//! JSON files carry the same fields.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use kiln_core::{
    application::ApplicationError,
    domain::{DirEntry, DirTree, Package, Plugin, PluginSchedule, RelativePath, TemplateRef},
    error::{KilnError, KilnResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Toml,
    Json,
}

impl FileFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        ext.parse().ok()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported package format '{other}'")),
        }
    }
}

// ── File types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct PackageFile {
    label: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    dir_tree: DirTreeFile,
    #[serde(default)]
    plugins: PluginsFile,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirTreeFile {
    #[serde(default)]
    entries: Vec<EntryFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryFile {
    path: String,
    #[serde(default)]
    is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<TemplateFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TemplateFile {
    path: String,
    #[serde(default = "render_by_default")]
    render: bool,
}

fn render_by_default() -> bool {
    true
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PluginsFile {
    #[serde(default)]
    pre: Vec<PluginFile>,
    #[serde(default)]
    post: Vec<PluginFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PluginFile {
    path: String,
}

impl From<&Package> for PackageFile {
    fn from(package: &Package) -> Self {
        let plugins = |list: &[Plugin]| {
            list.iter()
                .map(|p| PluginFile {
                    path: p.path.to_string_lossy().into_owned(),
                })
                .collect()
        };

        Self {
            label: package.label.clone(),
            name: package.name.clone(),
            upstream_url: package.upstream_url.clone(),
            description: package.description.clone(),
            dir_tree: DirTreeFile {
                entries: package
                    .dir_tree
                    .iter()
                    .map(|e| EntryFile {
                        path: e.path.to_slash_string(),
                        is_dir: e.is_dir,
                        template: e.template.as_ref().map(|t| TemplateFile {
                            path: t.path.to_slash_string(),
                            render: t.render,
                        }),
                    })
                    .collect(),
            },
            plugins: PluginsFile {
                pre: plugins(&package.plugins.pre),
                post: plugins(&package.plugins.post),
            },
        }
    }
}

impl PackageFile {
    fn into_package(self) -> KilnResult<Package> {
        let mut tree = DirTree::new();
        for entry in self.dir_tree.entries {
            let template = entry
                .template
                .map(|t| -> KilnResult<TemplateRef> {
                    Ok(TemplateRef {
                        path: RelativePath::try_new(&t.path)?,
                        render: t.render,
                    })
                })
                .transpose()?;
            tree.push(DirEntry {
                path: RelativePath::try_new(&entry.path)?,
                is_dir: entry.is_dir,
                template,
            });
        }

        let plugins = PluginSchedule {
            pre: self.plugins.pre.into_iter().map(|p| Plugin::new(p.path)).collect(),
            post: self.plugins.post.into_iter().map(|p| Plugin::new(p.path)).collect(),
        };

        let mut builder = Package::builder()
            .label(self.label)
            .name(self.name)
            .dir_tree(tree)
            .plugins(plugins);
        if let Some(url) = self.upstream_url {
            builder = builder.upstream_url(url);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        Ok(builder.build()?)
    }
}

// ── Export / import ───────────────────────────────────────────────────────────

fn portability_error(path: &Path, reason: impl fmt::Display) -> KilnError {
    ApplicationError::Portability {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

/// Serialize a package in the given format.
pub fn to_string(package: &Package, format: FileFormat) -> Result<String, String> {
    let file = PackageFile::from(package);
    match format {
        FileFormat::Toml => toml::to_string_pretty(&file).map_err(|e| e.to_string()),
        FileFormat::Json => serde_json::to_string_pretty(&file).map_err(|e| e.to_string()),
    }
}

/// Parse a package from text in the given format. The result is validated.
pub fn from_str(text: &str, format: FileFormat) -> KilnResult<Package> {
    let file: PackageFile = match format {
        FileFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        FileFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
    }
    .map_err(|reason| portability_error(Path::new("<input>"), reason))?;
    file.into_package()
}

/// Write `package` to `<dir>/<label>.<ext>` and return that path.
///
/// `dir` must already exist.
#[instrument(skip(package), fields(label = %package.label))]
pub fn export(package: &Package, format: FileFormat, dir: &Path) -> KilnResult<PathBuf> {
    if !dir.is_dir() {
        return Err(portability_error(dir, "export directory does not exist"));
    }

    let path = dir.join(format!("{}.{}", package.label, format.extension()));
    let text = to_string(package, format).map_err(|reason| portability_error(&path, reason))?;
    fs::write(&path, text).map_err(|e| portability_error(&path, e))?;

    debug!(path = %path.display(), "Package exported");
    Ok(path)
}

/// Read a package file. The format follows the extension.
#[instrument]
pub fn import(path: &Path) -> KilnResult<Package> {
    let format = FileFormat::from_path(path)
        .ok_or_else(|| portability_error(path, "unknown file extension"))?;
    let text = fs::read_to_string(path).map_err(|e| portability_error(path, e))?;

    let package = match from_str(&text, format) {
        Err(KilnError::Application(ApplicationError::Portability { reason, .. })) => {
            return Err(portability_error(path, reason));
        }
        other => other?,
    };
    debug!(label = %package.label, "Package imported");
    Ok(package)
}
