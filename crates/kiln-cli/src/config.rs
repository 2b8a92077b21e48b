//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only sees the
//! [`MaterializeSettings`] built from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables: `KILN_` prefix, `__` between sections,
//!    e.g. `KILN_PATHS__DATABASE=/tmp/kiln.db`
//! 3. Config file: `--config FILE`, else `<config dir>/kiln/config.toml`
//! 4. Built-in defaults (always present)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use kiln_adapters::mimic::{DEFAULT_EXCLUDE, MimicOptions, RemoteTokens};
use kiln_core::{
    application::{MaterializeSettings, services::DEFAULT_PLUGIN_TIMEOUT},
    domain::Delimiters,
    error::KilnResult,
};

const ENV_PREFIX: &str = "KILN";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the registry, templates and plugins live.
    pub paths: PathsConfig,
    /// Placeholder delimiters and user variables.
    pub template: TemplateConfig,
    pub plugins: PluginsConfig,
    /// Settings for `package mimic`.
    pub import: ImportConfig,
    pub output: OutputConfig,
    /// Tokens for remote repositories.
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub database: PathBuf,
    pub templates: PathBuf,
    pub plugins: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub start_tag: String,
    pub end_tag: String,
    /// Extra substitutions; they win over the built-in keys.
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Per-script limit; `0` means the built-in default.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Regex matched against forward-slash relative paths.
    pub exclude: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab_token: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = AppConfig::data_dir();
        Self {
            database: data.join("kiln.db"),
            templates: data.join("templates"),
            plugins: data.join("plugins"),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        let delimiters = Delimiters::default();
        Self {
            start_tag: delimiters.start().to_string(),
            end_tag: delimiters.end().to_string(),
            variables: BTreeMap::new(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_PLUGIN_TIMEOUT.as_secs(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            exclude: DEFAULT_EXCLUDE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the file, then `KILN_*` variables.
    ///
    /// An explicit `config_file` must exist; the default location may not.
    pub fn load(config_file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let (path, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        debug!(path = %path.display(), required, "Loading configuration");

        config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.kiln.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "kiln", "kiln")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".kiln.toml"))
    }

    /// Default home of the registry database, templates and plugins.
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("dev", "kiln", "kiln")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".kiln"))
    }

    pub fn delimiters(&self) -> KilnResult<Delimiters> {
        Ok(Delimiters::new(
            self.template.start_tag.as_str(),
            self.template.end_tag.as_str(),
        )?)
    }

    pub fn plugin_timeout(&self) -> Duration {
        match self.plugins.timeout_secs {
            0 => DEFAULT_PLUGIN_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Everything the materializer needs, validated.
    pub fn materialize_settings(&self) -> KilnResult<MaterializeSettings> {
        let mut settings = MaterializeSettings::new(&self.paths.templates, &self.paths.plugins);
        settings.delimiters = self.delimiters()?;
        settings.variables = self.template.variables.clone();
        settings.plugin_timeout = self.plugin_timeout();
        Ok(settings)
    }

    /// Mimic options with the configured exclude unless `exclude` overrides it.
    pub fn mimic_options(&self, exclude: Option<&str>) -> KilnResult<MimicOptions> {
        MimicOptions::new(exclude.unwrap_or(&self.import.exclude))
    }

    pub fn remote_tokens(&self) -> RemoteTokens {
        RemoteTokens {
            github: self.auth.github_token.clone(),
            gitlab: self.auth.gitlab_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_use_standard_delimiters() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.template.start_tag, "%{{");
        assert_eq!(cfg.template.end_tag, "}}%");
        assert_eq!(cfg.plugin_timeout(), DEFAULT_PLUGIN_TIMEOUT);
        assert!(!cfg.output.no_color);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[paths]
database = "/tmp/elsewhere.db"

[template]
start_tag = "<<"
end_tag = ">>"

[template.variables]
author = "Ada"

[plugins]
timeout_secs = 5
"#,
        )
        .unwrap();

        let cfg = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(cfg.paths.database, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(cfg.paths.templates, PathsConfig::default().templates);
        assert_eq!(cfg.delimiters().unwrap().start(), "<<");
        assert_eq!(cfg.template.variables["author"], "Ada");
        assert_eq!(cfg.plugin_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(AppConfig::load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.template.start_tag, "%{{");
        assert_eq!(back.import.exclude, DEFAULT_EXCLUDE);
        assert!(back.auth.github_token.is_none());
    }

    #[test]
    fn equal_tags_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.template.end_tag = cfg.template.start_tag.clone();
        assert!(cfg.materialize_settings().is_err());
    }

    #[test]
    fn zero_timeout_means_default() {
        let mut cfg = AppConfig::default();
        cfg.plugins.timeout_secs = 0;
        assert_eq!(cfg.plugin_timeout(), DEFAULT_PLUGIN_TIMEOUT);
    }

    #[test]
    fn bad_exclude_pattern_is_rejected() {
        assert!(AppConfig::default().mimic_options(Some("(")).is_err());
    }
}
