//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use kiln_adapters::FileFormat;

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "kiln",
    bin_name = "kiln",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Turn packages into projects",
    long_about = "Kiln materializes packages (directory layouts, templates and \
                  lifecycle plugins) into new projects and keeps track of them.",
    after_help = "EXAMPLES:\n\
        \x20 kiln package import ./python.toml\n\
        \x20 kiln create py api worker --no-replace\n\
        \x20 kiln ls\n\
        \x20 kiln package mimic gh:owner/repo@main --label starter\n\
        \x20 kiln completions bash > /usr/share/bash-completion/completions/kiln",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create projects from a package.
    #[command(
        visible_alias = "c",
        about = "Create one or more projects from a package",
        after_help = "EXAMPLES:\n\
            \x20 kiln create py my-service\n\
            \x20 kiln create py api worker cli --replace\n\
            \x20 kiln create rs tool --dir ~/code"
    )]
    Create(CreateArgs),

    /// List registered projects.
    #[command(visible_alias = "list", about = "List registered projects")]
    Ls,

    /// Forget projects. Files on disk are left alone.
    #[command(
        visible_alias = "remove",
        about = "Remove projects from the registry",
        after_help = "EXAMPLES:\n\
            \x20 kiln rm 3 4\n\
            \x20 kiln rm --all --force"
    )]
    Rm(RmArgs),

    /// Register an existing directory.
    #[command(
        about = "Register an existing directory as a project",
        after_help = "EXAMPLES:\n\
            \x20 kiln add py ./legacy-service"
    )]
    Add(AddArgs),

    /// Drop records whose directories are gone.
    #[command(about = "Remove records of projects that no longer exist on disk")]
    Clean,

    /// Manage stored packages.
    #[command(
        visible_alias = "pkg",
        about = "Manage packages",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 kiln package ls\n\
            \x20 kiln package import py.toml rs.json\n\
            \x20 kiln package export py --format json --dir /tmp\n\
            \x20 kiln package mimic ./existing-project --exclude '^(\\.git|target)(/|$)'"
    )]
    Package(PackageCommands),

    /// Initialise a Kiln configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 kiln init\n\
            \x20 kiln init --force"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 kiln completions bash > ~/.local/share/bash-completion/completions/kiln\n\
            \x20 kiln completions zsh  > ~/.zfunc/_kiln\n\
            \x20 kiln completions fish > ~/.config/fish/completions/kiln.fish"
    )]
    Completions(CompletionsArgs),
}

// ── create ────────────────────────────────────────────────────────────────────

/// Arguments for `kiln create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Package to materialize.
    #[arg(value_name = "LABEL", help = "Package label")]
    pub label: String,

    /// One project per name, created under `--dir`.
    #[arg(value_name = "NAME", required = true, num_args = 1.., help = "Project names")]
    pub names: Vec<String>,

    /// Parent directory of the new projects.
    #[arg(
        short = 'd',
        long = "dir",
        value_name = "DIR",
        help = "Destination directory (default: current directory)"
    )]
    pub dir: Option<PathBuf>,

    /// Re-create projects that are already registered.
    #[arg(long = "replace", conflicts_with = "no_replace", help = "Replace registered projects")]
    pub replace: bool,

    /// Skip projects that are already registered.
    #[arg(long = "no-replace", help = "Never replace registered projects")]
    pub no_replace: bool,

    /// Bypass the package cache.
    #[arg(long = "refresh", help = "Reload the package from the store")]
    pub refresh: bool,
}

// ── rm ────────────────────────────────────────────────────────────────────────

/// Arguments for `kiln rm`.
#[derive(Debug, Args)]
pub struct RmArgs {
    /// Registry ids as shown by `kiln ls`.
    #[arg(
        value_name = "ID",
        required_unless_present = "all",
        conflicts_with = "all",
        help = "Project ids"
    )]
    pub ids: Vec<String>,

    #[arg(short = 'a', long = "all", help = "Remove every project")]
    pub all: bool,

    #[arg(short = 'f', long = "force", help = "Do not ask for confirmation")]
    pub force: bool,
}

// ── add ───────────────────────────────────────────────────────────────────────

/// Arguments for `kiln add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(value_name = "LABEL", help = "Package the directory was made from")]
    pub label: String,

    #[arg(value_name = "PATH", help = "Existing project directory")]
    pub path: PathBuf,
}

// ── package ───────────────────────────────────────────────────────────────────

/// Subcommands for `kiln package`.
#[derive(Debug, Subcommand)]
pub enum PackageCommands {
    /// List stored packages.
    #[command(visible_alias = "list")]
    Ls,

    /// Print a package in full.
    Show {
        #[arg(value_name = "LABEL")]
        label: String,
    },

    /// Store packages from TOML/JSON files or repository file URLs.
    Import {
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        files: Vec<String>,
    },

    /// Write a package to `<DIR>/<LABEL>.<ext>`.
    Export(ExportArgs),

    /// Delete stored packages.
    #[command(visible_alias = "remove")]
    Rm {
        #[arg(value_name = "LABEL", required = true, num_args = 1..)]
        labels: Vec<String>,
    },

    /// Build and store packages from directories or repositories.
    Mimic(MimicArgs),
}

/// Arguments for `kiln package export`.
#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(value_name = "LABEL")]
    pub label: String,

    #[arg(
        short = 'f',
        long = "format",
        value_enum,
        default_value = "toml",
        help = "File format"
    )]
    pub format: ExportFormat,

    #[arg(
        short = 'd',
        long = "dir",
        value_name = "DIR",
        help = "Target directory (default: current directory)"
    )]
    pub dir: Option<PathBuf>,
}

/// Arguments for `kiln package mimic`.
#[derive(Debug, Args)]
pub struct MimicArgs {
    /// Local directories, repository URLs, or `gh:owner/repo[@branch]` /
    /// `gl:owner/repo[@branch]`.
    #[arg(value_name = "SOURCE", required = true, num_args = 1..)]
    pub sources: Vec<String>,

    #[arg(
        short = 'e',
        long = "exclude",
        value_name = "REGEX",
        help = "Skip paths matching this pattern (default from config)"
    )]
    pub exclude: Option<String>,

    #[arg(
        short = 'l',
        long = "label",
        value_name = "LABEL",
        help = "Label to store the package under (single source only)"
    )]
    pub label: Option<String>,
}

/// Package file formats accepted by `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Toml,
    Json,
}

impl From<ExportFormat> for FileFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Toml => FileFormat::Toml,
            ExportFormat::Json => FileFormat::Json,
        }
    }
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `kiln init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `kiln completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_create_with_many_names() {
        let cli = Cli::parse_from(["kiln", "create", "py", "api", "worker", "--no-replace"]);
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.label, "py");
                assert_eq!(args.names, vec!["api", "worker"]);
                assert!(args.no_replace);
                assert!(!args.replace);
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn create_needs_a_name() {
        assert!(Cli::try_parse_from(["kiln", "create", "py"]).is_err());
    }

    #[test]
    fn replace_flags_conflict() {
        let result =
            Cli::try_parse_from(["kiln", "create", "py", "api", "--replace", "--no-replace"]);
        assert!(result.is_err());
    }

    #[test]
    fn rm_takes_ids_or_all() {
        assert!(Cli::try_parse_from(["kiln", "rm"]).is_err());
        assert!(Cli::try_parse_from(["kiln", "rm", "1", "--all"]).is_err());

        let cli = Cli::parse_from(["kiln", "rm", "--all", "-f"]);
        assert!(matches!(cli.command, Commands::Rm(RmArgs { all: true, force: true, .. })));
    }

    #[test]
    fn package_export_defaults_to_toml() {
        let cli = Cli::parse_from(["kiln", "pkg", "export", "py"]);
        match cli.command {
            Commands::Package(PackageCommands::Export(args)) => {
                assert_eq!(args.format, ExportFormat::Toml);
                assert!(args.dir.is_none());
                assert_eq!(FileFormat::from(args.format), FileFormat::Toml);
            }
            other => panic!("expected package export, got {other:?}"),
        }
    }

    #[test]
    fn mimic_accepts_exclude_and_label() {
        let cli = Cli::parse_from([
            "kiln", "package", "mimic", "./dir", "--exclude", "^target", "--label", "starter",
        ]);
        match cli.command {
            Commands::Package(PackageCommands::Mimic(args)) => {
                assert_eq!(args.sources, vec!["./dir"]);
                assert_eq!(args.exclude.as_deref(), Some("^target"));
                assert_eq!(args.label.as_deref(), Some("starter"));
            }
            other => panic!("expected package mimic, got {other:?}"),
        }
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["kiln", "--quiet", "--verbose", "ls"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["kiln", "ls", "-vv", "--output-format", "json"]);
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.output_format, OutputFormat::Json);
    }
}
