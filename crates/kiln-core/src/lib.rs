//! Kiln Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for Kiln, which
//! turns package descriptors into projects on disk and tracks them.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             kiln-cli (CLI)              │
//! │       (Implements Driving Ports)        │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │          Application Services           │
//! │  (ProjectService, MaterializeService,   │
//! │   PackageService)                       │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │       Application Ports (Traits)        │
//! │ (Filesystem, ScriptRunner, Registry...) │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     kiln-adapters (Infrastructure)      │
//! │  (LocalFilesystem, SqliteRegistry, ...) │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        Domain Layer (Pure Logic)        │
//! │  (Package, Project, TemplateRenderer)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiln_core::prelude::*;
//!
//! let materializer = MaterializeService::new(registry.clone(), fs.clone(), runner, settings);
//! let projects = ProjectService::new(registry, loader, fs, materializer);
//!
//! let report = projects.create_projects("py", &names, &cwd, &ReplacePolicy::Abort)?;
//! for result in report.failed() {
//!     eprintln!("{}: {}", result.name, result.outcome);
//! }
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        ApplicationError, BatchReport, ConflictPolicy, MaterializeOutcome, MaterializeService,
        MaterializeSettings, PackageService, ProjectReport, ProjectService, RemoveSelection,
        ReplacePolicy,
        ports::{Filesystem, PackageLoader, PackageStore, ProjectRegistry, ScriptRunner},
    };
    pub use crate::domain::{
        Delimiters, DirEntry, DirTree, Package, Phase, Plugin, PluginSchedule, Project, ProjectId,
        ProjectStatus, RelativePath, RenderContext, TemplateRef, TemplateRenderer,
    };
    pub use crate::error::{KilnError, KilnResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
