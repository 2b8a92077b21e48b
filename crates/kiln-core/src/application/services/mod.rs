//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "create these projects from a package".

pub mod conflict;
pub mod materialize_service;
pub mod package_service;
pub mod plugin_scheduler;
pub mod project_service;
pub mod tree_builder;

pub use conflict::{
    ConflictPolicy, ConflictResolver, ConflictState, MaterializeOutcome, ReplacePolicy, Resolution,
};
pub use materialize_service::{Materialization, MaterializeService, MaterializeSettings};
pub use package_service::PackageService;
pub use plugin_scheduler::{DEFAULT_PLUGIN_TIMEOUT, PluginScheduler};
pub use project_service::{BatchReport, ProjectReport, ProjectService, RemoveSelection};
pub use tree_builder::{EntryChange, TreeBuilder, TreeReport};
