//! Application layer for Kiln.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (MaterializeService, ProjectService, PackageService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! descriptor rules itself. Those live in `crate::domain`.

pub mod error;
pub mod ports;
pub mod services;

pub use services::{
    BatchReport, ConflictPolicy, MaterializeOutcome, MaterializeService, MaterializeSettings,
    PackageService, ProjectReport, ProjectService, RemoveSelection, ReplacePolicy, TreeReport,
};

pub use ports::{
    Filesystem, HookPayload, PackageLoader, PackageStore, ProjectRegistry, ScriptInvocation,
    ScriptOutcome, ScriptRunner,
};

pub use error::{ApplicationError, ExitInfo};
