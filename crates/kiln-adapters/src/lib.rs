//! Infrastructure adapters for Kiln.
//!
//! This crate implements the ports defined in `kiln_core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod filesystem;
pub mod loader;
pub mod mimic;
pub mod portability;
pub mod registry;
pub mod script_runner;

// Re-export commonly used adapters
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use loader::CachedPackageLoader;
pub use portability::FileFormat;
pub use registry::{InMemoryPackageStore, InMemoryRegistry, SqliteRegistry};
pub use script_runner::ProcessScriptRunner;
