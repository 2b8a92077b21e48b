//! Project registry and package store adapters.

mod memory;
mod sqlite;

pub use memory::{InMemoryPackageStore, InMemoryRegistry};
pub use sqlite::SqliteRegistry;
