//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `kiln-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Filesystem`: File operations
//!   - `ScriptRunner`: Lifecycle script processes
//!   - `ProjectRegistry`: Persistent project records
//!   - `PackageStore` / `PackageLoader`: Package storage and retrieval
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{
    Filesystem, HOOK_CONTRACT_VERSION, HookPackage, HookPayload, HookProject, PackageLoader,
    PackageStore, ProjectRegistry, ScriptInvocation, ScriptOutcome, ScriptRunner,
};

#[cfg(test)]
pub use output::{
    MockFilesystem, MockPackageLoader, MockPackageStore, MockProjectRegistry, MockScriptRunner,
};
