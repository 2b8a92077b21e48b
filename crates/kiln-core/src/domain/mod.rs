// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for Kiln.
//!
//! Packages, projects and the template renderer. Everything here is pure:
//! filesystem, process and registry access go through the ports defined in
//! the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No I/O**: No filesystem, network, or external calls
//! - **Validated on construction**: a built `Package` only holds safe paths
//! - **Immutable entities**: All domain objects are Clone + PartialEq
pub mod entities;
pub mod error;

mod validation;

pub use entities::{
    common::RelativePath,
    package::{
        DirEntry, DirTree, Package, PackageBuilder, PackageSummary, Phase, Plugin,
        MAX_LABEL_LEN, PluginSchedule, TemplateRef, validate_label,
    },
    project::{Project, ProjectId, ProjectStatus, validate_project_name},
    template::{
        DEFAULT_END_TAG, DEFAULT_START_TAG, Delimiters, RenderContext, TemplateRenderer,
        to_kebab_case, to_pascal_case, to_snake_case,
    },
};

pub use error::{DomainError, ErrorCategory};
pub use validation::DomainValidator;
