pub mod common;
pub mod package;
pub mod project;
pub mod template;

pub use crate::domain::DomainError;
pub use common::RelativePath;
pub use package::{Package, PackageBuilder};
pub use project::{Project, ProjectId, ProjectStatus};
pub use template::{Delimiters, RenderContext, TemplateRenderer};
