use crate::domain::{
    entities::{Package, package::validate_label, project::validate_project_name},
    error::DomainError,
};

/// Centralized entry point for the checks services run before touching disk.
pub struct DomainValidator;

impl DomainValidator {
    pub fn validate_package(package: &Package) -> Result<(), DomainError> {
        package.validate()
    }

    pub fn validate_label(label: &str) -> Result<(), DomainError> {
        validate_label(label)
    }

    pub fn validate_project_name(name: &str) -> Result<(), DomainError> {
        validate_project_name(name)
    }

    /// All names of a batch, failing on the first bad one.
    pub fn validate_project_names<S: AsRef<str>>(names: &[S]) -> Result<(), DomainError> {
        names
            .iter()
            .try_for_each(|name| validate_project_name(name.as_ref()))
    }
}
