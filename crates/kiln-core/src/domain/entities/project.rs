use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Registry-assigned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Lifecycle marker of a registered project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectStatus {
    /// Materialized into a path no other project held.
    Created,
    /// Materialized over a path whose previous record was removed.
    Replaced,
    /// An existing directory registered without materialization.
    Adopted,
}

impl ProjectStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Replaced => "replaced",
            Self::Adopted => "adopted",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "replaced" => Ok(Self::Replaced),
            "adopted" => Ok(Self::Adopted),
            other => Err(DomainError::InvalidPackage(format!(
                "unknown project status '{other}'"
            ))),
        }
    }
}

/// A concrete instantiation of a package at a filesystem path.
///
/// `path` is absolute and is the registry's uniqueness key. `id` stays `None`
/// until the registry stores the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: Option<ProjectId>,
    pub name: String,
    pub path: PathBuf,
    pub package_label: String,
    pub status: ProjectStatus,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        package_label: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            path: path.into(),
            package_label: package_label.into(),
            status: ProjectStatus::Created,
        }
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_id(mut self, id: ProjectId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({}) at {}", self.name, id, self.path.display()),
            None => write!(f, "{} at {}", self.name, self.path.display()),
        }
    }
}

/// Project names become a single directory under the destination root.
pub fn validate_project_name(name: &str) -> Result<(), DomainError> {
    let invalid = |reason: &str| DomainError::InvalidProjectName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("name cannot start with '.'"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name cannot contain path separators"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("name cannot contain control characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_has_no_id_and_created_status() {
        let project = Project::new("demo", "/work/demo", "py");
        assert_eq!(project.id, None);
        assert_eq!(project.status, ProjectStatus::Created);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ProjectStatus::Created,
            ProjectStatus::Replaced,
            ProjectStatus::Adopted,
        ] {
            assert_eq!(status.as_str().parse::<ProjectStatus>().unwrap(), status);
        }
        assert!("cleaned".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn project_id_parses_trimmed_numbers() {
        assert_eq!(" 42 ".parse::<ProjectId>().unwrap(), ProjectId(42));
        assert!("abc".parse::<ProjectId>().is_err());
    }

    #[test]
    fn project_name_rules() {
        assert!(validate_project_name("my-app").is_ok());
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name(".hidden").is_err());
        assert!(validate_project_name("a/b").is_err());
        assert!(validate_project_name("..").is_err());
    }
}
