// ============================================================================
// domain/error.rs - DESCRIPTOR AND VALIDATION ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (so batch reports can keep them)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Validation Errors (400-level equivalent)
    // ========================================================================
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Invalid package label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("Duplicate path in directory tree: {path}")]
    DuplicatePath { path: String },

    #[error("Absolute paths not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    #[error("Path escapes the project root: {path}")]
    PathEscapesRoot { path: String },

    #[error("Empty path in directory tree")]
    EmptyPath,

    #[error("Invalid template delimiters: {reason}")]
    InvalidDelimiters { reason: String },

    #[error("Invalid project name '{name}': {reason}")]
    InvalidProjectName { name: String, reason: String },

    // ========================================================================
    // Content Errors
    // ========================================================================
    #[error("Content is not valid UTF-8 text (first invalid byte at offset {offset})")]
    NotText { offset: usize },

    // ========================================================================
    // Constraint Violations
    // ========================================================================
    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidPackage(msg) => vec![
                "Check the package descriptor".into(),
                format!("Details: {}", msg),
            ],
            Self::InvalidLabel { .. } => vec![
                "Labels are short identifiers such as 'py' or 'rs-cli'".into(),
                "Use ASCII letters, digits, '-' and '_' only".into(),
            ],
            Self::PathEscapesRoot { path } | Self::AbsolutePathNotAllowed { path } => vec![
                format!("Entry '{}' must stay inside the project directory", path),
                "Use paths relative to the project root without '..' segments".into(),
            ],
            Self::DuplicatePath { path } => vec![
                format!("'{}' is listed more than once in the directory tree", path),
                "Remove the duplicate entry from the descriptor".into(),
            ],
            Self::InvalidDelimiters { .. } => vec![
                "Set template.start_tag and template.end_tag to distinct, non-empty strings".into(),
                "Defaults are '%{{' and '}}%'".into(),
            ],
            Self::NotText { .. } => vec![
                "Binary files cannot be rendered".into(),
                "Mark the template with render = false to copy it verbatim".into(),
            ],
            Self::InvalidProjectName { .. } => vec![
                "Project names become directory names".into(),
                "Avoid path separators and names starting with '.'".into(),
            ],
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotText { .. } => ErrorCategory::Content,
            Self::MissingRequiredField { .. } => ErrorCategory::Internal,
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Content,
    Internal,
}
