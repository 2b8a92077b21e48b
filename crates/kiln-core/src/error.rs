//! Unified error handling for Kiln Core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for Kiln Core operations.
#[derive(Debug, Error, Clone)]
pub enum KilnError {
    /// Errors from the domain layer (descriptor and name validation).
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Errors from the application layer (orchestration failures).
    #[error("{0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl KilnError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Run: kiln init to write a default configuration".into(),
            ],
            Self::Internal { .. } => vec!["This appears to be a bug in Kiln".into()],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation | crate::domain::ErrorCategory::Content => {
                    ErrorCategory::Validation
                }
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Application(ApplicationError::StoreLockError))
    }

    /// True for `ProjectExists`, also when wrapped by a tree entry failure.
    pub fn is_project_exists(&self) -> bool {
        match self {
            Self::Application(ApplicationError::ProjectExists { .. }) => true,
            Self::Application(ApplicationError::EntryFailed { source, .. }) => {
                source.is_project_exists()
            }
            _ => false,
        }
    }
}

/// Error categories for UI display and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    External,
    Configuration,
    Internal,
}

/// Convenient result type alias.
pub type KilnResult<T> = Result<T, KilnError>;

/// Extension trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> KilnResult<T>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> KilnResult<T> {
        self.map_err(|e| KilnError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_content_errors_display_as_validation() {
        let err: KilnError = DomainError::NotText { offset: 4 }.into();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn project_exists_is_detected() {
        let err: KilnError = ApplicationError::ProjectExists {
            path: "/w/demo".into(),
        }
        .into();
        assert!(err.is_project_exists());
        assert_eq!(err.category(), ErrorCategory::Conflict);

        let other: KilnError = ApplicationError::StoreLockError.into();
        assert!(!other.is_project_exists());
        assert!(other.is_retryable());
    }

    #[test]
    fn context_wraps_foreign_errors() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::other("disk on fire"));
        let err = result.context("reading config").unwrap_err();
        assert_eq!(err.to_string(), "Internal error: reading config: disk on fire");
    }
}
