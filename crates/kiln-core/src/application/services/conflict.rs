//! Conflict resolution for a target path, driven by the project registry.
//!
//! ```text
//!   inspect(path)
//!      ├── Fresh ─────────────────────────────► materialize ──► Created
//!      └── Occupied(existing)
//!             ├── policy Abort ──► ProjectExists ─────────────► Aborted
//!             └── policy Replace ─► remove record ─► materialize ► Replaced
//! ```
//!
//! Replacing only drops the registry record. Files already on disk stay and
//! are written over by the new tree.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    application::{ApplicationError, ports::ProjectRegistry},
    domain::Project,
    error::KilnResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictState {
    Fresh,
    Occupied(Project),
}

/// What to do when the target path is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplacePolicy {
    #[default]
    Abort,
    Replace,
}

/// Decides per occupied path, e.g. by asking the user.
pub trait ConflictPolicy {
    fn decide(&self, existing: &Project) -> ReplacePolicy;
}

impl ConflictPolicy for ReplacePolicy {
    fn decide(&self, _existing: &Project) -> ReplacePolicy {
        *self
    }
}

impl<F> ConflictPolicy for F
where
    F: Fn(&Project) -> ReplacePolicy,
{
    fn decide(&self, existing: &Project) -> ReplacePolicy {
        self(existing)
    }
}

/// Result of applying a policy to a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing registered; go ahead.
    Proceed,
    /// The old record was removed; go ahead as if fresh.
    Replaced(Project),
    /// Leave everything as it is.
    Aborted(Project),
}

/// Terminal state of one materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Created,
    Replaced,
    Aborted,
    Failed(String),
}

impl MaterializeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::Replaced)
    }
}

impl fmt::Display for MaterializeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Replaced => f.write_str("replaced"),
            Self::Aborted => f.write_str("aborted"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

pub struct ConflictResolver {
    registry: Arc<dyn ProjectRegistry>,
}

impl ConflictResolver {
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self { registry }
    }

    pub fn inspect(&self, path: &Path) -> KilnResult<ConflictState> {
        let state = match self.registry.find_by_path(path)? {
            Some(existing) => ConflictState::Occupied(existing),
            None => ConflictState::Fresh,
        };
        debug!(path = %path.display(), fresh = matches!(state, ConflictState::Fresh), "Conflict state");
        Ok(state)
    }

    /// Apply `policy`. Replacing deletes the registry record right away, so
    /// the path is free again before anything new is stored.
    pub fn resolve(
        &self,
        state: ConflictState,
        policy: &dyn ConflictPolicy,
    ) -> KilnResult<Resolution> {
        let existing = match state {
            ConflictState::Fresh => return Ok(Resolution::Proceed),
            ConflictState::Occupied(existing) => existing,
        };

        match policy.decide(&existing) {
            ReplacePolicy::Abort => Ok(Resolution::Aborted(existing)),
            ReplacePolicy::Replace => {
                let removed = self.registry.remove_by_path(&existing.path)?;
                info!(path = %existing.path.display(), removed, "Replacing registered project");
                Ok(Resolution::Replaced(existing))
            }
        }
    }

    /// `inspect` then `resolve`, failing with `ProjectExists` on abort.
    pub fn clear(&self, path: &Path, policy: &dyn ConflictPolicy) -> KilnResult<Option<Project>> {
        match self.resolve(self.inspect(path)?, policy)? {
            Resolution::Proceed => Ok(None),
            Resolution::Replaced(previous) => Ok(Some(previous)),
            Resolution::Aborted(_) => Err(ApplicationError::ProjectExists {
                path: path.to_path_buf(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockProjectRegistry;
    use crate::domain::ProjectId;

    fn existing() -> Project {
        Project::new("demo", "/w/demo", "py").with_id(ProjectId(7))
    }

    #[test]
    fn unregistered_path_is_fresh() {
        let mut registry = MockProjectRegistry::new();
        registry.expect_find_by_path().returning(|_| Ok(None));
        registry.expect_remove_by_path().never();

        let resolver = ConflictResolver::new(Arc::new(registry));
        assert_eq!(
            resolver.clear(Path::new("/w/demo"), &ReplacePolicy::Abort).unwrap(),
            None
        );
    }

    #[test]
    fn occupied_path_aborts_by_default() {
        let mut registry = MockProjectRegistry::new();
        registry
            .expect_find_by_path()
            .returning(|_| Ok(Some(existing())));
        registry.expect_remove_by_path().never();

        let resolver = ConflictResolver::new(Arc::new(registry));
        let err = resolver
            .clear(Path::new("/w/demo"), &ReplacePolicy::default())
            .unwrap_err();
        assert!(err.is_project_exists());
    }

    #[test]
    fn replace_removes_the_record() {
        let mut registry = MockProjectRegistry::new();
        registry
            .expect_find_by_path()
            .returning(|_| Ok(Some(existing())));
        registry
            .expect_remove_by_path()
            .withf(|path| path == Path::new("/w/demo"))
            .times(1)
            .returning(|_| Ok(true));

        let resolver = ConflictResolver::new(Arc::new(registry));
        let previous = resolver
            .clear(Path::new("/w/demo"), &ReplacePolicy::Replace)
            .unwrap();
        assert_eq!(previous, Some(existing()));
    }

    #[test]
    fn closures_can_decide() {
        let mut registry = MockProjectRegistry::new();
        registry
            .expect_remove_by_path()
            .withf(|path| path == Path::new("/w/scratch"))
            .times(1)
            .returning(|_| Ok(true));
        let resolver = ConflictResolver::new(Arc::new(registry));
        let ask = |p: &Project| {
            if p.name == "keep" {
                ReplacePolicy::Abort
            } else {
                ReplacePolicy::Replace
            }
        };

        let keep = ConflictState::Occupied(Project::new("keep", "/w/keep", "py"));
        assert!(matches!(
            resolver.resolve(keep, &ask).unwrap(),
            Resolution::Aborted(_)
        ));

        let scratch = ConflictState::Occupied(Project::new("scratch", "/w/scratch", "py"));
        assert!(matches!(
            resolver.resolve(scratch, &ask).unwrap(),
            Resolution::Replaced(_)
        ));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(MaterializeOutcome::Created.to_string(), "created");
        assert_eq!(
            MaterializeOutcome::Failed("boom".into()).to_string(),
            "failed: boom"
        );
        assert!(MaterializeOutcome::Replaced.is_success());
        assert!(!MaterializeOutcome::Aborted.is_success());
    }
}
