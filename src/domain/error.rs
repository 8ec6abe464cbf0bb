//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent invalid tree addressing or impossible structural edits.
/// These are independent of drag state, configuration or I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("no node found at path {path}: {reason}")]
    PathResolution { path: String, reason: String },

    #[error("children of node at path {path} are not loaded yet")]
    LazyChildrenNotLoaded { path: String },

    #[error("no suitable position to insert at depth {depth} from tree index {minimum_tree_index}")]
    NoInsertPosition {
        depth: usize,
        minimum_tree_index: usize,
    },

    #[error("parent node not found: {key}")]
    ParentNotFound { key: String },
}

impl DomainError {
    pub(crate) fn path_resolution(path: &[super::NodeKey], reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: super::format_path(path),
            reason: reason.into(),
        }
    }

    pub(crate) fn lazy_children(path: &[super::NodeKey]) -> Self {
        Self::LazyChildrenNotLoaded {
            path: super::format_path(path),
        }
    }

    /// Whether the caller can recover by loading lazy children and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LazyChildrenNotLoaded { .. })
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodeKey;

    #[test]
    fn given_unloaded_lazy_children_when_checking_then_retryable() {
        let path = [NodeKey::Index(0)];
        assert!(DomainError::lazy_children(&path).is_retryable());
        assert!(!DomainError::path_resolution(&path, "gone").is_retryable());
    }
}
