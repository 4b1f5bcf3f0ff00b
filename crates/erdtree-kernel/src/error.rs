//! Error types for version-tree operations.

use thiserror::Error;

use erdtree_types::{BranchId, ContentError, NodeId};

/// Errors that can occur in the node store, branch index, or controller.
#[derive(Error, Debug)]
pub enum ErdError {
    /// Referenced node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Referenced branch does not exist.
    #[error("branch not found: {0}")]
    BranchNotFound(BranchId),

    /// Head advance to something other than a direct child of the current head.
    ///
    /// Internal signal: the controller retries on it and never surfaces it
    /// from an append.
    #[error(
        "branch {branch} cannot advance: head is {expected_parent}, new node continues {actual_parent:?}"
    )]
    InvalidTransition {
        branch: BranchId,
        expected_parent: NodeId,
        actual_parent: Option<NodeId>,
    },

    /// Append retry budget exhausted under contention.
    #[error("branch {branch} kept moving; gave up after {attempts} attempts")]
    Conflict { branch: BranchId, attempts: u32 },

    /// Fork target is not in the source branch's history.
    #[error("node {node} is not in the history of branch {branch}")]
    InvalidFork { branch: BranchId, node: NodeId },

    /// Content rejected at the boundary.
    #[error("invalid content: {0}")]
    InvalidContent(#[from] ContentError),

    /// Parent walk exceeded the number of stored nodes.
    #[error("history walk from {node} exceeded {steps} steps; store is corrupt")]
    CorruptHistory { node: NodeId, steps: usize },

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl ErdError {
    /// Either flavor of not-found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErdError::NodeNotFound(_) | ErdError::BranchNotFound(_))
    }

    /// Whether the caller sent something wrong (as opposed to a server fault).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErdError::NodeNotFound(_)
                | ErdError::BranchNotFound(_)
                | ErdError::Conflict { .. }
                | ErdError::InvalidFork { .. }
                | ErdError::InvalidContent(_)
        )
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErdError::Conflict { .. })
    }

    /// HTTP status code for the external request layer.
    pub fn status_code(&self) -> u16 {
        match self {
            ErdError::NodeNotFound(_) | ErdError::BranchNotFound(_) => 404,
            ErdError::InvalidFork { .. } | ErdError::InvalidContent(_) => 400,
            ErdError::Conflict { .. } => 409,
            ErdError::InvalidTransition { .. }
            | ErdError::CorruptHistory { .. }
            | ErdError::Storage(_)
            | ErdError::Config(_) => 500,
        }
    }

    /// Stable snake_case tag for wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ErdError::NodeNotFound(_) => "node_not_found",
            ErdError::BranchNotFound(_) => "branch_not_found",
            ErdError::InvalidTransition { .. } => "invalid_transition",
            ErdError::Conflict { .. } => "conflict",
            ErdError::InvalidFork { .. } => "invalid_fork",
            ErdError::InvalidContent(_) => "invalid_content",
            ErdError::CorruptHistory { .. } => "corrupt_history",
            ErdError::Storage(_) => "storage",
            ErdError::Config(_) => "config",
        }
    }
}

/// Result type for version-tree operations.
pub type Result<T> = std::result::Result<T, ErdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let nf = ErdError::NodeNotFound(NodeId::new());
        assert!(nf.is_not_found());
        assert!(nf.is_client_error());
        assert!(!nf.is_retryable());
        assert_eq!(nf.status_code(), 404);

        let conflict = ErdError::Conflict {
            branch: BranchId::new(),
            attempts: 8,
        };
        assert!(conflict.is_retryable());
        assert!(conflict.is_client_error());
        assert_eq!(conflict.status_code(), 409);
        assert_eq!(conflict.kind(), "conflict");

        let fork = ErdError::InvalidFork {
            branch: BranchId::new(),
            node: NodeId::new(),
        };
        assert_eq!(fork.status_code(), 400);
        assert!(!fork.is_not_found());
    }

    #[test]
    fn test_internal_errors_are_server_faults() {
        let transition = ErdError::InvalidTransition {
            branch: BranchId::new(),
            expected_parent: NodeId::new(),
            actual_parent: None,
        };
        assert!(!transition.is_client_error());
        assert_eq!(transition.status_code(), 500);
    }

    #[test]
    fn test_content_error_converts() {
        let err: ErdError = ContentError::TooLarge { len: 10, limit: 5 }.into();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("limit is 5"));
    }
}
