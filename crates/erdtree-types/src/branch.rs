//! Branch metadata types.
//!
//! A `Branch` is a labelled pointer to the head node of one conversation line.
//! Its head moves as messages are appended; everything else is fixed at
//! creation except the label.

use serde::{Deserialize, Serialize};

use crate::ids::{BranchId, NodeId};

/// Where a forked branch came from.
///
/// Provenance only: history resolution walks node parents and never needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkPoint {
    /// The branch the fork was taken from.
    pub branch_id: BranchId,
    /// The node the new branch started at.
    pub node_id: NodeId,
}

/// A named pointer into the node forest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    /// Human-friendly label ("main", "branch-2"). Mutable, not unique.
    pub label: String,
    /// Tip of this conversation line.
    pub head_id: NodeId,
    /// Set for forks; `None` for branches that started a conversation.
    pub fork_point: Option<ForkPoint>,
    /// Unix millis.
    pub created_at: u64,
}

impl Branch {
    /// Whether this branch was forked from another.
    pub fn is_fork(&self) -> bool {
        self.fork_point.is_some()
    }

    /// The branch this one was forked from, if any.
    pub fn parent_branch_id(&self) -> Option<BranchId> {
        self.fork_point.map(|f| f.branch_id)
    }

    /// The node this branch was forked at, if any.
    pub fn fork_point_id(&self) -> Option<NodeId> {
        self.fork_point.map(|f| f.node_id)
    }

    /// Display string: label if present, otherwise short hex ID.
    pub fn display_name(&self) -> String {
        if self.label.is_empty() {
            self.id.short()
        } else {
            self.label.clone()
        }
    }
}

/// Walk fork provenance from `start` back to the branch that began the
/// conversation (inclusive on both ends).
///
/// Stops early on a missing parent or a repeated id.
pub fn fork_lineage(branches: &[Branch], start: BranchId) -> Vec<&Branch> {
    let mut chain = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        match branches.iter().find(|b| b.id == id) {
            Some(branch) => {
                chain.push(branch);
                current = branch.parent_branch_id();
            }
            None => break,
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(label: &str, fork_point: Option<ForkPoint>) -> Branch {
        Branch {
            id: BranchId::new(),
            label: label.to_string(),
            head_id: NodeId::new(),
            fork_point,
            created_at: 0,
        }
    }

    #[test]
    fn test_fork_accessors() {
        let main = branch("main", None);
        assert!(!main.is_fork());
        assert_eq!(main.parent_branch_id(), None);

        let at = NodeId::new();
        let side = branch(
            "side",
            Some(ForkPoint {
                branch_id: main.id,
                node_id: at,
            }),
        );
        assert!(side.is_fork());
        assert_eq!(side.parent_branch_id(), Some(main.id));
        assert_eq!(side.fork_point_id(), Some(at));
    }

    #[test]
    fn test_display_name_falls_back_to_short_hex() {
        let b = branch("", None);
        assert_eq!(b.display_name(), b.id.short());
        assert_eq!(branch("main", None).display_name(), "main");
    }

    #[test]
    fn test_fork_lineage() {
        let main = branch("main", None);
        let child = branch(
            "child",
            Some(ForkPoint {
                branch_id: main.id,
                node_id: NodeId::new(),
            }),
        );
        let grandchild = branch(
            "grandchild",
            Some(ForkPoint {
                branch_id: child.id,
                node_id: NodeId::new(),
            }),
        );
        let all = vec![main.clone(), child.clone(), grandchild.clone()];

        let chain = fork_lineage(&all, grandchild.id);
        let labels: Vec<&str> = chain.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["grandchild", "child", "main"]);
    }

    #[test]
    fn test_fork_lineage_missing_parent() {
        let orphan = branch(
            "orphan",
            Some(ForkPoint {
                branch_id: BranchId::new(),
                node_id: NodeId::new(),
            }),
        );
        let all = vec![orphan.clone()];
        assert_eq!(fork_lineage(&all, orphan.id).len(), 1);
    }
}
