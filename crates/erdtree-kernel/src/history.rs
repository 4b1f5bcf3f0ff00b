//! Branch history reconstruction.
//!
//! A branch's history is the parent chain of its head, oldest first. The
//! resolver only reads; it never takes a lock longer than a map lookup.

use std::sync::Arc;

use erdtree_types::{BranchId, Node, NodeId};

use crate::branch_index::BranchIndex;
use crate::error::{ErdError, Result};
use crate::node_store::NodeStore;

/// Read-only view over the node store and branch index.
#[derive(Clone)]
pub struct HistoryResolver {
    nodes: Arc<NodeStore>,
    branches: Arc<BranchIndex>,
}

impl HistoryResolver {
    pub fn new(nodes: Arc<NodeStore>, branches: Arc<BranchIndex>) -> Self {
        Self { nodes, branches }
    }

    /// Messages of `branch`, root first, head last.
    pub fn resolve(&self, branch: BranchId) -> Result<Vec<Arc<Node>>> {
        let head = self.branches.head(branch)?;
        self.path_to(head)
    }

    /// Root-to-node chain for any node.
    pub fn path_to(&self, node: NodeId) -> Result<Vec<Arc<Node>>> {
        let mut chain = Vec::new();
        self.walk(node, |n| {
            chain.push(n);
            false
        })?;
        chain.reverse();
        Ok(chain)
    }

    /// Number of ancestors of `node` (0 for a root).
    pub fn depth(&self, node: NodeId) -> Result<usize> {
        let mut seen = 0usize;
        self.walk(node, |_| {
            seen += 1;
            false
        })?;
        Ok(seen - 1)
    }

    /// Whether `ancestor` lies on the parent chain of `descendant`
    /// (a node counts as its own ancestor).
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, descendant: NodeId) -> Result<bool> {
        self.walk(descendant, |n| n.id == ancestor)
    }

    /// Visit `start` and each ancestor until `visit` returns true or a root
    /// is reached. Returns whether `visit` stopped the walk.
    ///
    /// Bounded by the store size: a valid chain can never be longer, so a
    /// longer one means a parent cycle in damaged storage.
    fn walk(&self, start: NodeId, mut visit: impl FnMut(Arc<Node>) -> bool) -> Result<bool> {
        let first = self.nodes.get(start)?;
        let limit = self.nodes.len();
        let mut steps = 0usize;
        let mut current = Some(first);

        while let Some(node) = current {
            steps += 1;
            if steps > limit {
                tracing::warn!(node = %start, steps, "history walk exceeded store size");
                return Err(ErdError::CorruptHistory { node: start, steps });
            }
            let parent = node.parent_id;
            if visit(node) {
                return Ok(true);
            }
            current = match parent {
                Some(id) => Some(self.nodes.get(id)?),
                None => None,
            };
        }
        Ok(false)
    }
}
