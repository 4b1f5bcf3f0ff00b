//! Computed forest view over the node store.
//!
//! A `ConversationTree` is an ephemeral snapshot: built from the store and
//! branch list at one moment, then traversed without touching either.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use erdtree_types::{Branch, BranchId, Node, NodeId};

use crate::node_store::NodeStore;

/// Forest of every stored node, with branch heads attached.
#[derive(Debug, Clone, Default)]
pub struct ConversationTree {
    /// Nodes without a parent, oldest first.
    pub roots: Vec<NodeId>,
    /// Children by parent, oldest first.
    pub children: HashMap<NodeId, Vec<NodeId>>,
    pub nodes: HashMap<NodeId, Arc<Node>>,
    /// Branches whose head is the key.
    pub heads: HashMap<NodeId, Vec<BranchId>>,
}

impl ConversationTree {
    /// Snapshot `store`, attaching the heads of `branches`.
    pub fn build(store: &NodeStore, branches: &[Branch]) -> Self {
        let mut tree = Self::default();

        // Sequence order puts every parent before its children.
        for node in store.all_ordered() {
            match node.parent_id {
                Some(parent) => tree.children.entry(parent).or_default().push(node.id),
                None => tree.roots.push(node.id),
            }
            tree.nodes.insert(node.id, node);
        }

        for branch in branches {
            tree.heads.entry(branch.head_id).or_default().push(branch.id);
        }

        tree
    }

    pub fn get(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.nodes.get(&id)
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Branches pointing at `id`.
    pub fn branches_at(&self, id: NodeId) -> &[BranchId] {
        self.heads.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Ancestor count (0 for roots, and for unknown ids).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            if depth > self.nodes.len() {
                tracing::warn!(node = %id, "depth walk exceeded tree size");
                break;
            }
            depth += 1;
            current = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        depth
    }

    /// Pre-order walk of the whole forest as `(depth, node)` pairs.
    pub fn iter_dfs(&self) -> impl Iterator<Item = (usize, &Arc<Node>)> {
        Dfs::new(self, self.roots.iter().rev().map(|id| (0, *id)).collect())
    }

    /// `root` and everything below it, pre-order.
    pub fn subtree(&self, root: NodeId) -> Vec<&Arc<Node>> {
        Dfs::new(self, vec![(0, root)]).map(|(_, node)| node).collect()
    }

    /// Nodes without children, oldest first.
    pub fn leaves(&self) -> Vec<&Arc<Node>> {
        let mut leaves: Vec<&Arc<Node>> = self
            .nodes
            .values()
            .filter(|n| !self.children.contains_key(&n.id))
            .collect();
        leaves.sort_by_key(|n| n.seq);
        leaves
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Stack-driven pre-order iterator. Skips ids it has already yielded.
struct Dfs<'a> {
    tree: &'a ConversationTree,
    stack: Vec<(usize, NodeId)>,
    visited: HashSet<NodeId>,
}

impl<'a> Dfs<'a> {
    fn new(tree: &'a ConversationTree, stack: Vec<(usize, NodeId)>) -> Self {
        Self {
            tree,
            stack,
            visited: HashSet::new(),
        }
    }
}

impl<'a> Iterator for Dfs<'a> {
    type Item = (usize, &'a Arc<Node>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((depth, id)) = self.stack.pop() {
            if !self.visited.insert(id) {
                continue;
            }
            let Some(node) = self.tree.nodes.get(&id) else {
                continue;
            };
            for child in self.tree.children_of(id).iter().rev() {
                self.stack.push((depth + 1, *child));
            }
            return Some((depth, node));
        }
        None
    }
}
