//! Branch head pointers.
//!
//! Each branch is one DashMap entry. `advance` holds that entry's lock for
//! the whole check-then-swap, which makes it a compare-and-swap keyed by
//! branch id: two appends racing on one branch serialize, appends on
//! different branches do not touch each other.

use std::sync::Arc;

use dashmap::DashMap;

use erdtree_types::{Branch, BranchId, ForkPoint, NodeId, now_millis};

use crate::error::{ErdError, Result};
use crate::node_store::{NodeStore, SharedDb};

/// Mutable mapping from branch id to head node.
pub struct BranchIndex {
    branches: DashMap<BranchId, Branch>,
    nodes: Arc<NodeStore>,
    db: Option<SharedDb>,
}

impl BranchIndex {
    /// Create an empty in-memory index over `nodes`.
    pub fn new(nodes: Arc<NodeStore>) -> Self {
        Self {
            branches: DashMap::new(),
            nodes,
            db: None,
        }
    }

    /// Open an index backed by `db`, reloading every persisted branch.
    pub fn open(db: SharedDb, nodes: Arc<NodeStore>) -> Result<Self> {
        let loaded = db.lock().load_branches()?;
        let branches = DashMap::with_capacity(loaded.len());
        for branch in loaded {
            if !nodes.contains(branch.head_id) {
                return Err(ErdError::NodeNotFound(branch.head_id));
            }
            branches.insert(branch.id, branch);
        }
        tracing::info!(branches = branches.len(), "branch index reloaded");
        Ok(Self {
            branches,
            nodes,
            db: Some(db),
        })
    }

    /// Create a branch pointing at an existing node.
    pub fn create_branch(
        &self,
        head_id: NodeId,
        fork_point: Option<ForkPoint>,
        label: impl Into<String>,
    ) -> Result<Branch> {
        if !self.nodes.contains(head_id) {
            return Err(ErdError::NodeNotFound(head_id));
        }

        let branch = Branch {
            id: BranchId::new(),
            label: label.into(),
            head_id,
            fork_point,
            created_at: now_millis(),
        };

        if let Some(db) = &self.db {
            db.lock().insert_branch(&branch)?;
        }

        self.branches.insert(branch.id, branch.clone());
        tracing::debug!(branch = %branch.id, head = %head_id, label = %branch.label, "branch created");
        Ok(branch)
    }

    /// Get a branch by id.
    pub fn get_branch(&self, id: BranchId) -> Result<Branch> {
        self.branches
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(ErdError::BranchNotFound(id))
    }

    /// Current head of a branch.
    pub fn head(&self, id: BranchId) -> Result<NodeId> {
        self.branches
            .get(&id)
            .map(|r| r.value().head_id)
            .ok_or(ErdError::BranchNotFound(id))
    }

    /// Move the head of `id` to `new_head`, which must be a direct child of
    /// the current head.
    ///
    /// Fails with `InvalidTransition` otherwise; nothing changes in that case.
    pub fn advance(&self, id: BranchId, new_head: NodeId) -> Result<()> {
        let node = self.nodes.get(new_head)?;
        let mut entry = self.branches.get_mut(&id).ok_or(ErdError::BranchNotFound(id))?;
        let current = entry.head_id;

        let stale = || ErdError::InvalidTransition {
            branch: id,
            expected_parent: current,
            actual_parent: node.parent_id,
        };

        if !node.continues(current) {
            return Err(stale());
        }

        if let Some(db) = &self.db {
            if !db.lock().update_head(id, current, new_head)? {
                return Err(stale());
            }
        }

        entry.head_id = new_head;
        tracing::debug!(branch = %id, from = %current, to = %new_head, "head advanced");
        Ok(())
    }

    /// Change a branch label.
    pub fn rename(&self, id: BranchId, label: impl Into<String>) -> Result<Branch> {
        let label = label.into();
        let mut entry = self.branches.get_mut(&id).ok_or(ErdError::BranchNotFound(id))?;
        if let Some(db) = &self.db {
            db.lock().update_label(id, &label)?;
        }
        entry.label = label;
        Ok(entry.value().clone())
    }

    /// All branches, oldest first.
    pub fn list(&self) -> Vec<Branch> {
        let mut all: Vec<Branch> = self.branches.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Branches whose head is currently `node`.
    pub fn branches_at(&self, node: NodeId) -> Vec<BranchId> {
        let mut ids: Vec<BranchId> = self
            .branches
            .iter()
            .filter(|r| r.value().head_id == node)
            .map(|r| *r.key())
            .collect();
        ids.sort();
        ids
    }

    /// Check if a branch exists.
    pub fn contains(&self, id: BranchId) -> bool {
        self.branches.contains_key(&id)
    }

    /// Get the number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}
