//! Write path for the version tree.
//!
//! The controller is the only thing that creates nodes or moves heads. An
//! append is optimistic: read the head, create a child of it, then try to
//! advance. If another append moved the head in between, the advance fails
//! with `InvalidTransition`, the node just created is left orphaned, and the
//! append starts over against the new head.

use std::sync::Arc;

use erdtree_types::{Branch, BranchId, Content, ForkPoint, Node, NodeId, Role};

use crate::branch_index::BranchIndex;
use crate::config::ErdConfig;
use crate::error::{ErdError, Result};
use crate::events::{EventBus, VersionEvent};
use crate::history::HistoryResolver;
use crate::node_store::NodeStore;

/// Label given to the branch that starts a conversation.
pub const ROOT_LABEL: &str = "main";

/// Limits applied by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerLimits {
    /// Attempts per append, first try included.
    pub max_append_attempts: u32,
    pub max_content_bytes: usize,
}

impl Default for ControllerLimits {
    fn default() -> Self {
        Self::from(&ErdConfig::default())
    }
}

impl From<&ErdConfig> for ControllerLimits {
    fn from(config: &ErdConfig) -> Self {
        Self {
            max_append_attempts: config.max_append_attempts.max(1),
            max_content_bytes: config.max_content_bytes,
        }
    }
}

/// Orchestrates node creation, head advancement and forking.
pub struct VersionController {
    nodes: Arc<NodeStore>,
    branches: Arc<BranchIndex>,
    history: HistoryResolver,
    events: EventBus,
    limits: ControllerLimits,
}

impl VersionController {
    pub fn new(
        nodes: Arc<NodeStore>,
        branches: Arc<BranchIndex>,
        events: EventBus,
        limits: ControllerLimits,
    ) -> Self {
        let history = HistoryResolver::new(Arc::clone(&nodes), Arc::clone(&branches));
        Self {
            nodes,
            branches,
            history,
            events,
            limits,
        }
    }

    pub fn limits(&self) -> ControllerLimits {
        self.limits
    }

    fn content(&self, text: impl Into<String>) -> Result<Content> {
        Ok(Content::with_limit(text, self.limits.max_content_bytes)?)
    }

    /// Start a conversation: a parentless node plus a branch labelled `main`.
    pub fn create_root(&self, role: Role, content: impl Into<String>) -> Result<(Arc<Node>, Branch)> {
        self.create_root_labeled(role, content, ROOT_LABEL)
    }

    /// [`create_root`](Self::create_root) with a caller-chosen label.
    pub fn create_root_labeled(
        &self,
        role: Role,
        content: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<(Arc<Node>, Branch)> {
        let content = self.content(content)?;
        let root = self.nodes.create(None, role, content)?;
        let branch = self.branches.create_branch(root.id, None, label)?;

        tracing::info!(branch = %branch.id, root = %root.id, label = %branch.label, "conversation started");
        self.events.publish(VersionEvent::BranchCreated {
            branch_id: branch.id,
            head_id: root.id,
            label: branch.label.clone(),
        });
        Ok((root, branch))
    }

    /// Append a message to the tip of `branch` and move the head onto it.
    ///
    /// Retries against the new head when the branch moves concurrently,
    /// and gives up with `Conflict` once the attempt budget is spent.
    pub fn append_message(&self, branch: BranchId, role: Role, content: impl Into<String>) -> Result<Arc<Node>> {
        self.append_message_with(branch, role, content, |_| {})
    }

    /// Append loop with a hook that runs between node creation and the
    /// head advance of each attempt.
    fn append_message_with(
        &self,
        branch: BranchId,
        role: Role,
        content: impl Into<String>,
        mut before_advance: impl FnMut(u32),
    ) -> Result<Arc<Node>> {
        let content = self.content(content)?;
        let max = self.limits.max_append_attempts;

        for attempt in 1..=max {
            let head = self.branches.head(branch)?;
            let node = self.nodes.create(Some(head), role, content.clone())?;
            before_advance(attempt);

            match self.branches.advance(branch, node.id) {
                Ok(()) => {
                    self.events.publish(VersionEvent::NodeAppended {
                        branch_id: branch,
                        node_id: node.id,
                        parent_id: node.parent_id,
                        role,
                        attempts: attempt,
                    });
                    return Ok(node);
                }
                Err(ErdError::InvalidTransition { expected_parent, .. }) => {
                    tracing::debug!(
                        branch = %branch,
                        attempt,
                        orphan = %node.id,
                        head = %expected_parent,
                        "head moved during append, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(branch = %branch, attempts = max, "append gave up under contention");
        Err(ErdError::Conflict { branch, attempts: max })
    }

    /// Start a new branch at `at`, which must be on the history of `source`.
    ///
    /// Without a label the branch is named `branch-N`, N being the number of
    /// branches that existed before it.
    pub fn fork_branch(&self, source: BranchId, at: NodeId, label: Option<String>) -> Result<Branch> {
        let source_head = self.branches.head(source)?;
        if !self.history.is_ancestor_or_self(at, source_head)? {
            return Err(ErdError::InvalidFork { branch: source, node: at });
        }

        let label = label.unwrap_or_else(|| format!("branch-{}", self.branches.len()));
        let fork_point = ForkPoint {
            branch_id: source,
            node_id: at,
        };
        let branch = self.branches.create_branch(at, Some(fork_point), label)?;

        tracing::info!(branch = %branch.id, source = %source, at = %at, "branch forked");
        self.events.publish(VersionEvent::BranchForked {
            branch_id: branch.id,
            fork_point,
            label: branch.label.clone(),
        });
        Ok(branch)
    }

    /// Relabel a branch.
    pub fn rename_branch(&self, branch: BranchId, label: impl Into<String>) -> Result<Branch> {
        let branch = self.branches.rename(branch, label)?;
        self.events.publish(VersionEvent::BranchRenamed {
            branch_id: branch.id,
            label: branch.label.clone(),
        });
        Ok(branch)
    }
}
