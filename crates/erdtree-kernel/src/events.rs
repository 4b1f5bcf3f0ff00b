//! Version events and the broadcast bus that carries them.
//!
//! Every successful mutation in the controller publishes one
//! [`VersionEvent`]. Subscribers filter by dotted subject pattern:
//!
//! - `*` matches one token: `branch.*` matches `branch.forked`
//! - `>` at the end matches one or more tokens: `>` matches everything
//! - anything else matches literally
//!
//! ```ignore
//! let bus = EventBus::new(64);
//! let mut sub = bus.subscribe("branch.*");
//! // ... controller.fork_branch(...)
//! while let Some(event) = sub.try_recv() {
//!     println!("{}", event.subject());
//! }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use erdtree_types::{BranchId, ForkPoint, NodeId, Role};

/// Something changed in the version tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersionEvent {
    /// A message was appended and the branch head moved onto it.
    NodeAppended {
        branch_id: BranchId,
        node_id: NodeId,
        parent_id: Option<NodeId>,
        role: Role,
        /// Attempts the append needed (1 when uncontended).
        attempts: u32,
    },
    /// A conversation was started with a fresh root.
    BranchCreated {
        branch_id: BranchId,
        head_id: NodeId,
        label: String,
    },
    /// A branch was forked from existing history.
    BranchForked {
        branch_id: BranchId,
        fork_point: ForkPoint,
        label: String,
    },
    BranchRenamed { branch_id: BranchId, label: String },
}

impl VersionEvent {
    /// Dotted subject used for subscription filtering.
    pub fn subject(&self) -> &'static str {
        match self {
            VersionEvent::NodeAppended { .. } => "node.appended",
            VersionEvent::BranchCreated { .. } => "branch.created",
            VersionEvent::BranchForked { .. } => "branch.forked",
            VersionEvent::BranchRenamed { .. } => "branch.renamed",
        }
    }

    /// The branch the event is about.
    pub fn branch_id(&self) -> BranchId {
        match self {
            VersionEvent::NodeAppended { branch_id, .. }
            | VersionEvent::BranchCreated { branch_id, .. }
            | VersionEvent::BranchForked { branch_id, .. }
            | VersionEvent::BranchRenamed { branch_id, .. } => *branch_id,
        }
    }
}

/// Check a dotted subject against a pattern (see module docs).
pub fn matches_pattern(pattern: &str, subject: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let subject: Vec<&str> = subject.split('.').collect();
    match_tokens(&pattern, &subject)
}

fn match_tokens(pattern: &[&str], subject: &[&str]) -> bool {
    match (pattern.split_first(), subject.split_first()) {
        (None, None) => true,
        (Some((&">", [])), Some(_)) => true,
        (Some((&"*", p_rest)), Some((_, s_rest))) => match_tokens(p_rest, s_rest),
        (Some((p, p_rest)), Some((s, s_rest))) => p == s && match_tokens(p_rest, s_rest),
        _ => false,
    }
}

/// Multi-subscriber event channel.
///
/// Cheap to clone; clones share one channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<VersionEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Publish an event. Returns how many subscribers got it; zero is fine.
    pub fn publish(&self, event: VersionEvent) -> usize {
        tracing::trace!(subject = event.subject(), branch = %event.branch_id(), "publish");
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events whose subject matches `pattern`.
    pub fn subscribe(&self, pattern: &str) -> Subscription {
        Subscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Filtered receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct Subscription {
    pattern: String,
    rx: broadcast::Receiver<VersionEvent>,
}

impl Subscription {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<VersionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if matches_pattern(&self.pattern, event.subject()) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(pattern = %self.pattern, lagged = n, "event subscription lagged");
                }
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Option<VersionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if matches_pattern(&self.pattern, event.subject()) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(pattern = %self.pattern, lagged = n, "event subscription lagged");
                }
            }
        }
    }
}
