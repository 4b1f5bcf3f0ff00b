//! Shared identity, node, and branch types for ErdTree.
//!
//! This crate is the data-model foundation: typed IDs, the immutable message
//! [`Node`], and the mutable [`Branch`] pointer. It has **no internal erdtree
//! dependencies**; the kernel builds on it.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Node (NodeId) ← one immutable message
//!     └── parent_id links to the message it continues (None for roots)
//!     └── role (system / user / assistant) + bounded content
//!
//! Branch (BranchId) ← a named pointer into the node forest
//!     └── head_id: the tip node of this conversation line
//!     └── fork_point: which branch and node it was forked from
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`NodeId`]        | Which message                                |
//! | [`BranchId`]      | Which conversation line                      |
//! | [`Node`]          | Immutable message record                     |
//! | [`Role`]          | Closed author tag                            |
//! | [`Content`]       | Size-bounded message payload                 |
//! | [`Branch`]        | Head pointer + label + fork provenance       |
//! | [`ForkPoint`]     | (source branch, node) a fork was taken from  |
//! |-------------------|----------------------------------------------|

pub mod branch;
pub mod ids;
pub mod node;

// Re-export primary types at crate root for convenience.
pub use branch::{Branch, ForkPoint, fork_lineage};
pub use ids::{BranchId, NodeId, PrefixError, resolve_branch_prefix, resolve_node_prefix};
pub use node::{Content, ContentError, MAX_CONTENT_BYTES, Node, Role};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
