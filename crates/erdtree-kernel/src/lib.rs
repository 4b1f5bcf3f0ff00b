//! ErdTree kernel: the conversation version-tree engine.
//!
//! Conversations are a forest of immutable message nodes. Branches are
//! labelled pointers to a head node; appending moves a head one child
//! forward, forking creates a new pointer at any node already in a branch's
//! history.
//!
//! # Components
//!
//! ```text
//! VersionController ── the only writer
//!     ├── NodeStore      create-only nodes (DashMap, optional SQLite)
//!     ├── BranchIndex    per-branch compare-and-swap heads
//!     └── HistoryResolver parent walk, head → root, reversed
//! ```
//!
//! [`Engine`] wires them together from an [`ErdConfig`]. [`ConversationTree`]
//! and [`ContextAssembler`] are read-side views; [`EventBus`] reports every
//! successful mutation.

pub mod api;
pub mod branch_index;
pub mod config;
pub mod context;
pub mod controller;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod node_store;
pub mod tree;

pub use branch_index::BranchIndex;
pub use config::ErdConfig;
pub use context::{ContextAssembler, ContextWindow, estimate_tokens};
pub use controller::{ControllerLimits, ROOT_LABEL, VersionController};
pub use db::ErdDb;
pub use engine::Engine;
pub use error::{ErdError, Result};
pub use events::{EventBus, Subscription, VersionEvent};
pub use history::HistoryResolver;
pub use node_store::{NodeStore, SharedDb};
pub use tree::ConversationTree;

// Re-export the data model so callers need only this crate.
pub use erdtree_types::{Branch, BranchId, Content, ForkPoint, Node, NodeId, Role};
