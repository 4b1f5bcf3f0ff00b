//! Wiring for the four core components.
//!
//! An `Engine` owns one node store and one branch index and hands out the
//! resolver and controller built over them. It is the single entry point
//! binaries and servers construct.

use std::sync::Arc;

use parking_lot::Mutex;

use erdtree_types::{Branch, BranchId, NodeId, PrefixError, resolve_branch_prefix, resolve_node_prefix};

use crate::branch_index::BranchIndex;
use crate::config::ErdConfig;
use crate::context::{ContextAssembler, ContextWindow};
use crate::controller::{ControllerLimits, VersionController};
use crate::db::ErdDb;
use crate::error::{ErdError, Result};
use crate::events::EventBus;
use crate::history::HistoryResolver;
use crate::node_store::{NodeStore, SharedDb};
use crate::tree::ConversationTree;

/// A configured version-tree engine.
pub struct Engine {
    config: ErdConfig,
    nodes: Arc<NodeStore>,
    branches: Arc<BranchIndex>,
    history: HistoryResolver,
    controller: VersionController,
    events: EventBus,
}

impl Engine {
    /// Build an engine from `config`: database-backed when `db_path` is set,
    /// in memory otherwise.
    pub fn open(config: ErdConfig) -> Result<Self> {
        config.validate()?;
        match config.resolved_db_path() {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| ErdError::Config(format!("{}: {}", parent.display(), e)))?;
                }
                let db = ErdDb::open(&path)?;
                tracing::info!(path = %path.display(), "database opened");
                Self::with_db(config, Arc::new(Mutex::new(db)))
            }
            None => Self::in_memory(config),
        }
    }

    /// In-memory engine; `db_path` is ignored. The rest of `config` is
    /// validated the same way [`Engine::open`] does.
    pub fn in_memory(config: ErdConfig) -> Result<Self> {
        config.validate()?;
        let nodes = Arc::new(NodeStore::new());
        let branches = Arc::new(BranchIndex::new(Arc::clone(&nodes)));
        Ok(Self::assemble(config, nodes, branches))
    }

    /// Engine over an already-open database, reloading its contents.
    pub fn with_db(config: ErdConfig, db: SharedDb) -> Result<Self> {
        config.validate()?;
        let nodes = Arc::new(NodeStore::open(Arc::clone(&db))?);
        let branches = Arc::new(BranchIndex::open(db, Arc::clone(&nodes))?);
        Ok(Self::assemble(config, nodes, branches))
    }

    fn assemble(config: ErdConfig, nodes: Arc<NodeStore>, branches: Arc<BranchIndex>) -> Self {
        let events = EventBus::new(config.event_capacity);
        let history = HistoryResolver::new(Arc::clone(&nodes), Arc::clone(&branches));
        let controller = VersionController::new(
            Arc::clone(&nodes),
            Arc::clone(&branches),
            events.clone(),
            ControllerLimits::from(&config),
        );
        Self {
            config,
            nodes,
            branches,
            history,
            controller,
            events,
        }
    }

    pub fn config(&self) -> &ErdConfig {
        &self.config
    }

    pub fn nodes(&self) -> &Arc<NodeStore> {
        &self.nodes
    }

    pub fn branches(&self) -> &Arc<BranchIndex> {
        &self.branches
    }

    pub fn history(&self) -> &HistoryResolver {
        &self.history
    }

    pub fn controller(&self) -> &VersionController {
        &self.controller
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Snapshot forest view of everything stored.
    pub fn tree(&self) -> ConversationTree {
        ConversationTree::build(&self.nodes, &self.branches.list())
    }

    /// Context window for a branch using `window` (or the configured size).
    pub fn context(&self, branch: BranchId, window: Option<usize>) -> Result<ContextWindow> {
        let history = self.history.resolve(branch)?;
        let assembler = ContextAssembler::new(window.unwrap_or(self.config.context_window));
        Ok(assembler.assemble(&history))
    }

    /// Find a branch by id, label, or unique prefix of either.
    pub fn find_branch(&self, query: &str) -> std::result::Result<Branch, PrefixError> {
        let all = self.branches.list();
        let id = resolve_branch_prefix(all.iter().map(|b| (b.id, b.label.as_str())), query)?;
        all.into_iter()
            .find(|b| b.id == id)
            .ok_or_else(|| PrefixError::NoMatch(query.to_string()))
    }

    /// Find a node by full id or unique hex prefix.
    pub fn find_node(&self, query: &str) -> std::result::Result<NodeId, PrefixError> {
        resolve_node_prefix(self.nodes.ids().into_iter(), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erdtree_types::Role;

    #[test]
    fn test_in_memory_roundtrip() {
        let engine = Engine::in_memory(ErdConfig::default()).unwrap();
        let (root, main) = engine.controller().create_root(Role::System, "sys").unwrap();
        engine.controller().append_message(main.id, Role::User, "hi").unwrap();

        assert_eq!(engine.history().resolve(main.id).unwrap().len(), 2);
        assert_eq!(engine.tree().roots, vec![root.id]);
        assert!(!engine.nodes().is_persistent());
    }

    #[test]
    fn test_context_uses_configured_window() {
        let mut config = ErdConfig::default();
        config.context_window = 1;
        let engine = Engine::in_memory(config).unwrap();
        let (_, main) = engine.controller().create_root(Role::System, "sys").unwrap();
        engine.controller().append_message(main.id, Role::User, "one").unwrap();
        engine.controller().append_message(main.id, Role::Assistant, "two").unwrap();

        let window = engine.context(main.id, None).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.dropped, 1);

        let wide = engine.context(main.id, Some(10)).unwrap();
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn test_find_by_label_and_prefix() {
        let engine = Engine::in_memory(ErdConfig::default()).unwrap();
        let (root, main) = engine.controller().create_root(Role::System, "").unwrap();

        assert_eq!(engine.find_branch("main").unwrap().id, main.id);
        assert_eq!(engine.find_branch(&main.id.to_hex()[..12]).unwrap().id, main.id);
        assert!(engine.find_branch("nope").is_err());
        assert_eq!(engine.find_node(&root.id.short()).unwrap(), root.id);
    }

    #[test]
    fn test_in_memory_rejects_invalid_config() {
        let err = Engine::in_memory(ErdConfig::default().with_max_append_attempts(0)).err().unwrap();
        assert_eq!(err.kind(), "config");

        let mut config = ErdConfig::default();
        config.event_capacity = 0;
        assert!(Engine::in_memory(config).is_err());
    }

    #[test]
    fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("erd.db");
        let config = ErdConfig::default().with_db_path(path.to_string_lossy());

        let engine = Engine::open(config).unwrap();
        assert!(engine.nodes().is_persistent());
        assert!(path.exists());
    }
}
