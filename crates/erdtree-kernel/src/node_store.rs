//! Append-only storage of immutable message nodes.
//!
//! # Concurrency Model
//!
//! - DashMap keyed by node id; creates on unrelated ids never contend
//! - Nodes are handed out as `Arc<Node>` and never mutated after insert
//! - A tiny stamp lock hands out `(seq, created_at)` pairs together so both
//!   orders agree
//! - Optional write-through to SQLite; a failed write leaves memory untouched

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use erdtree_types::{Content, Node, NodeId, Role, now_millis};

use crate::db::ErdDb;
use crate::error::{ErdError, Result};

/// Thread-safe database handle shared by the node store and branch index.
pub type SharedDb = Arc<Mutex<ErdDb>>;

/// Last handed-out sequence number and timestamp.
#[derive(Debug, Default)]
struct Stamp {
    seq: u64,
    millis: u64,
}

impl Stamp {
    /// Next `(seq, created_at)`; timestamps never go backwards.
    fn next(&mut self) -> (u64, u64) {
        self.seq += 1;
        self.millis = self.millis.max(now_millis());
        (self.seq, self.millis)
    }
}

/// Store for immutable nodes. There is no update or delete.
pub struct NodeStore {
    nodes: DashMap<NodeId, Arc<Node>>,
    stamp: Mutex<Stamp>,
    db: Option<SharedDb>,
}

impl NodeStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            stamp: Mutex::new(Stamp::default()),
            db: None,
        }
    }

    /// Open a store backed by `db`, reloading every persisted node.
    ///
    /// Rows are replayed in sequence order, so a parent missing at the time
    /// its child is replayed means the database is damaged.
    pub fn open(db: SharedDb) -> Result<Self> {
        let loaded = db.lock().load_nodes()?;
        let nodes = DashMap::with_capacity(loaded.len());
        let mut stamp = Stamp::default();

        for node in loaded {
            if let Some(parent) = node.parent_id {
                if !nodes.contains_key(&parent) {
                    return Err(ErdError::NodeNotFound(parent));
                }
            }
            stamp.seq = stamp.seq.max(node.seq);
            stamp.millis = stamp.millis.max(node.created_at);
            nodes.insert(node.id, Arc::new(node));
        }

        tracing::info!(nodes = nodes.len(), "node store reloaded");
        Ok(Self {
            nodes,
            stamp: Mutex::new(stamp),
            db: Some(db),
        })
    }

    /// Create a node continuing `parent_id` (or a root when `None`).
    ///
    /// Fails with `NodeNotFound` if the parent does not exist.
    pub fn create(&self, parent_id: Option<NodeId>, role: Role, content: Content) -> Result<Arc<Node>> {
        if let Some(parent) = parent_id {
            if !self.nodes.contains_key(&parent) {
                return Err(ErdError::NodeNotFound(parent));
            }
        }

        let (seq, created_at) = self.stamp.lock().next();
        let node = Node {
            id: NodeId::new(),
            parent_id,
            role,
            content,
            seq,
            created_at,
        };

        if let Some(db) = &self.db {
            db.lock().insert_node(&node)?;
        }

        let node = Arc::new(node);
        self.nodes.insert(node.id, Arc::clone(&node));
        tracing::debug!(node = %node.id, parent = ?node.parent_id, seq, "node created");
        Ok(node)
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Result<Arc<Node>> {
        self.nodes
            .get(&id)
            .map(|r| Arc::clone(r.value()))
            .ok_or(ErdError::NodeNotFound(id))
    }

    /// Check if a node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Direct children of `id`, oldest first.
    ///
    /// Full scan; meant for diagnostics and tree views, not the read path.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        if !self.contains(id) {
            return Err(ErdError::NodeNotFound(id));
        }
        let mut children: Vec<(u64, NodeId)> = self
            .nodes
            .iter()
            .filter(|r| r.value().parent_id == Some(id))
            .map(|r| (r.value().seq, r.value().id))
            .collect();
        children.sort_unstable();
        Ok(children.into_iter().map(|(_, id)| id).collect())
    }

    /// Nodes without a parent, oldest first.
    pub fn roots(&self) -> Vec<Arc<Node>> {
        let mut roots: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|r| r.value().is_root())
            .map(|r| Arc::clone(r.value()))
            .collect();
        roots.sort_by_key(|n| n.seq);
        roots
    }

    /// Every node in creation order.
    pub fn all_ordered(&self) -> Vec<Arc<Node>> {
        let mut all: Vec<Arc<Node>> = self.nodes.iter().map(|r| Arc::clone(r.value())).collect();
        all.sort_by_key(|n| n.seq);
        all
    }

    /// All node ids (unordered).
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|r| *r.key()).collect()
    }

    /// Get the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether writes go through to a database.
    pub fn is_persistent(&self) -> bool {
        self.db.is_some()
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Content {
        Content::new(s).unwrap()
    }

    #[test]
    fn test_create_root_and_child() {
        let store = NodeStore::new();
        let root = store.create(None, Role::System, text("hello")).unwrap();
        let child = store.create(Some(root.id), Role::User, text("hi")).unwrap();

        assert!(root.is_root());
        assert!(child.continues(root.id));
        assert!(child.seq > root.seq);
        assert!(child.created_at >= root.created_at);
        assert_eq!(store.len(), 2);
        assert_eq!(*store.get(child.id).unwrap(), *child);
    }

    #[test]
    fn test_create_with_missing_parent() {
        let store = NodeStore::new();
        let missing = NodeId::new();
        let err = store.create(Some(missing), Role::User, text("lost")).unwrap_err();
        assert!(matches!(err, ErdError::NodeNotFound(id) if id == missing));
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_missing() {
        let store = NodeStore::new();
        assert!(store.get(NodeId::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_children_ordered_by_creation() {
        let store = NodeStore::new();
        let root = store.create(None, Role::System, text("root")).unwrap();
        let a = store.create(Some(root.id), Role::User, text("a")).unwrap();
        let b = store.create(Some(root.id), Role::User, text("b")).unwrap();
        let _grandchild = store.create(Some(a.id), Role::Assistant, text("a1")).unwrap();

        assert_eq!(store.children(root.id).unwrap(), vec![a.id, b.id]);
        assert!(store.children(b.id).unwrap().is_empty());
        assert!(store.children(NodeId::new()).is_err());
    }

    #[test]
    fn test_roots_and_all_ordered() {
        let store = NodeStore::new();
        let r1 = store.create(None, Role::System, text("one")).unwrap();
        let c = store.create(Some(r1.id), Role::User, text("c")).unwrap();
        let r2 = store.create(None, Role::System, text("two")).unwrap();

        let roots: Vec<NodeId> = store.roots().iter().map(|n| n.id).collect();
        assert_eq!(roots, vec![r1.id, r2.id]);

        let all: Vec<NodeId> = store.all_ordered().iter().map(|n| n.id).collect();
        assert_eq!(all, vec![r1.id, c.id, r2.id]);
    }

    #[test]
    fn test_persistent_store_reloads() {
        let db: SharedDb = Arc::new(Mutex::new(ErdDb::in_memory().unwrap()));
        let store = NodeStore::open(Arc::clone(&db)).unwrap();
        assert!(store.is_persistent());
        let root = store.create(None, Role::System, text("root")).unwrap();
        let child = store.create(Some(root.id), Role::User, text("child")).unwrap();
        drop(store);

        let reopened = NodeStore::open(db).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(*reopened.get(child.id).unwrap(), *child);

        // Sequence continues past the reloaded maximum.
        let next = reopened.create(Some(child.id), Role::Assistant, text("next")).unwrap();
        assert!(next.seq > child.seq);
    }

    #[test]
    fn test_parallel_creates_get_unique_seqs() {
        let store = NodeStore::new();
        let root = store.create(None, Role::System, text("root")).unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        store.create(Some(root.id), Role::User, text("x")).unwrap();
                    }
                });
            }
        });

        let all = store.all_ordered();
        assert_eq!(all.len(), 201);
        let mut seqs: Vec<u64> = all.iter().map(|n| n.seq).collect();
        seqs.dedup();
        assert_eq!(seqs.len(), 201);
        for pair in all.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }
}
