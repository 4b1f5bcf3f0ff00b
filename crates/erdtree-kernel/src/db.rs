//! SQLite persistence for nodes and branches.
//!
//! Nodes are append-only rows; branches are rows whose `head_id` and `label`
//! columns are updated in place. Foreign keys keep every parent and head
//! pointing at a stored node.

use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, Row, params};

use erdtree_types::{Branch, BranchId, Content, ForkPoint, Node, NodeId, Role};

/// Database handle for version-tree persistence.
pub struct ErdDb {
    conn: Connection,
}

const SCHEMA: &str = r#"
-- Message nodes (append-only, immutable)
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    parent_id TEXT REFERENCES nodes(id),
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    seq INTEGER NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);

-- Branches (mutable head pointer + label)
CREATE TABLE IF NOT EXISTS branches (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    head_id TEXT NOT NULL REFERENCES nodes(id),
    parent_branch_id TEXT,
    fork_point_id TEXT REFERENCES nodes(id),
    created_at INTEGER NOT NULL
);
"#;

/// Map a text column through `FromStr`, reporting failures as conversion errors.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> SqliteResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> SqliteResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn row_to_node(row: &Row<'_>) -> SqliteResult<Node> {
    let content: String = row.get(3)?;
    let content = Content::new(content)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(Node {
        id: parse_col(row, 0)?,
        parent_id: parse_opt_col(row, 1)?,
        role: parse_col::<Role>(row, 2)?,
        content,
        seq: row.get::<_, i64>(4)? as u64,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

fn row_to_branch(row: &Row<'_>) -> SqliteResult<Branch> {
    let parent_branch: Option<BranchId> = parse_opt_col(row, 3)?;
    let fork_node: Option<NodeId> = parse_opt_col(row, 4)?;
    let fork_point = match (parent_branch, fork_node) {
        (Some(branch_id), Some(node_id)) => Some(ForkPoint { branch_id, node_id }),
        _ => None,
    };
    Ok(Branch {
        id: parse_col(row, 0)?,
        label: row.get(1)?,
        head_id: parse_col(row, 2)?,
        fork_point,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

impl ErdDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Insert a node. The parent row must already exist.
    pub fn insert_node(&self, node: &Node) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO nodes (id, parent_id, role, content, seq, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.id.to_string(),
                node.parent_id.map(|p| p.to_string()),
                node.role.as_str(),
                node.content.as_str(),
                node.seq as i64,
                node.created_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Get a node by ID.
    pub fn get_node(&self, id: NodeId) -> SqliteResult<Option<Node>> {
        self.conn
            .query_row(
                "SELECT id, parent_id, role, content, seq, created_at FROM nodes WHERE id = ?1",
                params![id.to_string()],
                row_to_node,
            )
            .optional()
    }

    /// All nodes in creation order, so parents always precede children.
    pub fn load_nodes(&self) -> SqliteResult<Vec<Node>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, parent_id, role, content, seq, created_at FROM nodes ORDER BY seq",
        )?;
        let rows = stmt.query_map([], row_to_node)?;
        rows.collect()
    }

    /// Node count.
    pub fn node_count(&self) -> SqliteResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get::<_, i64>(0))
            .map(|c| c as usize)
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Insert a branch.
    pub fn insert_branch(&self, branch: &Branch) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO branches (id, label, head_id, parent_branch_id, fork_point_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                branch.id.to_string(),
                branch.label,
                branch.head_id.to_string(),
                branch.parent_branch_id().map(|b| b.to_string()),
                branch.fork_point_id().map(|n| n.to_string()),
                branch.created_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Move a branch head, guarded by the expected current head.
    ///
    /// Returns `false` when the stored head was not `expected`.
    pub fn update_head(&self, id: BranchId, expected: NodeId, new_head: NodeId) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE branches SET head_id = ?1 WHERE id = ?2 AND head_id = ?3",
            params![new_head.to_string(), id.to_string(), expected.to_string()],
        )?;
        Ok(changed == 1)
    }

    /// Change a branch label. Returns `false` if the branch is unknown.
    pub fn update_label(&self, id: BranchId, label: &str) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE branches SET label = ?1 WHERE id = ?2",
            params![label, id.to_string()],
        )?;
        Ok(changed == 1)
    }

    /// Get a branch by ID.
    pub fn get_branch(&self, id: BranchId) -> SqliteResult<Option<Branch>> {
        self.conn
            .query_row(
                "SELECT id, label, head_id, parent_branch_id, fork_point_id, created_at
                 FROM branches WHERE id = ?1",
                params![id.to_string()],
                row_to_branch,
            )
            .optional()
    }

    /// All branches, oldest first.
    pub fn load_branches(&self) -> SqliteResult<Vec<Branch>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, head_id, parent_branch_id, fork_point_id, created_at
             FROM branches ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], row_to_branch)?;
        rows.collect()
    }

    /// Branch count.
    pub fn branch_count(&self) -> SqliteResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM branches", [], |row| row.get::<_, i64>(0))
            .map(|c| c as usize)
    }
}
