//! Typed identifiers for nodes and branches.
//!
//! Both wrap UUIDv7 (time-ordered, globally unique), so ids are never reused
//! and sort roughly by creation time. They display as standard UUID text for
//! logging; `short()` (first 8 hex chars) is for human-facing output only and
//! never used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A message node identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(uuid::Uuid);

/// A branch identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only (not lookup).
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// Check if a query string matches this ID by hex prefix.
            ///
            /// Hyphens in the query are ignored so a pasted UUID fragment works.
            pub fn matches_hex_prefix(&self, prefix: &str) -> bool {
                let prefix: String = prefix.chars().filter(|c| *c != '-').collect();
                !prefix.is_empty() && self.to_hex().starts_with(&prefix.to_ascii_lowercase())
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl std::str::FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(NodeId, "NodeId");
impl_typed_id!(BranchId, "BranchId");

// ── Prefix resolution ───────────────────────────────────────────────────────

/// Error from ambiguous prefix resolution.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PrefixError {
    #[error("no match for '{0}'")]
    NoMatch(String),
    #[error("ambiguous prefix '{prefix}': matches {candidates:?}")]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
}

/// Resolve a query string against branch ids and their labels.
///
/// Resolution order:
/// 1. Full UUID parse
/// 2. Exact label match (first created wins when labels repeat)
/// 3. Unique label prefix match
/// 4. Unique hex prefix match
pub fn resolve_branch_prefix<'a>(
    branches: impl Iterator<Item = (BranchId, &'a str)>,
    query: &str,
) -> Result<BranchId, PrefixError> {
    let entries: Vec<(BranchId, &str)> = branches.collect();

    if let Ok(id) = BranchId::parse(query) {
        if entries.iter().any(|(b, _)| *b == id) {
            return Ok(id);
        }
    }

    if let Some((id, _)) = entries.iter().find(|(_, label)| *label == query) {
        return Ok(*id);
    }

    let label_matches: Vec<(BranchId, &str)> = entries
        .iter()
        .filter(|(_, label)| label.starts_with(query))
        .copied()
        .collect();

    if label_matches.len() == 1 {
        return Ok(label_matches[0].0);
    }
    if label_matches.len() > 1 {
        return Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: label_matches.iter().map(|(_, l)| l.to_string()).collect(),
        });
    }

    let hex_matches: Vec<BranchId> = entries
        .iter()
        .filter(|(id, _)| id.matches_hex_prefix(query))
        .map(|(id, _)| *id)
        .collect();

    match hex_matches.len() {
        0 => Err(PrefixError::NoMatch(query.to_string())),
        1 => Ok(hex_matches[0]),
        _ => Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: hex_matches.iter().map(|id| id.short()).collect(),
        }),
    }
}

/// Resolve a node id from a full UUID or a unique hex prefix.
pub fn resolve_node_prefix(
    nodes: impl Iterator<Item = NodeId>,
    query: &str,
) -> Result<NodeId, PrefixError> {
    let matches: Vec<NodeId> = nodes.filter(|id| id.matches_hex_prefix(query)).collect();
    match matches.len() {
        0 => Err(PrefixError::NoMatch(query.to_string())),
        1 => Ok(matches[0]),
        _ => Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: matches.iter().map(|id| id.short()).collect(),
        }),
    }
}
