//! Message node types.
//!
//! A [`Node`] is one immutable message in the conversation forest. The kernel's
//! node store is the only thing that assigns ids and sequence numbers; once a
//! node is handed out it is shared behind an `Arc` and never mutated.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::NodeId;

/// Hard upper bound on message content, in bytes of UTF-8.
///
/// Engines may configure a lower bound; nothing may configure a higher one.
pub const MAX_CONTENT_BYTES: usize = 64 * 1024;

/// Author of a message.
///
/// A closed tag, not a hierarchy. Parsing accepts the common aliases used by
/// chat APIs ("human", "model", "agent").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Role {
    /// System prompt or notice.
    System,
    /// Person at the keyboard.
    #[default]
    #[strum(serialize = "user", serialize = "human")]
    #[serde(alias = "human")]
    User,
    /// Model reply.
    #[strum(serialize = "assistant", serialize = "model", serialize = "agent")]
    #[serde(alias = "model", alias = "agent")]
    Assistant,
}

impl Role {
    /// Parse from string (case-insensitive, aliases allowed).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Canonical string form, as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// All roles, in canonical order.
    pub fn all() -> &'static [Role] {
        &[Role::System, Role::User, Role::Assistant]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("content is {len} bytes, limit is {limit}")]
    TooLarge { len: usize, limit: usize },
}

/// Opaque, size-bounded message payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Content(String);

impl Content {
    /// Validate against [`MAX_CONTENT_BYTES`].
    pub fn new(text: impl Into<String>) -> Result<Self, ContentError> {
        Self::with_limit(text, MAX_CONTENT_BYTES)
    }

    /// Validate against a caller-chosen limit (clamped to [`MAX_CONTENT_BYTES`]).
    pub fn with_limit(text: impl Into<String>, limit: usize) -> Result<Self, ContentError> {
        let text = text.into();
        let limit = limit.min(MAX_CONTENT_BYTES);
        if text.len() > limit {
            return Err(ContentError::TooLarge {
                len: text.len(),
                limit,
            });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Content {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Content {
    type Error = ContentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Content> for String {
    fn from(content: Content) -> Self {
        content.0
    }
}

impl AsRef<str> for Content {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One immutable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique id, never reused.
    pub id: NodeId,
    /// The node this message continues from. `None` only for roots.
    pub parent_id: Option<NodeId>,
    pub role: Role,
    pub content: Content,
    /// Store-local creation sequence. A parent's seq is always smaller.
    pub seq: u64,
    /// Unix millis, non-decreasing in seq order within one store.
    pub created_at: u64,
}

impl Node {
    /// Whether this node starts a conversation.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this node directly continues `parent`.
    pub fn continues(&self, parent: NodeId) -> bool {
        self.parent_id == Some(parent)
    }
}
