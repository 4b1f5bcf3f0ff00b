//! JSON request and response bodies for the HTTP layer.
//!
//! The kernel does no transport. A server maps routes onto controller and
//! resolver calls and uses these types for the bodies:
//!
//! | Route                         | Request             | Response             |
//! |-------------------------------|---------------------|----------------------|
//! | `GET /chat/{branch_id}`       |                     | [`HistoryResponse`]  |
//! | `POST /chat`                  | [`CreateChatRequest`] | [`CreateChatResponse`] |
//! | `POST /chat/{branch_id}/branch` | [`ForkRequest`]   | [`ForkResponse`]     |
//! | `POST /node`                  | [`AppendRequest`]   | [`AppendResponse`]   |
//!
//! Failures are sent as [`ErrorBody`] with [`ErdError::status_code`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use erdtree_types::{Branch, BranchId, Node, NodeId, Role};

use crate::error::ErdError;

/// One message as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub role: Role,
    pub content: String,
    /// Unix millis.
    pub timestamp: u64,
}

impl From<&Node> for MessageView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            parent_id: node.parent_id,
            role: node.role,
            content: node.content.as_str().to_string(),
            timestamp: node.created_at,
        }
    }
}

/// Branch summary for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchView {
    pub id: BranchId,
    pub label: String,
    pub head_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_branch_id: Option<BranchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_point_id: Option<NodeId>,
    pub created_at: u64,
}

impl From<&Branch> for BranchView {
    fn from(branch: &Branch) -> Self {
        Self {
            id: branch.id,
            label: branch.label.clone(),
            head_id: branch.head_id,
            parent_branch_id: branch.parent_branch_id(),
            fork_point_id: branch.fork_point_id(),
            created_at: branch.created_at,
        }
    }
}

/// `GET /chat/{branch_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub branch_id: BranchId,
    pub label: String,
    pub head_id: NodeId,
    pub messages: Vec<MessageView>,
}

impl HistoryResponse {
    /// `head_id` is taken from the last message of `history`, so it always
    /// matches the messages even if `branch` was read before a later append.
    pub fn new(branch: &Branch, history: &[Arc<Node>]) -> Self {
        Self {
            branch_id: branch.id,
            label: branch.label.clone(),
            head_id: history.last().map_or(branch.head_id, |n| n.id),
            messages: history.iter().map(|n| MessageView::from(n.as_ref())).collect(),
        }
    }
}

/// `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default = "system_role")]
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub label: Option<String>,
}

fn system_role() -> Role {
    Role::System
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub branch_id: BranchId,
    pub node_id: NodeId,
    pub label: String,
}

/// `POST /chat/{branch_id}/branch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkRequest {
    #[serde(alias = "parent_node_id")]
    pub node_id: NodeId,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkResponse {
    pub branch_id: BranchId,
    pub label: String,
    pub message: String,
}

impl From<&Branch> for ForkResponse {
    fn from(branch: &Branch) -> Self {
        Self {
            branch_id: branch.id,
            label: branch.label.clone(),
            message: "branch created".to_string(),
        }
    }
}

/// `POST /node`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendRequest {
    pub branch_id: BranchId,
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendResponse {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub message: String,
}

impl From<&Node> for AppendResponse {
    fn from(node: &Node) -> Self {
        Self {
            node_id: node.id,
            parent_id: node.parent_id,
            message: "node created".to_string(),
        }
    }
}

/// Error payload sent alongside [`ErdError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine tag, e.g. `branch_not_found`.
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&ErdError> for ErrorBody {
    fn from(err: &ErdError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erdtree_types::Content;

    #[test]
    fn test_append_request_parses() {
        let branch = BranchId::new();
        let json = format!(r#"{{"branch_id":"{branch}","role":"human","content":"hi"}}"#);
        let req: AppendRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.branch_id, branch);
        assert_eq!(req.role, Role::User);
    }

    #[test]
    fn test_fork_request_accepts_legacy_field() {
        let node = NodeId::new();
        let req: ForkRequest = serde_json::from_str(&format!(r#"{{"parent_node_id":"{node}"}}"#)).unwrap();
        assert_eq!(req.node_id, node);
        assert_eq!(req.label, None);
    }

    #[test]
    fn test_create_chat_requires_content() {
        assert!(serde_json::from_str::<CreateChatRequest>("{}").is_err());

        let req: CreateChatRequest = serde_json::from_str(r#"{"content":"x"}"#).unwrap();
        assert_eq!(req.role, Role::System);
        assert_eq!(req.content, "x");
        assert_eq!(req.label, None);
    }

    #[test]
    fn test_history_response_shape() {
        let root = Arc::new(Node {
            id: NodeId::new(),
            parent_id: None,
            role: Role::System,
            content: Content::new("hello").unwrap(),
            seq: 1,
            created_at: 42,
        });
        let branch = Branch {
            id: BranchId::new(),
            label: "main".into(),
            head_id: root.id,
            fork_point: None,
            created_at: 42,
        };

        let json = serde_json::to_value(HistoryResponse::new(&branch, &[root.clone()])).unwrap();
        assert_eq!(json["label"], "main");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["messages"][0]["timestamp"], 42);
        assert!(json["messages"][0]["parent_id"].is_null());
    }

    #[test]
    fn test_history_head_follows_messages() {
        let root = Arc::new(Node {
            id: NodeId::new(),
            parent_id: None,
            role: Role::System,
            content: Content::new("hello").unwrap(),
            seq: 1,
            created_at: 42,
        });
        let next = Arc::new(Node {
            id: NodeId::new(),
            parent_id: Some(root.id),
            role: Role::User,
            content: Content::new("hi").unwrap(),
            seq: 2,
            created_at: 43,
        });
        // Branch read before `next` landed.
        let stale = Branch {
            id: BranchId::new(),
            label: "main".into(),
            head_id: root.id,
            fork_point: None,
            created_at: 42,
        };

        let resp = HistoryResponse::new(&stale, &[root, next.clone()]);
        assert_eq!(resp.head_id, next.id);
        assert_eq!(resp.messages.last().map(|m| m.id), Some(resp.head_id));
    }

    #[test]
    fn test_error_body() {
        let err = ErdError::Conflict {
            branch: BranchId::new(),
            attempts: 8,
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "conflict");
        assert!(body.retryable);

        let body = ErrorBody::from(&ErdError::NodeNotFound(NodeId::new()));
        assert_eq!(body.error, "node_not_found");
        assert!(!body.retryable);
    }
}
