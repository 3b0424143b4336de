//! In-memory branching conversation store.
//!
//! This module provides the message tree that backs every chat session:
//! - [`MessageNode`]: one user or assistant turn, linked to its parent by id
//! - [`Session`]: the node arena plus the currently active root-to-node path
//! - [`SessionStore`]: the owner of all sessions, one lock per session
//! - [`resolve_path`]: root-first ancestry of any node
//! - [`build_tree`]: owned tree snapshot for rendering
//!
//! Nodes are never removed, so parent/child relationships are plain ids into
//! the session's node map rather than owning pointers.

mod memory;
mod path;
mod session;
mod tree;


pub use memory::{SessionStore, SessionView, TreeView};
pub use path::resolve_path;
pub use session::{BranchStats, Session};
pub use tree::{build_tree, TreeNode};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the person driving the conversation.
    User,
    /// Text produced by the completion pipe.
    Assistant,
}

impl Role {
    /// Get the role name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn in a session's message tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    /// Unique message identifier.
    pub id: String,
    /// Who produced this turn.
    pub role: Role,
    /// Full text of the turn.
    pub content: String,
    /// Short caption attached after creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Message this one continues from; `None` only for the session root.
    pub parent_id: Option<String>,
    /// Continuations of this message in creation order.
    pub child_ids: Vec<String>,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl MessageNode {
    /// Create a detached node with a fresh id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            label: None,
            parent_id: None,
            child_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the parent message
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// True for the first message of a session.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// True when nothing has been appended after this message.
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}
