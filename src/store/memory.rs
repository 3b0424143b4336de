use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{build_tree, resolve_path, BranchStats, MessageNode, Session, TreeNode};
use crate::error::{StoreError, StoreResult};

type SessionHandle = Arc<RwLock<Session>>;

/// Linear transcript of a session's active branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    /// The session ID.
    pub session_id: String,
    /// Messages along the active branch, root first.
    pub messages: Vec<MessageNode>,
    /// Ids of the active branch, root first.
    pub active_branch: Vec<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// Whole-tree snapshot of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeView {
    /// The session ID.
    pub session_id: String,
    /// Tree rooted at the requested message, or `None` for an empty session.
    pub tree: Option<TreeNode>,
    /// Ids of the active branch, root first.
    pub active_branch: Vec<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// Owner of every chat session in the process.
///
/// The outer map lock is only held long enough to look up or insert a
/// session handle; each session then has its own lock, so work on one
/// session never waits on another. Writers hold the session lock for the
/// whole of a mutation, and readers clone what they need before releasing.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session and return its id.
    pub async fn create_session(&self) -> String {
        let session = Session::new();
        let id = session.id.clone();

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(RwLock::new(session)));

        info!(session_id = %id, "Session created");
        id
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Append a user turn after the tail of the active branch.
    pub async fn append_user_turn(&self, session_id: &str, text: &str) -> StoreResult<String> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.write().await;
        let id = session.append_user(text)?;

        debug!(
            session_id = %session_id,
            message_id = %id,
            branch_len = session.active_branch.len(),
            "User turn appended"
        );
        Ok(id)
    }

    /// Append an assistant turn as a child of `parent_id`.
    pub async fn append_assistant_turn(
        &self,
        session_id: &str,
        parent_id: &str,
        text: &str,
    ) -> StoreResult<String> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.write().await;
        let id = session.append_assistant(parent_id, text)?;

        debug!(
            session_id = %session_id,
            message_id = %id,
            parent_id = %parent_id,
            branch_len = session.active_branch.len(),
            "Assistant turn appended"
        );
        Ok(id)
    }

    /// Attach a caption to an existing message.
    pub async fn attach_label(
        &self,
        session_id: &str,
        node_id: &str,
        label: impl Into<String>,
    ) -> StoreResult<()> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.write().await;
        session.set_label(node_id, label)
    }

    /// Make the ancestry of `target` the active branch.
    pub async fn switch_branch(&self, session_id: &str, target: &str) -> StoreResult<Vec<String>> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.write().await;
        let path = session.switch_to(target)?;

        info!(
            session_id = %session_id,
            target = %target,
            branch_len = path.len(),
            "Active branch switched"
        );
        Ok(path)
    }

    /// Messages along the active branch.
    pub async fn session_view(&self, session_id: &str) -> StoreResult<SessionView> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;

        Ok(SessionView {
            session_id: session.id.clone(),
            messages: session.active_nodes(),
            active_branch: session.active_branch.clone(),
            created_at: session.created_at,
        })
    }

    /// Ids of the active branch, root first.
    pub async fn active_branch(&self, session_id: &str) -> StoreResult<Vec<String>> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;
        Ok(session.active_branch.clone())
    }

    /// Tree snapshot rooted at `from`, or at the session root when `from` is `None`.
    pub async fn tree(&self, session_id: &str, from: Option<&str>) -> StoreResult<TreeView> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;

        let start = from.or(session.root_id.as_deref());
        Ok(TreeView {
            session_id: session.id.clone(),
            tree: build_tree(&session.nodes, start),
            active_branch: session.active_branch.clone(),
            created_at: session.created_at,
        })
    }

    /// Messages from the root down to `node_id`, inclusive.
    pub async fn path_to(&self, session_id: &str, node_id: &str) -> StoreResult<Vec<MessageNode>> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;

        resolve_path(&session.nodes, node_id)?
            .iter()
            .map(|id| session.node(id).cloned())
            .collect()
    }

    /// A single message.
    pub async fn message(&self, session_id: &str, node_id: &str) -> StoreResult<MessageNode> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;
        session.node(node_id).cloned()
    }

    /// Tree shape summary.
    pub async fn stats(&self, session_id: &str) -> StoreResult<BranchStats> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;
        Ok(session.stats())
    }

    /// Full copy of a session.
    pub async fn snapshot(&self, session_id: &str) -> StoreResult<Session> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;
        Ok(session.clone())
    }

    async fn handle(&self, session_id: &str) -> StoreResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}
