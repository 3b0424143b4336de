use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{spawn_label_task, to_turns, Completion, Labeler};
use crate::config::LabelConfig;
use crate::error::{AppResult, StoreError};
use crate::store::{Role, SessionStore};

/// Result of one completed exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// The session ID.
    pub session_id: String,
    /// Assistant text, stored verbatim.
    pub response: String,
    /// Id of the new assistant message.
    pub message_id: String,
    /// Id of the user message that was answered.
    pub user_message_id: String,
    /// Active branch after the exchange, root first.
    pub active_branch: Vec<String>,
}

/// Runs user/assistant exchanges against the store.
///
/// The completion call is awaited without holding any session lock. If it
/// fails, the user turn stays in the tree as a leaf with no reply.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<SessionStore>,
    completion: Arc<dyn Completion>,
    labeler: Arc<dyn Labeler>,
    labels: LabelConfig,
}

impl ChatService {
    /// Create a new chat service
    pub fn new(
        store: Arc<SessionStore>,
        completion: Arc<dyn Completion>,
        labeler: Arc<dyn Labeler>,
        labels: LabelConfig,
    ) -> Self {
        Self {
            store,
            completion,
            labeler,
            labels,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Append `text` as a user turn and answer it.
    ///
    /// The user turn is queued for labeling before the completion runs, so it
    /// gets a caption even when no reply arrives.
    pub async fn send(&self, session_id: &str, text: &str) -> AppResult<ChatReply> {
        let user_message_id = self.store.append_user_turn(session_id, text).await?;
        self.schedule_labels(session_id, vec![user_message_id.clone()]);

        let reply = self.answer(session_id, &user_message_id).await?;
        self.schedule_labels(session_id, vec![reply.message_id.clone()]);
        Ok(reply)
    }

    /// Produce a new assistant reply to an existing user message.
    ///
    /// The new reply becomes a sibling of any earlier replies and the active
    /// branch moves onto it.
    pub async fn regenerate(&self, session_id: &str, user_message_id: &str) -> AppResult<ChatReply> {
        let message = self.store.message(session_id, user_message_id).await?;
        if message.role != Role::User {
            return Err(StoreError::validation(
                "message_id",
                "Only user messages can be regenerated",
            )
            .into());
        }

        let reply = self.answer(session_id, user_message_id).await?;
        self.schedule_labels(session_id, vec![reply.message_id.clone()]);
        Ok(reply)
    }

    async fn answer(&self, session_id: &str, user_message_id: &str) -> AppResult<ChatReply> {
        let start = Instant::now();
        let path = self.store.path_to(session_id, user_message_id).await?;

        let response = match self.completion.complete(to_turns(&path)).await {
            Ok(text) => text,
            Err(e) => {
                error!(
                    session_id = %session_id,
                    user_message_id = %user_message_id,
                    error = %e,
                    latency_ms = start.elapsed().as_millis(),
                    "Completion failed"
                );
                return Err(e.into());
            }
        };

        let message_id = self
            .store
            .append_assistant_turn(session_id, user_message_id, &response)
            .await?;
        let active_branch = self.store.active_branch(session_id).await?;

        info!(
            session_id = %session_id,
            message_id = %message_id,
            turns = path.len(),
            latency_ms = start.elapsed().as_millis(),
            "Exchange completed"
        );

        Ok(ChatReply {
            session_id: session_id.to_string(),
            response,
            message_id,
            user_message_id: user_message_id.to_string(),
            active_branch,
        })
    }

    fn schedule_labels(&self, session_id: &str, message_ids: Vec<String>) {
        // Detached: the reply never waits on labeling.
        let _ = spawn_label_task(
            Arc::clone(&self.store),
            Arc::clone(&self.labeler),
            self.labels.clone(),
            session_id.to_string(),
            message_ids,
        );
    }
}
