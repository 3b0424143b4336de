use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::error::{McpError, McpResult};
use crate::store::BranchStats;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "chat_create_session" => handle_create_session(state).await,
        "chat_send" => handle_send(state, arguments).await,
        "chat_get_session" => handle_get_session(state, arguments).await,
        "chat_switch_branch" => handle_switch_branch(state, arguments).await,
        "chat_get_tree" => handle_get_tree(state, arguments).await,
        "chat_regenerate" => handle_regenerate(state, arguments).await,
        "chat_branch_stats" => handle_branch_stats(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Parameter and response types
// ============================================================================

/// Arguments naming a session only.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionParams {
    pub session_id: String,
}

/// Arguments for `chat_send`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendParams {
    pub session_id: String,
    pub message: String,
}

/// Arguments for `chat_switch_branch` and `chat_regenerate`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageParams {
    pub session_id: String,
    pub message_id: String,
}

/// Arguments for `chat_get_tree`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeParams {
    pub session_id: String,
    /// Root of the returned subtree; the session root when absent.
    #[serde(default)]
    pub from_message_id: Option<String>,
}

/// Response for `chat_create_session`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Response for `chat_switch_branch`.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchBranchResponse {
    pub session_id: String,
    pub active_branch: Vec<String>,
    /// The message the branch now ends at.
    pub branched_from: String,
}

/// Response for `chat_branch_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct BranchStatsResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub stats: BranchStats,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle chat_create_session - start an empty conversation
async fn handle_create_session(state: &SharedState) -> McpResult<Value> {
    let session_id = state.store.create_session().await;
    let view = state.store.session_view(&session_id).await.map_err(to_mcp)?;

    serde_json::to_value(CreateSessionResponse {
        session_id,
        created_at: view.created_at,
    })
    .map_err(McpError::Json)
}

/// Handle chat_send - append a user turn and answer it
async fn handle_send(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("chat_send", arguments, |params: SendParams| async move {
        state.chat.send(&params.session_id, &params.message).await
    })
    .await
}

/// Handle chat_get_session - transcript of the active branch
async fn handle_get_session(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("chat_get_session", arguments, |params: SessionParams| async move {
        state.store.session_view(&params.session_id).await
    })
    .await
}

/// Handle chat_switch_branch - make a message's ancestry the active branch
async fn handle_switch_branch(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "chat_switch_branch",
        arguments,
        |params: MessageParams| async move {
            let active_branch = state
                .store
                .switch_branch(&params.session_id, &params.message_id)
                .await?;

            Ok::<_, crate::error::StoreError>(SwitchBranchResponse {
                session_id: params.session_id,
                active_branch,
                branched_from: params.message_id,
            })
        },
    )
    .await
}

/// Handle chat_get_tree - full tree or subtree snapshot
async fn handle_get_tree(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("chat_get_tree", arguments, |params: TreeParams| async move {
        state
            .store
            .tree(&params.session_id, params.from_message_id.as_deref())
            .await
    })
    .await
}

/// Handle chat_regenerate - new assistant reply to an existing user message
async fn handle_regenerate(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("chat_regenerate", arguments, |params: MessageParams| async move {
        state
            .chat
            .regenerate(&params.session_id, &params.message_id)
            .await
    })
    .await
}

/// Handle chat_branch_stats - tree shape summary
async fn handle_branch_stats(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("chat_branch_stats", arguments, |params: SessionParams| async move {
        let stats = state.store.stats(&params.session_id).await?;
        Ok::<_, crate::error::StoreError>(BranchStatsResponse {
            session_id: params.session_id,
            stats,
        })
    })
    .await
}

// ============================================================================
// Helper functions
// ============================================================================

fn to_mcp(e: impl std::fmt::Display) -> McpError {
    McpError::ExecutionFailed {
        message: e.to_string(),
    }
}

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Parse arguments, run the operation, and serialize its result.
///
/// Operation errors become [`McpError::ExecutionFailed`] carrying the
/// error's display text.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: std::fmt::Display,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;
    let result = operation(params).await.map_err(to_mcp)?;
    serde_json::to_value(result).map_err(McpError::Json)
}
