//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::chat::{ChatService, Completion, Labeler, PipeCompletion, PipeLabeler};
use crate::config::Config;
use crate::langbase::LangbaseClient;
use crate::store::SessionStore;

/// Application state shared across handlers.
///
/// Owns the session store; nothing in the process reaches it any other way.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// All chat sessions.
    pub store: Arc<SessionStore>,
    /// User/assistant exchange orchestration.
    pub chat: ChatService,
}

impl AppState {
    /// Create application state backed by the configured Langbase pipes
    pub fn new(config: Config, langbase: LangbaseClient) -> Self {
        tracing::info!(
            chat_pipe = %config.pipes.chat,
            label_pipe = %config.pipes.label,
            labels_enabled = config.labels.enabled,
            "AppState initializing with pipe configuration"
        );

        let completion = Arc::new(PipeCompletion::new(langbase.clone(), &config.pipes.chat));
        let labeler = Arc::new(PipeLabeler::new(
            langbase,
            &config.pipes.label,
            config.labels.max_chars,
        ));

        Self::with_collaborators(config, completion, labeler)
    }

    /// Create application state with explicit collaborators.
    pub fn with_collaborators(
        config: Config,
        completion: Arc<dyn Completion>,
        labeler: Arc<dyn Labeler>,
    ) -> Self {
        let store = Arc::new(SessionStore::new());
        let chat = ChatService::new(
            Arc::clone(&store),
            completion,
            labeler,
            config.labels.clone(),
        );

        Self {
            config,
            store,
            chat,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
