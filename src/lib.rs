//! # Branching Chat
//!
//! A Model Context Protocol (MCP) server for conversations that branch: the
//! user can rewind to any earlier message and continue from there, and every
//! path taken is kept as part of a message tree.
//!
//! ## Features
//!
//! - **Message Tree**: Every turn is a node linked to its parent; nothing is ever overwritten
//! - **Active Branch**: One root-to-node path is "the conversation" the model sees
//! - **Branch Switching**: Rewind to any message, then continue along a new path
//! - **Regenerate**: Ask again for a reply to an existing user message
//! - **Tree Snapshots**: Whole tree or subtree for visualization
//! - **Labels**: Short captions per message, generated in the background
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Langbase Pipes (HTTP)
//!                    ↓
//!          In-memory SessionStore
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use branching_chat::{Config, AppState, McpServer};
//! use branching_chat::langbase::LangbaseClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let langbase = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let state = Arc::new(AppState::new(config, langbase));
//!     let server = McpServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Chat orchestration: completion, labeling, and exchanges.
pub mod chat;
/// Command-line interface definitions.
pub mod cli;
/// Configuration management for the MCP server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// System prompts for Langbase pipes.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// In-memory branching conversation store.
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
pub use store::{SessionStore, TreeNode};
