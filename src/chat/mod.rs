//! Chat orchestration on top of the session store.
//!
//! This module provides:
//! - [`Completion`] and [`Labeler`] traits for the two external collaborators
//! - Langbase pipe implementations of both ([`PipeCompletion`], [`PipeLabeler`])
//! - Detached label generation with a deterministic local fallback
//! - [`ChatService`] which runs a full user/assistant exchange

mod labels;
mod service;

pub use labels::{fallback_label, generate_label, sanitize_label, spawn_label_task, LabelRequest};
pub use service::{ChatReply, ChatService};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{LangbaseError, LangbaseResult};
use crate::langbase::{CreatePipeRequest, LangbaseClient, Message, PipeRequest};
use crate::prompts::{
    CHAT_SYSTEM_PROMPT, LABEL_CONTEXT_HEADER, LABEL_SYSTEM_PROMPT, LABEL_TARGET_HEADER,
};
use crate::store::{MessageNode, Role};

/// Turns an ordered conversation into the assistant's next reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Completion: Send + Sync {
    /// Generate a reply for `turns`, oldest first.
    async fn complete(&self, turns: Vec<Message>) -> LangbaseResult<String>;
}

/// Proposes a short caption for a message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Labeler: Send + Sync {
    /// Suggest a caption; may return an empty string when it has nothing useful.
    async fn label(&self, request: LabelRequest) -> LangbaseResult<String>;
}

/// Convert stored messages into pipe turns, preserving order.
pub fn to_turns(nodes: &[MessageNode]) -> Vec<Message> {
    nodes
        .iter()
        .map(|node| match node.role {
            Role::User => Message::user(node.content.clone()),
            Role::Assistant => Message::assistant(node.content.clone()),
        })
        .collect()
}

/// [`Completion`] backed by a Langbase pipe.
#[derive(Clone)]
pub struct PipeCompletion {
    langbase: LangbaseClient,
    pipe_name: String,
}

impl PipeCompletion {
    /// Create a completion collaborator calling `pipe_name`.
    pub fn new(langbase: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            langbase,
            pipe_name: pipe_name.into(),
        }
    }

    /// Upsert definition for the chat pipe.
    pub fn pipe_definition(pipe_name: &str) -> CreatePipeRequest {
        CreatePipeRequest::new(pipe_name)
            .with_description("Branching chat assistant")
            .with_model("openai:gpt-4o-mini")
            .with_upsert(true)
            .with_json_output(false)
            .with_temperature(0.7)
            .with_max_tokens(2000)
            .with_messages(vec![Message::system(CHAT_SYSTEM_PROMPT)])
    }
}

#[async_trait]
impl Completion for PipeCompletion {
    async fn complete(&self, turns: Vec<Message>) -> LangbaseResult<String> {
        debug!(pipe = %self.pipe_name, turns = turns.len(), "Requesting completion");

        let response = self
            .langbase
            .call_pipe(PipeRequest::new(&self.pipe_name, turns))
            .await?;

        if response.completion.trim().is_empty() {
            return Err(LangbaseError::InvalidResponse {
                message: "Empty completion".to_string(),
            });
        }
        Ok(response.completion)
    }
}

/// [`Labeler`] backed by a Langbase pipe.
#[derive(Clone)]
pub struct PipeLabeler {
    langbase: LangbaseClient,
    pipe_name: String,
    max_chars: usize,
}

impl PipeLabeler {
    /// Create a label collaborator calling `pipe_name`.
    pub fn new(langbase: LangbaseClient, pipe_name: impl Into<String>, max_chars: usize) -> Self {
        Self {
            langbase,
            pipe_name: pipe_name.into(),
            max_chars,
        }
    }

    /// Upsert definition for the label pipe.
    pub fn pipe_definition(pipe_name: &str) -> CreatePipeRequest {
        CreatePipeRequest::new(pipe_name)
            .with_description("Short captions for branching chat messages")
            .with_model("openai:gpt-4o-mini")
            .with_upsert(true)
            .with_json_output(false)
            .with_temperature(0.3)
            .with_max_tokens(32)
            .with_messages(vec![Message::system(LABEL_SYSTEM_PROMPT)])
    }

    fn build_messages(request: &LabelRequest) -> Vec<Message> {
        let mut prompt = String::new();

        if !request.context.is_empty() {
            prompt.push_str(LABEL_CONTEXT_HEADER);
            prompt.push('\n');
            for turn in &request.context {
                prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "{} ({}):\n{}",
            LABEL_TARGET_HEADER, request.role, request.content
        ));

        vec![Message::user(prompt)]
    }
}

#[async_trait]
impl Labeler for PipeLabeler {
    async fn label(&self, request: LabelRequest) -> LangbaseResult<String> {
        let pipe_request = PipeRequest::new(&self.pipe_name, Self::build_messages(&request))
            .with_variable("max_chars", self.max_chars.to_string());

        let response = self.langbase.call_pipe(pipe_request).await?;
        Ok(sanitize_label(&response.completion, self.max_chars))
    }
}
