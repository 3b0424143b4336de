//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! This module provides the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Stdio-based server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null if notification, always serialized).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP server information returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// The server name identifier.
    pub name: String,
    /// The server version string.
    pub version: String,
}

/// MCP server capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change dynamically.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the MCP initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// The MCP protocol version supported.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification information.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name (used in tool calls).
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// The name of the tool to invoke.
    pub name: String,
    /// Optional arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type (e.g., "text").
    #[serde(rename = "type")]
    pub content_type: String,
    /// The text content of the result.
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// The result content items.
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Standard JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

const PROTOCOL_VERSION: &str = "2024-11-05";

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Serialize `result` into a success response, or an internal error.
    fn from_serializable(id: Option<Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => {
                error!(error = %e, "Failed to serialize result");
                Self::error(
                    id,
                    error_codes::INTERNAL_ERROR,
                    format!("Internal error: {}", e),
                )
            }
        }
    }
}

impl ToolCallResult {
    /// Pretty JSON body of a successful tool call.
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            error!(error = %e, "Failed to serialize tool result");
            format!("{{\"error\": \"Serialization failed: {}\"}}", e)
        });
        Self::text(text, None)
    }

    /// Failed tool call; the message is shown to the model.
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self::text(format!("Error: {}", message), Some(true))
    }

    fn text(text: String, is_error: Option<bool>) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        }
    }
}

/// MCP server reading newline-delimited JSON-RPC from stdin.
///
/// Responses go to stdout, one per line; logs go to stderr.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Branching chat MCP server starting");

        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(trimmed).await else {
                continue;
            };

            let response_json = serde_json::to_string(&response)?;
            debug!(response = %response_json, "Sending response");

            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }

    /// Handle one raw line from stdin.
    ///
    /// Returns `None` when nothing should be written back (notifications).
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        debug!(request = %line, "Received request");

        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                error!(error = %e, "Failed to parse request");
                Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest { id, method, params, .. } = request;

        match method.as_str() {
            "initialize" => Some(initialize(id)),
            "initialized" | "notifications/cancelled" => {
                debug!(method = %method, "Notification received");
                None
            }
            "tools/list" => {
                info!("Handling tools/list request");
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::json!({ "tools": chat_tools() }),
                ))
            }
            "tools/call" => Some(self.call_tool(id, params).await),
            "ping" => Some(JsonRpcResponse::success(
                id,
                Value::Object(Default::default()),
            )),
            _ if id.is_none() => {
                debug!(method = %method, "Unknown notification, ignoring");
                None
            }
            _ => {
                error!(method = %method, "Unknown method");
                Some(JsonRpcResponse::error(
                    id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                ))
            }
        }
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Missing params");
        };
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let result = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(value) => ToolCallResult::json(&value),
            Err(e) => ToolCallResult::failure(e),
        };
        JsonRpcResponse::from_serializable(id, result)
    }
}

fn initialize(id: Option<Value>) -> JsonRpcResponse {
    info!("Handling initialize request");

    JsonRpcResponse::from_serializable(
        id,
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        },
    )
}

/// Object schema with the given properties, all listed in `required`
/// except those named in `optional`.
fn object_schema(properties: &[(&str, Value)], optional: &[&str]) -> Value {
    let required: Vec<&str> = properties
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !optional.contains(name))
        .collect();
    let properties: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn string_field(description: &str) -> Value {
    serde_json::json!({ "type": "string", "description": description })
}

fn session_id_field() -> (&'static str, Value) {
    ("session_id", string_field("Session ID returned by chat_create_session"))
}

fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Every tool this server exposes, in `tools/list` order.
pub fn chat_tools() -> Vec<Tool> {
    vec![
        tool(
            "chat_create_session",
            "Start a new, empty branching conversation and return its session ID.",
            object_schema(&[], &[]),
        ),
        tool(
            "chat_send",
            "Send a user message after the end of the active branch and get the assistant's reply. \
             The model sees exactly the active branch as the conversation.",
            object_schema(
                &[
                    session_id_field(),
                    (
                        "message",
                        serde_json::json!({
                            "type": "string",
                            "minLength": 1,
                            "description": "The user message"
                        }),
                    ),
                ],
                &[],
            ),
        ),
        tool(
            "chat_get_session",
            "Get the messages along the active branch, root first, with their labels.",
            object_schema(&[session_id_field()], &[]),
        ),
        tool(
            "chat_switch_branch",
            "Rewind to any message in the tree. Its ancestry becomes the active branch and the \
             next message continues from it; other branches are kept.",
            object_schema(
                &[
                    session_id_field(),
                    ("message_id", string_field("Message that should end the active branch")),
                ],
                &[],
            ),
        ),
        tool(
            "chat_get_tree",
            "Get the whole conversation tree (or the subtree under one message) for \
             visualization, plus the active branch.",
            object_schema(
                &[
                    session_id_field(),
                    (
                        "from_message_id",
                        string_field("Optional subtree root; defaults to the first message"),
                    ),
                ],
                &["from_message_id"],
            ),
        ),
        tool(
            "chat_regenerate",
            "Ask for another reply to an existing user message. The new reply becomes a sibling \
             branch and the active branch moves onto it.",
            object_schema(
                &[session_id_field(), ("message_id", string_field("ID of a user message"))],
                &[],
            ),
        ),
        tool(
            "chat_branch_stats",
            "Summarize the tree: message count, number of branches, active branch length, and \
             the deepest leaf to return to.",
            object_schema(&[session_id_field()], &[]),
        ),
    ]
}
