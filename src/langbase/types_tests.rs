//! Unit tests for Langbase request/response types.

use super::*;
use serde_json::json;

#[test]
fn test_message_constructors() {
    assert_eq!(Message::system("s").role, MessageRole::System);
    assert_eq!(Message::user("u").role, MessageRole::User);

    let msg = Message::assistant("Hi there");
    assert_eq!(msg.role, MessageRole::Assistant);
    assert_eq!(msg.content, "Hi there");
}

#[test]
fn test_message_serialize_lowercase_role() {
    let value = serde_json::to_value(Message::assistant("Hey!")).unwrap();
    assert_eq!(value, json!({"role": "assistant", "content": "Hey!"}));
}

#[test]
fn test_pipe_request_serialize_without_variables() {
    let request = PipeRequest::new(
        "branching-chat-v1",
        vec![Message::user("Hello"), Message::assistant("Hi")],
    );
    let value = serde_json::to_value(&request).unwrap();

    assert_eq!(value["name"], "branching-chat-v1");
    assert_eq!(value["stream"], false);
    assert_eq!(value["messages"].as_array().unwrap().len(), 2);
    assert!(value.get("variables").is_none());
}

#[test]
fn test_pipe_request_with_variable() {
    let request = PipeRequest::new("branch-label-v1", vec![])
        .with_variable("max_chars", "40")
        .with_variable("role", "assistant");

    let vars = request.variables.unwrap();
    assert_eq!(vars.len(), 2);
    assert_eq!(vars.get("max_chars"), Some(&"40".to_string()));
}

#[test]
fn test_pipe_response_deserialize_full() {
    let response: PipeResponse = serde_json::from_value(json!({
        "success": true,
        "completion": "Hi there",
        "threadId": "thread-1",
        "raw": {
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }
    }))
    .unwrap();

    assert!(response.success);
    assert_eq!(response.completion, "Hi there");
    assert_eq!(response.thread_id.as_deref(), Some("thread-1"));
    assert_eq!(response.total_tokens(), Some(13));
}

#[test]
fn test_pipe_response_deserialize_minimal() {
    let response: PipeResponse =
        serde_json::from_value(json!({"success": true, "completion": "ok"})).unwrap();

    assert!(response.thread_id.is_none());
    assert!(response.raw.is_none());
    assert_eq!(response.total_tokens(), None);
}

#[test]
fn test_create_pipe_request_builder_chain() {
    let request = CreatePipeRequest::new("branching-chat-v1")
        .with_description("Chat")
        .with_model("openai:gpt-4o-mini")
        .with_upsert(true)
        .with_json_output(false)
        .with_temperature(1.0)
        .with_max_tokens(5000)
        .with_messages(vec![Message::system("Be helpful")]);

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["name"], "branching-chat-v1");
    assert_eq!(value["upsert"], true);
    assert_eq!(value["json"], false);
    assert_eq!(value["max_tokens"], 5000);
    assert_eq!(value["messages"][0]["role"], "system");
}

#[test]
fn test_create_pipe_request_omits_unset_fields() {
    let value = serde_json::to_value(CreatePipeRequest::new("p")).unwrap();
    assert_eq!(value, json!({"name": "p"}));
}

#[test]
fn test_create_pipe_response_deserialize_partial() {
    let response: CreatePipeResponse = serde_json::from_value(json!({
        "name": "branch-label-v1",
        "url": "https://langbase.com/acme/branch-label-v1"
    }))
    .unwrap();

    assert_eq!(response.name, "branch-label-v1");
    assert!(response.description.is_none());
    assert!(response.url.is_some());
}

#[test]
fn test_message_role_display() {
    assert_eq!(MessageRole::System.to_string(), "system");
    assert_eq!(format!("{}", MessageRole::Assistant), "assistant");
}
