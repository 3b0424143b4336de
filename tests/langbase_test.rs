//! Integration tests for Langbase client and the pipe-backed collaborators
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use branching_chat::chat::{Completion, LabelRequest, Labeler, PipeCompletion, PipeLabeler};
use branching_chat::config::{LangbaseConfig, RequestConfig};
use branching_chat::error::LangbaseError;
use branching_chat::langbase::{CreatePipeRequest, LangbaseClient, Message, PipeRequest};
use branching_chat::store::Role;

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> LangbaseClient {
    let config = LangbaseConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 2000,
        max_retries,
        retry_delay_ms: 10,
    };

    LangbaseClient::new(&config, request_config).expect("Failed to create client")
}

fn completion_body(text: &str) -> serde_json::Value {
    json!({"success": true, "completion": text})
}

#[cfg(test)]
mod pipe_call_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_pipe_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({
                "name": "branching-chat-v1",
                "stream": false,
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "Hi there",
                "threadId": "thread-123",
                "raw": {"usage": {"total_tokens": 12}}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let request = PipeRequest::new("branching-chat-v1", vec![Message::user("Hello")]);
        let response = client.call_pipe(request).await.unwrap();

        assert_eq!(response.completion, "Hi there");
        assert_eq!(response.thread_id.as_deref(), Some("thread-123"));
        assert_eq!(response.total_tokens(), Some(12));
    }

    #[tokio::test]
    async fn test_authentication_error_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client
            .call_pipe(PipeRequest::new("p", vec![Message::user("x")]))
            .await
            .unwrap_err();

        assert!(matches!(err, LangbaseError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let response = client
            .call_pipe(PipeRequest::new("p", vec![Message::user("x")]))
            .await
            .unwrap();

        assert_eq!(response.completion, "ok");
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let err = client
            .call_pipe(PipeRequest::new("p", vec![Message::user("x")]))
            .await
            .unwrap_err();

        match err {
            LangbaseError::Unavailable { retries, message } => {
                assert_eq!(retries, 3);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let err = client
            .call_pipe(PipeRequest::new("p", vec![Message::user("x")]))
            .await
            .unwrap_err();

        assert!(matches!(err, LangbaseError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let config = LangbaseConfig {
            api_key: "test-api-key".to_string(),
            base_url: mock_server.uri(),
        };
        let client = LangbaseClient::new(
            &config,
            RequestConfig {
                timeout_ms: 50,
                max_retries: 0,
                retry_delay_ms: 10,
            },
        )
        .unwrap();

        let err = client
            .call_pipe(PipeRequest::new("p", vec![Message::user("x")]))
            .await
            .unwrap_err();

        // A single attempt that timed out is reported once retries are exhausted.
        assert!(matches!(err, LangbaseError::Unavailable { .. }));
        assert!(err.to_string().contains("timeout"));
    }
}

#[cfg(test)]
mod pipe_management_tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_pipe_created() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .and(body_partial_json(json!({"name": "branching-chat-v1", "upsert": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "branching-chat-v1",
                "status": "public"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        client
            .ensure_pipe(PipeCompletion::pipe_definition("branching-chat-v1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_pipe_conflict_is_ok() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Pipe already exists"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        assert!(client
            .ensure_pipe(CreatePipeRequest::new("branch-label-v1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_ensure_pipe_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let err = client
            .ensure_pipe(CreatePipeRequest::new("branch-label-v1"))
            .await
            .unwrap_err();

        assert!(matches!(err, LangbaseError::Api { status: 500, .. }));
    }
}

#[cfg(test)]
mod collaborator_tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_completion_returns_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_partial_json(json!({
                "name": "branching-chat-v1",
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi there"},
                    {"role": "user", "content": "Tell me a joke"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("**Why** not?")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let completion = PipeCompletion::new(
            create_test_client(&mock_server.uri(), 0),
            "branching-chat-v1",
        );
        let text = completion
            .complete(vec![
                Message::user("Hello"),
                Message::assistant("Hi there"),
                Message::user("Tell me a joke"),
            ])
            .await
            .unwrap();

        assert_eq!(text, "**Why** not?");
    }

    #[tokio::test]
    async fn test_pipe_completion_rejects_empty_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  ")))
            .mount(&mock_server)
            .await;

        let completion = PipeCompletion::new(create_test_client(&mock_server.uri(), 0), "p");
        let err = completion
            .complete(vec![Message::user("Hello")])
            .await
            .unwrap_err();

        assert!(matches!(err, LangbaseError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_pipe_labeler_sends_max_chars_and_sanitizes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_partial_json(json!({
                "name": "branch-label-v1",
                "variables": {"max_chars": "24"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("\"Label: Chicken crossing joke.\"")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let labeler = PipeLabeler::new(
            create_test_client(&mock_server.uri(), 0),
            "branch-label-v1",
            24,
        );
        let label = labeler
            .label(LabelRequest {
                content: "Why did the chicken cross the road?".to_string(),
                role: Role::Assistant,
                context: vec![Message::user("Tell me a joke")],
            })
            .await
            .unwrap();

        assert_eq!(label, "Chicken crossing joke");
    }
}
