//! Integration tests for the Anthropic provider
//!
//! Tests behavioral contracts against a mock HTTP server:
//! - request shape (headers, system field, defaults)
//! - response handling (text blocks, usage, stop reasons)
//! - error mapping by HTTP status, without retries

use geo_crew::llm::provider::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};
use geo_crew::llm::providers::anthropic::{AnthropicConfig, AnthropicProvider};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "claude-sonnet-4-5";

fn provider(base_url: &str) -> AnthropicProvider {
    AnthropicProvider::new(AnthropicConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        version: "2023-06-01".to_string(),
        model: MODEL.to_string(),
    })
    .unwrap()
}

fn test_request() -> CompletionRequest {
    let mut request = CompletionRequest::new(MODEL, vec![Message::user("Assess BH-01")]);
    request.max_tokens = Some(100);
    request.temperature = Some(0.3);
    request
}

fn text_response(blocks: &[&str], stop_reason: &str) -> serde_json::Value {
    json!({
        "id": "msg_123",
        "type": "message",
        "role": "assistant",
        "content": blocks.iter().map(|t| json!({"type": "text", "text": t})).collect::<Vec<_>>(),
        "model": MODEL,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": 10, "output_tokens": 15}
    })
}

async fn server_responding(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_anthropic_provider_returns_successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["Dense sand."], "end_turn")))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server.uri()).complete(test_request()).await.unwrap();

    assert_eq!(response.content.as_deref(), Some("Dense sand."));
    assert_eq!(response.model, MODEL);
    assert_eq!(response.usage.prompt_tokens, 10);
    assert_eq!(response.usage.completion_tokens, 15);
    assert_eq!(response.usage.total_tokens, 25);
    assert_eq!(response.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn test_anthropic_provider_joins_multiple_text_blocks() {
    let server = server_responding(
        ResponseTemplate::new(200).set_body_json(text_response(&["First part. ", "Second part."], "end_turn")),
    )
    .await;

    let response = provider(&server.uri()).complete(test_request()).await.unwrap();
    assert_eq!(response.content.as_deref(), Some("First part. Second part."));
}

#[tokio::test]
async fn test_anthropic_provider_sends_system_message_as_system_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "system": "You are a geotechnical engineer.",
            "messages": [{"role": "user", "content": "Assess BH-01"}],
            "max_tokens": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["ok"], "end_turn")))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = test_request();
    request
        .messages
        .insert(0, Message::system("You are a geotechnical engineer."));

    assert!(provider(&server.uri()).complete(request).await.is_ok());
}

#[tokio::test]
async fn test_anthropic_provider_defaults_max_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"max_tokens": 4096})))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["ok"], "end_turn")))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new(MODEL, vec![Message::user("hi")]);
    assert!(provider(&server.uri()).complete(request).await.is_ok());
}

#[tokio::test]
async fn test_anthropic_provider_maps_401_to_authentication_failure() {
    let server = server_responding(ResponseTemplate::new(401).set_body_string("Invalid API key")).await;

    match provider(&server.uri()).complete(test_request()).await {
        Err(LlmError::AuthenticationFailed(msg)) => assert!(msg.contains("Invalid API key")),
        other => panic!("Expected AuthenticationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_anthropic_provider_maps_429_to_rate_limit() {
    let server = server_responding(ResponseTemplate::new(429).set_body_string("Rate limit exceeded")).await;

    let result = provider(&server.uri()).complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::RateLimitExceeded(_))));
}

#[tokio::test]
async fn test_anthropic_provider_does_not_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("Overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    match provider(&server.uri()).complete(test_request()).await {
        Err(LlmError::ApiError(msg)) => {
            assert!(msg.contains("529"));
            assert!(msg.contains("Overloaded"));
        }
        other => panic!("Expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_anthropic_provider_rejects_response_without_text() {
    let server = server_responding(ResponseTemplate::new(200).set_body_json(json!({
        "content": [],
        "model": MODEL,
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 0}
    })))
    .await;

    let result = provider(&server.uri()).complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(msg)) if msg.contains("No text content")));
}

#[tokio::test]
async fn test_anthropic_provider_converts_max_tokens_stop_reason() {
    let server = server_responding(
        ResponseTemplate::new(200).set_body_json(text_response(&["Truncated"], "max_tokens")),
    )
    .await;

    let response = provider(&server.uri()).complete(test_request()).await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn test_anthropic_provider_returns_error_when_json_parsing_fails() {
    let server = server_responding(ResponseTemplate::new(200).set_body_string("not json")).await;

    let result = provider(&server.uri()).complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_anthropic_provider_preserves_request_metadata() {
    let server = server_responding(
        ResponseTemplate::new(200).set_body_json(text_response(&["ok"], "end_turn")),
    )
    .await;

    let mut request = test_request();
    request
        .metadata
        .insert("agent_role".to_string(), "Reviewer".to_string());

    let response = provider(&server.uri()).complete(request).await.unwrap();
    assert_eq!(response.metadata.get("agent_role").map(String::as_str), Some("Reviewer"));
}

#[tokio::test]
async fn test_anthropic_health_check_succeeds_when_api_available() {
    let server = server_responding(
        ResponseTemplate::new(200).set_body_json(text_response(&["H"], "max_tokens")),
    )
    .await;

    assert!(provider(&server.uri()).health_check().await.is_ok());
}

#[tokio::test]
async fn test_anthropic_health_check_uses_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"model": "gateway/claude-custom", "max_tokens": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["H"], "max_tokens")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new(AnthropicConfig {
        api_key: "test-api-key".to_string(),
        base_url: server.uri(),
        model: "gateway/claude-custom".to_string(),
        ..AnthropicConfig::default()
    })
    .unwrap();

    assert!(provider.health_check().await.is_ok());
}

#[tokio::test]
async fn test_anthropic_health_check_fails_when_auth_invalid() {
    let server = server_responding(ResponseTemplate::new(403).set_body_string("forbidden")).await;

    let result = provider(&server.uri()).health_check().await;
    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[test]
fn test_anthropic_provider_creation_requires_api_key() {
    match AnthropicProvider::new(AnthropicConfig::default()) {
        Err(LlmError::NotConfigured(msg)) => assert!(msg.contains("API key")),
        _ => panic!("Expected NotConfigured error"),
    }
}
