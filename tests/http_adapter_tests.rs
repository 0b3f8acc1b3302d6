// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Daemon and cloud adapters against a scripted HTTP backend.

use std::sync::Arc;

use futures::StreamExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchboard::config::{CloudConfig, DaemonConfig};
use switchboard::orchestrator::{Orchestrator, RetryConfig, TurnRequest};
use switchboard::providers::{CloudProvider, DaemonProvider};
use switchboard::telemetry::RecordingTelemetry;
use switchboard::{
    CancelSignal, FinishReason, GatewayError, GenerateOptions, LanguageModel,
};

fn daemon_at(server: &MockServer) -> DaemonProvider {
    DaemonProvider::new(DaemonConfig {
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    })
}

fn cloud_at(server: &MockServer) -> CloudProvider {
    CloudProvider::new(
        CloudConfig {
            base_url: format!("{}/v1", server.uri()),
            ..Default::default()
        },
        "sk-test".to_string(),
    )
}

#[tokio::test]
async fn daemon_generate_text_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.2:latest",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"message": {"content": "Hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 4, "completion_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = daemon_at(&server)
        .generate_text(GenerateOptions::new("Hi"))
        .await
        .unwrap();

    assert_eq!(response.text(), "Hi there");
    assert_eq!(response.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(response.usage().unwrap().total_tokens(), 7);
}

#[tokio::test]
async fn unknown_model_404_is_not_retryable_and_names_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"error": "Model not found"})),
        )
        .mount(&server)
        .await;

    let err = daemon_at(&server)
        .generate_text(GenerateOptions::new("Hi"))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert!(err.to_string().contains("404"));
    assert!(err.to_string().contains("Model not found"));
}

#[tokio::test]
async fn non_retryable_http_error_surfaces_without_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"error": "Model not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let telemetry = Arc::new(RecordingTelemetry::new());
    let orchestrator = Orchestrator::new(
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 5,
            max_delay_ms: 20,
            jitter: 0.0,
        },
        telemetry.clone(),
    )
    .register(
        "daemon",
        "Local Model",
        "llama3.2:latest",
        Arc::new(daemon_at(&server)) as Arc<dyn LanguageModel>,
    );

    let err = orchestrator
        .generate(TurnRequest::from_text("Hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Provider { .. }));
    assert_eq!(telemetry.count_action("attempt"), 1);
    assert_eq!(telemetry.count_action("retry"), 0);
}

#[tokio::test]
async fn malformed_success_body_is_an_invalid_response_error() {
    let server = MockServer::start().await;
    // valid JSON, but not the response shape: no choices field
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"object": "list"})),
        )
        .mount(&server)
        .await;

    let err = daemon_at(&server)
        .generate_text(GenerateOptions::new("Hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Provider { .. }));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("invalid response"));
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = daemon_at(&server)
        .generate_text(GenerateOptions::new("Hi"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn daemon_streams_chunks_then_finish() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],",
        "\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":2}}\n\n",
        "data: [DONE]\n\n",
    );
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = daemon_at(&server)
        .stream_text(GenerateOptions::new("Hi"), CancelSignal::none())
        .await
        .unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.unwrap());
    }

    assert_eq!(chunks.len(), 3);
    let text: String = chunks.iter().map(|c| c.text()).collect();
    assert_eq!(text, "Hello");
    assert_eq!(chunks[2].finish_reason(), Some(FinishReason::Stop));
    assert_eq!(chunks[2].usage().unwrap().output_tokens, 2);
}

#[tokio::test]
async fn stream_setup_maps_http_errors_before_any_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(
                serde_json::json!({"error": {"message": "Rate limit exceeded"}}),
            ),
        )
        .mount(&server)
        .await;

    let err = daemon_at(&server)
        .stream_text(GenerateOptions::new("Hi"), CancelSignal::none())
        .await
        .err()
        .unwrap();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("Rate limit"));
}

#[tokio::test]
async fn daemon_lists_local_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "llama3.2:latest"}, {"id": "qwen2.5:7b"}]
        })))
        .mount(&server)
        .await;

    let daemon = daemon_at(&server);
    daemon.health_check().await.unwrap();
    let models = daemon.list_local_models().await.unwrap();
    assert_eq!(models, vec!["llama3.2:latest", "qwen2.5:7b"]);
}

#[tokio::test]
async fn cloud_sends_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "ok"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = cloud_at(&server)
        .generate_text(GenerateOptions::new("Hi"))
        .await
        .unwrap();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn cloud_generate_structured_parses_schema_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_schema"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"content": "{\"city\": \"Lisbon\", \"sunny\": true}"},
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let value = cloud_at(&server)
        .generate_structured(
            GenerateOptions::new("Where?"),
            &serde_json::json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        )
        .await
        .unwrap();

    assert_eq!(value["city"], "Lisbon");
    assert_eq!(value["sunny"], true);
}

#[tokio::test]
async fn cloud_structured_rejects_non_json_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "not json at all"}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let err = cloud_at(&server)
        .generate_structured(GenerateOptions::new("Where?"), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("not valid JSON"));
}

#[tokio::test]
async fn context_length_errors_map_to_context_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "This model's maximum context length is 8192 tokens",
                      "code": "context_length_exceeded"}
        })))
        .mount(&server)
        .await;

    let err = cloud_at(&server)
        .generate_text(GenerateOptions::new("very long prompt"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ContextWindow { .. }));
    assert!(!err.is_retryable());
}
