//! Integration tests for the Ollama REST client against a mock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yomi_ollama::types::{ChatOptions, ChatRequest, ChatRole};
use yomi_ollama::{OllamaApi, OllamaApiError, OllamaConfig};

fn api_for(server: &MockServer) -> OllamaApi {
    OllamaApi::new(OllamaConfig {
        base_url: server.uri(),
        default_model: "qwen3:8b".to_string(),
        chat_timeout: Duration::from_secs(5),
        control_timeout: Duration::from_secs(5),
    })
    .expect("client should build")
}

// ---------------------------------------------------------------------------
// Model listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_models_parses_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "qwen3:8b", "size": 5_200_000_000u64},
                {"name": "llama3:8b"}
            ]
        })))
        .mount(&server)
        .await;

    let models = api_for(&server).list_models().await.unwrap();
    let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["qwen3:8b", "llama3:8b"]);
    assert_eq!(models[1].size, 0);
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = api_for(&server).list_models().await.unwrap_err();
    match err {
        OllamaApiError::ApiError { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_sends_options_and_returns_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen3:8b",
            "stream": false,
            "options": {"num_ctx": 4096}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen3:8b",
            "message": {"role": "assistant", "content": "Bonjour"},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = ChatOptions {
        num_ctx: 4096,
        ..ChatOptions::default()
    };
    let request = ChatRequest::new("qwen3:8b", "Translate.", "こんにちは", options);
    let response = api_for(&server).chat(&request).await.unwrap();

    assert_eq!(response.message.role, ChatRole::Assistant);
    assert_eq!(response.message.content, "Bonjour");
    assert!(response.done);
}

// ---------------------------------------------------------------------------
// Unloading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unload_running_models_sends_zero_keep_alive_per_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "qwen3:8b", "size_vram": 6_000_000_000u64},
                {"name": "llama3:8b", "size_vram": 5_000_000_000u64}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"keep_alive": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .expect(2)
        .mount(&server)
        .await;

    let unloaded = api_for(&server).unload_running_models().await.unwrap();
    assert_eq!(unloaded, 2);
}

#[tokio::test]
async fn failed_unload_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "qwen3:8b"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let unloaded = api_for(&server).unload_running_models().await.unwrap();
    assert_eq!(unloaded, 0);
}

#[tokio::test]
async fn connection_refused_is_unreachable() {
    // Nothing listens on this port once the server is dropped.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let api = OllamaApi::new(OllamaConfig {
        base_url: uri,
        ..OllamaConfig::default()
    })
    .unwrap();

    let err = api.list_models().await.unwrap_err();
    assert!(err.is_unreachable(), "expected unreachable, got {err:?}");
}

// ---------------------------------------------------------------------------
// Model availability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ensure_model_accepts_latest_tag_and_rejects_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "qwen3:latest"}, {"name": "llama3:8b"}]
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.ensure_model("qwen3").await.unwrap();
    api.ensure_model("llama3:8b").await.unwrap();

    match api.ensure_model("mistral").await.unwrap_err() {
        OllamaApiError::ModelNotFound { model, available } => {
            assert_eq!(model, "mistral");
            assert_eq!(available, ["qwen3:latest", "llama3:8b"]);
        }
        other => panic!("expected ModelNotFound, got {other:?}"),
    }
}
