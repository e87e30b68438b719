mod common;

use axum::http::StatusCode;
use common::{build_test_app, get, TestOptions};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};
use yomi_gpu::MemoryInfo;

// -- LLM introspection ---------------------------------------------------

#[tokio::test]
async fn lists_models_with_default() {
    let t = build_test_app(TestOptions::default()).await;
    t.mount_models(&["qwen3:8b", "llama3:8b"]).await;

    let (status, json) = get(&t.app, "/api/v1/llm/models").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["default_model"], "qwen3:8b");
    let names: Vec<&str> = json["data"]["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["qwen3:8b", "llama3:8b"]);
}

#[tokio::test]
async fn lists_running_models() {
    let t = build_test_app(TestOptions::default()).await;
    Mock::given(method("GET"))
        .and(path("/api/ps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "qwen3:8b", "size": 6_000_000_000u64, "size_vram": 5_500_000_000u64 }]
        })))
        .mount(&t.llm)
        .await;

    let (status, json) = get(&t.app, "/api/v1/llm/running").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["name"], "qwen3:8b");
    assert_eq!(json["data"][0]["size_vram"], 5_500_000_000u64);
}

#[tokio::test]
async fn llm_failure_is_bad_gateway() {
    let t = build_test_app(TestOptions::default()).await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&t.llm)
        .await;

    let (status, json) = get(&t.app, "/api/v1/llm/models").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "LLM_UNAVAILABLE");
    // Upstream body is not leaked.
    assert!(!json["error"].as_str().unwrap().contains("boom"));
}

// -- GPU -----------------------------------------------------------------

#[tokio::test]
async fn reports_gpu_memory() {
    let t = build_test_app(TestOptions {
        memory: MemoryInfo {
            free: 6 << 30,
            total: 8 << 30,
        },
        ..TestOptions::default()
    })
    .await;

    let (status, json) = get(&t.app, "/api/v1/gpu/memory").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["available"], true);
    assert_eq!(json["data"]["free_bytes"], 6u64 << 30);
    assert_eq!(json["data"]["total_bytes"], 8u64 << 30);
    assert_eq!(json["data"]["busy"], false);
}

#[tokio::test]
async fn gpu_memory_without_device() {
    let t = build_test_app(TestOptions::default()).await;
    let (_, json) = get(&t.app, "/api/v1/gpu/memory").await;
    assert_eq!(json["data"]["available"], false);
}
