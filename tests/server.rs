mod common;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{batch, log, memory_pipeline, MockEmbedder, MockGenerator};
use facility_rag::pipeline::Pipeline;
use facility_rag::server::router;
use serde_json::{json, Value};
use tempfile::TempDir;

async fn spawn_server(pipeline: Arc<Pipeline>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(pipeline)).await.unwrap();
    });
    addr
}

async fn post_ask(addr: SocketAddr, path: &str, query: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://{}{}", addr, path))
        .json(&json!({ "query": query }))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_reports_lifecycle_state() {
    let tmp = TempDir::new().unwrap();
    let pipeline = Arc::new(memory_pipeline(
        tmp.path(),
        MockEmbedder::new(),
        MockGenerator::new(),
    ));
    let addr = spawn_server(pipeline.clone()).await;

    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["state"], "uninitialized");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    pipeline
        .ingest(&batch(&[log("2024-01-01T10:00:00", "occupied", 5)]), false)
        .await
        .unwrap();
    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["state"], "ready");
}

#[tokio::test]
async fn test_ask_before_ingestion_is_503() {
    let tmp = TempDir::new().unwrap();
    let pipeline = Arc::new(memory_pipeline(
        tmp.path(),
        MockEmbedder::new(),
        MockGenerator::new(),
    ));
    let addr = spawn_server(pipeline).await;

    let (status, body) = post_ask(addr, "/ask", "How many?").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "not_ready");
}

#[tokio::test]
async fn test_ask_returns_answer_and_sources() {
    let tmp = TempDir::new().unwrap();
    let pipeline = Arc::new(memory_pipeline(
        tmp.path(),
        MockEmbedder::new(),
        MockGenerator::new(),
    ));
    pipeline
        .ingest(&batch(&[log("2024-01-01T10:00:00", "occupied", 5)]), false)
        .await
        .unwrap();
    let addr = spawn_server(pipeline).await;

    for path in ["/ask", "/rag"] {
        let (status, body) = post_ask(addr, path, "How many people at 10am?").await;
        assert_eq!(status, 200);
        assert_eq!(body["answer"], "The room held 5 people.");
        let sources = body["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["metadata"]["timestamp"], "2024-01-01T10:00:00");
        assert_eq!(sources[0]["metadata"]["occupancy_count"], 5);
        assert_eq!(
            sources[0]["metadata"]["content_hash"].as_str().unwrap().len(),
            64
        );
    }
}

#[tokio::test]
async fn test_ask_error_mapping() {
    let tmp = TempDir::new().unwrap();
    let generator = MockGenerator::new();
    let pipeline = Arc::new(memory_pipeline(
        tmp.path(),
        MockEmbedder::new(),
        generator.clone(),
    ));
    pipeline
        .ingest(&batch(&[log("2024-01-01T10:00:00", "occupied", 5)]), false)
        .await
        .unwrap();
    let addr = spawn_server(pipeline).await;

    let (status, body) = post_ask(addr, "/ask", "   ").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    for payload in [json!({}), json!({ "query": 5 })] {
        let resp = reqwest::Client::new()
            .post(format!("http://{}/ask", addr))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "{}", payload);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].as_str().unwrap().contains("query"));
    }

    generator.fail.store(true, Ordering::SeqCst);
    let (status, body) = post_ask(addr, "/ask", "How many?").await;
    assert_eq!(status, 504);
    assert_eq!(body["error"]["code"], "backend_timeout");
}
