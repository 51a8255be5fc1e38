//! JSON-RPC surface over HTTP, backed by SQLite

mod common;

use common::Engine;
use quillforge_api_rpc::error::code;
use quillforge_api_rpc::{RateLimitConfig, RpcServer, RpcServerConfig};
use quillforge_core::port::generation_client::mocks::MockGenerationClient;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

async fn call(addr: SocketAddr, method: &str, params: Value) -> Value {
    reqwest::Client::new()
        .post(format!("http://{}", addr))
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn start(
    engine: &Engine,
    rate_limit: RateLimitConfig,
) -> (SocketAddr, jsonrpsee::server::ServerHandle) {
    let config = RpcServerConfig {
        port: 0,
        rate_limit,
        ..RpcServerConfig::default()
    };
    RpcServer::new(config, engine.service.clone(), engine.active_users.clone())
        .start()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_submit_process_and_inspect() {
    let engine = Engine::with_mock(Arc::new(MockGenerationClient::new())).await;
    engine.seed_user("user-1", 10_000, 20).await;
    let (addr, handle) = start(&engine, RateLimitConfig::default()).await;

    let created = call(
        addr,
        "batch.create.v1",
        json!({
            "user_id": "user-1",
            "job_type": "keywords-batch",
            "lines": ["green tea", "", "oolong"],
            "settings": { "tone": "casual", "length": "short" }
        }),
    )
    .await;
    let job_id = created["result"]["job_id"].as_str().unwrap().to_string();
    assert_eq!(created["result"]["status"], "pending");
    assert_eq!(created["result"]["total_items"], 2);

    engine.run_pending().await;

    let status = call(addr, "batch.status.v1", json!({ "job_id": job_id })).await;
    assert_eq!(status["result"]["status"], "completed");
    assert_eq!(status["result"]["completed_items"], 2);
    assert_eq!(status["result"]["progress_percent"], 100);
    assert_eq!(status["result"]["produced_ids"].as_array().unwrap().len(), 2);

    let stats = call(addr, "admin.stats.v1", json!({})).await;
    assert_eq!(stats["result"]["total_jobs"], 1);
    assert_eq!(stats["result"]["completed_jobs"], 1);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_error_codes_over_the_wire() {
    let engine = Engine::with_mock(Arc::new(MockGenerationClient::new())).await;
    engine.seed_user("user-1", 10_000, 20).await;
    let (addr, handle) = start(
        &engine,
        RateLimitConfig {
            burst: 1,
            per_second: 1,
        },
    )
    .await;

    let missing = call(addr, "batch.status.v1", json!({ "job_id": "nope" })).await;
    assert_eq!(missing["error"]["code"], code::NOT_FOUND);

    let empty = call(
        addr,
        "batch.create.v1",
        json!({ "user_id": "user-1", "job_type": "keywords-batch", "lines": ["  "] }),
    )
    .await;
    assert_eq!(empty["error"]["code"], code::VALIDATION_ERROR);

    // The rejected request above used the only token
    let throttled = call(
        addr,
        "batch.create.v1",
        json!({ "user_id": "user-1", "job_type": "keywords-batch", "lines": ["tea"] }),
    )
    .await;
    assert_eq!(throttled["error"]["code"], code::THROTTLED);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_control_round_trip() {
    let engine = Engine::with_mock(Arc::new(MockGenerationClient::new())).await;
    engine.seed_user("user-1", 10_000, 20).await;
    let (addr, handle) = start(&engine, RateLimitConfig::default()).await;

    let created = call(
        addr,
        "batch.create.v1",
        json!({ "user_id": "user-1", "job_type": "keywords-batch", "lines": ["tea"] }),
    )
    .await;
    let job_id = created["result"]["job_id"].clone();

    let paused = call(addr, "batch.pause.v1", json!({ "job_id": job_id })).await;
    assert_eq!(paused["result"]["status"], "paused");

    let resumed = call(addr, "batch.resume.v1", json!({ "job_id": job_id })).await;
    assert_eq!(resumed["result"]["status"], "pending");

    let cancelled = call(addr, "batch.cancel.v1", json!({ "job_id": job_id })).await;
    assert_eq!(cancelled["result"]["status"], "cancelled");

    let again = call(addr, "batch.resume.v1", json!({ "job_id": job_id })).await;
    assert_eq!(again["error"]["code"], code::CONFLICT);

    handle.stop().unwrap();
}
