//! Pause, cancel and shutdown observed by a running worker

mod common;

use common::{Engine, GatedClient};
use quillforge_core::application::{shutdown_channel, WorkerOutcome};
use quillforge_core::domain::{JobStatus, JobType};
use quillforge_core::error::AppError;
use quillforge_core::port::content_fetcher::mocks::MockContentFetcher;
use std::sync::Arc;

const LINES: [&str; 3] = ["alpha", "beta", "gamma"];

async fn gated_engine() -> (Arc<GatedClient>, Engine) {
    let client = Arc::new(GatedClient::new("beta"));
    let engine = Engine::new(client.clone(), Arc::new(MockContentFetcher::new())).await;
    engine.seed_user("user-1", 10_000, 20).await;
    (client, engine)
}

#[tokio::test]
async fn test_cancel_mid_job_drops_in_flight_item() {
    let (client, engine) = gated_engine().await;
    let job = engine.submit("user-1", JobType::KeywordsBatch, &LINES).await;

    assert_eq!(engine.dispatcher.tick().await.unwrap(), 1);
    client.wait_reached().await;

    let cancelled = engine.service.cancel(&job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    client.release();
    engine.dispatcher.drain().await;

    let done = engine.job(&job.id).await;
    assert_eq!(done.status, JobStatus::Cancelled);
    assert_eq!(done.error_message.as_deref(), Some("Cancelled by user"));
    // Only the line finished before the cancel counts
    assert_eq!(done.completed_items, 1);
    assert_eq!(done.current_item_index, 1);
    assert_eq!(done.produced_ids.len(), 1);
    assert_eq!(client.inner.keywords_started(), vec!["alpha", "beta"]);
    assert!(engine.active_users.is_empty());
}

#[tokio::test]
async fn test_pause_then_resume_continues_from_checkpoint() {
    let (client, engine) = gated_engine().await;
    let job = engine.submit("user-1", JobType::KeywordsBatch, &LINES).await;

    engine.dispatcher.tick().await.unwrap();
    client.wait_reached().await;

    engine.service.pause(&job.id).await.unwrap();
    client.release();
    engine.dispatcher.drain().await;

    // The in-flight line still counts; the next one never starts
    let paused = engine.job(&job.id).await;
    assert_eq!(paused.status, JobStatus::Paused);
    assert_eq!(paused.completed_items, 2);
    assert_eq!(paused.current_item_index, 2);

    // Paused jobs are not dispatched
    assert_eq!(engine.run_pending().await, 0);

    let resumed = engine.service.resume(&job.id).await.unwrap();
    assert_eq!(resumed.status, JobStatus::Pending);
    assert_eq!(engine.run_pending().await, 1);

    let done = engine.job(&job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.completed_items, 3);
    assert_eq!(done.produced_ids.len(), 3);
    assert_eq!(client.inner.keywords_started(), vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn test_control_rejects_invalid_transitions() {
    let (client, engine) = gated_engine().await;
    client.release();
    let job = engine.submit("user-1", JobType::KeywordsBatch, &["alpha"]).await;
    engine.run_pending().await;
    assert_eq!(engine.job(&job.id).await.status, JobStatus::Completed);

    let err = engine.service.cancel(&job.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = engine.service.pause(&job.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = engine.service.resume(&"missing".to_string()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_shutdown_hands_job_back() {
    let (client, engine) = gated_engine().await;
    let job = engine.submit("user-1", JobType::KeywordsBatch, &LINES).await;

    engine.dispatcher.tick().await.unwrap();
    client.wait_reached().await;

    engine.shutdown.shutdown();
    client.release();
    engine.dispatcher.drain().await;

    let handed_back = engine.job(&job.id).await;
    assert_eq!(handed_back.status, JobStatus::Pending);
    assert_eq!(handed_back.current_item_index, 2);
    assert_eq!(engine.dispatcher.tick().await.unwrap(), 0);

    // A fresh worker (next daemon start) picks up at the checkpoint
    let (_tx, token) = shutdown_channel();
    let outcome = engine.worker.run(handed_back, token).await.unwrap();
    assert_eq!(outcome, WorkerOutcome::Completed);
    assert_eq!(client.inner.keywords_started(), vec!["alpha", "beta", "gamma"]);
}
