// Job Worker - drives one batch job through its lines

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::pipeline::ItemPipeline;
use crate::application::quota::{QuotaAccountant, QuotaCheck};
use crate::domain::{BatchJob, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Worker tuning
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause between two lines of the same job
    pub item_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            item_delay: DEFAULT_ITEM_DELAY,
        }
    }
}

/// How a worker run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The job was not pending any more when the worker tried to claim it
    NotClaimed,
    Completed,
    /// Paused by the user or by the quota gate
    Paused,
    Cancelled,
    Failed(String),
    /// Shutdown requested; the job went back to pending with its checkpoint
    HandedBack,
}

/// Executes one job from its checkpoint to a terminal or paused status
///
/// The store is the single source of truth: the worker re-reads status and
/// quota before every line, so external pause/cancel and quota changes are
/// observed at line boundaries.
pub struct JobWorker {
    job_repo: Arc<dyn JobRepository>,
    pipeline: Arc<ItemPipeline>,
    accountant: Arc<QuotaAccountant>,
    time_provider: Arc<dyn TimeProvider>,
    config: WorkerConfig,
}

impl JobWorker {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        pipeline: Arc<ItemPipeline>,
        accountant: Arc<QuotaAccountant>,
        time_provider: Arc<dyn TimeProvider>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            job_repo,
            pipeline,
            accountant,
            time_provider,
            config,
        }
    }

    /// Claim `job` and process its remaining lines
    ///
    /// # Errors
    /// Store failures only. Per-line failures are counted, never returned.
    pub async fn run(&self, job: BatchJob, mut shutdown: ShutdownToken) -> Result<WorkerOutcome> {
        let now = self.time_provider.now_millis();
        if !self
            .job_repo
            .update_status(&job.id, JobStatus::Processing, None, now)
            .await?
        {
            info!(job_id = %job.id, "Job no longer pending, not claimed");
            return Ok(WorkerOutcome::NotClaimed);
        }

        // Checkpoint as of the claim, not as of the poll
        let job = self
            .job_repo
            .find_by_id(&job.id)
            .await?
            .ok_or_else(|| AppError::job_not_found(&job.id))?;

        info!(
            job_id = %job.id,
            user_id = %job.user_id,
            job_type = %job.job_type,
            total_items = job.total_items,
            resume_from = job.current_item_index,
            "Processing job"
        );

        let first_index = job.current_item_index;
        for index in first_index..job.total_items {
            if index > first_index {
                tokio::select! {
                    _ = sleep(self.config.item_delay) => {},
                    _ = shutdown.wait() => {},
                }
            }

            if shutdown.is_shutdown() {
                return self.hand_back(&job).await;
            }

            match self.job_repo.get_status(&job.id).await? {
                Some(JobStatus::Processing) => {}
                Some(JobStatus::Paused) => {
                    info!(job_id = %job.id, next_index = index, "Job paused, stopping");
                    return Ok(WorkerOutcome::Paused);
                }
                Some(JobStatus::Cancelled) => {
                    info!(job_id = %job.id, next_index = index, "Job cancelled, stopping");
                    return Ok(WorkerOutcome::Cancelled);
                }
                Some(other) => {
                    warn!(
                        job_id = %job.id,
                        status = %other,
                        "Unexpected status while processing, stopping"
                    );
                    return Ok(WorkerOutcome::NotClaimed);
                }
                None => {
                    warn!(job_id = %job.id, "Job disappeared while processing");
                    return Ok(WorkerOutcome::NotClaimed);
                }
            }

            if let Some(outcome) = self.enforce_quota(&job).await? {
                return Ok(outcome);
            }

            let line = job.line(index).unwrap_or_default();
            let report = self.pipeline.process(&job, line).await;
            match &report.result {
                Ok(()) => info!(
                    job_id = %job.id,
                    item_index = index,
                    tokens = report.tokens_used,
                    "Item completed"
                ),
                Err(e) => warn!(
                    job_id = %job.id,
                    item_index = index,
                    tokens = report.tokens_used,
                    error = %e,
                    "Item failed"
                ),
            }

            let checkpoint = report.checkpoint(index);
            let now = self.time_provider.now_millis();
            if !self.job_repo.flush_item(&job.id, &checkpoint, now).await? {
                info!(
                    job_id = %job.id,
                    item_index = index,
                    "Job ended during item, progress dropped"
                );
                return Ok(WorkerOutcome::Cancelled);
            }
        }

        self.finish(&job).await
    }

    /// Pause or fail the job when the owner cannot pay for the next line
    async fn enforce_quota(&self, job: &BatchJob) -> Result<Option<WorkerOutcome>> {
        let now = self.time_provider.now_millis();
        match self.accountant.check_quota(&job.user_id).await? {
            QuotaCheck::Available(_) => Ok(None),
            QuotaCheck::Exhausted(reason) => {
                info!(
                    job_id = %job.id,
                    user_id = %job.user_id,
                    reason = %reason,
                    "Quota exhausted, pausing job"
                );
                self.job_repo
                    .update_status(&job.id, JobStatus::Paused, Some(&reason), now)
                    .await?;
                Ok(Some(WorkerOutcome::Paused))
            }
            QuotaCheck::MissingUser => {
                let reason = format!("User {} not found", job.user_id);
                warn!(job_id = %job.id, reason = %reason, "Failing job");
                self.job_repo
                    .update_status(&job.id, JobStatus::Failed, Some(&reason), now)
                    .await?;
                Ok(Some(WorkerOutcome::Failed(reason)))
            }
        }
    }

    async fn hand_back(&self, job: &BatchJob) -> Result<WorkerOutcome> {
        let now = self.time_provider.now_millis();
        if self.job_repo.release(&job.id, now).await? {
            info!(job_id = %job.id, "Shutdown requested, job handed back to pending");
            return Ok(WorkerOutcome::HandedBack);
        }
        // Paused or cancelled before the shutdown was observed
        self.settled_outcome(job).await
    }

    async fn finish(&self, job: &BatchJob) -> Result<WorkerOutcome> {
        let now = self.time_provider.now_millis();
        if self
            .job_repo
            .update_status(&job.id, JobStatus::Completed, None, now)
            .await?
        {
            if let Some(done) = self.job_repo.find_by_id(&job.id).await? {
                info!(
                    job_id = %done.id,
                    completed_items = done.completed_items,
                    failed_items = done.failed_items,
                    tokens_used = done.tokens_used,
                    "Job completed"
                );
            }
            return Ok(WorkerOutcome::Completed);
        }

        // Paused or cancelled after the last line was flushed
        self.settled_outcome(job).await
    }

    /// Outcome for a job some other party moved out of `processing`
    async fn settled_outcome(&self, job: &BatchJob) -> Result<WorkerOutcome> {
        Ok(match self.job_repo.get_status(&job.id).await? {
            Some(JobStatus::Paused) => WorkerOutcome::Paused,
            Some(JobStatus::Cancelled) => WorkerOutcome::Cancelled,
            _ => WorkerOutcome::NotClaimed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GenerationStep, JobType, UserQuota};
    use crate::port::content_fetcher::mocks::MockContentFetcher;
    use crate::port::content_repository::mocks::InMemoryContentRepository;
    use crate::port::generation_client::mocks::MockGenerationClient;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::quota_store::mocks::InMemoryQuotaStore;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::QuotaStore;

    struct Fixture {
        job_repo: Arc<InMemoryJobRepository>,
        content_repo: Arc<InMemoryContentRepository>,
        quota_store: Arc<InMemoryQuotaStore>,
        client: Arc<MockGenerationClient>,
        worker: JobWorker,
    }

    fn fixture(client: MockGenerationClient, quota_store: InMemoryQuotaStore) -> Fixture {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let content_repo = Arc::new(InMemoryContentRepository::new());
        let quota_store = Arc::new(quota_store);
        let client = Arc::new(client);
        let time_provider = Arc::new(ManualTimeProvider::new(10_000));
        let accountant = Arc::new(QuotaAccountant::new(job_repo.clone(), quota_store.clone()));
        let pipeline = Arc::new(ItemPipeline::new(
            content_repo.clone(),
            client.clone(),
            Arc::new(MockContentFetcher::new()),
            accountant.clone(),
            Arc::new(SequentialIdProvider::new("content")),
            time_provider.clone(),
        ));
        let worker = JobWorker::new(
            job_repo.clone(),
            pipeline,
            accountant,
            time_provider,
            WorkerConfig {
                item_delay: Duration::ZERO,
            },
        );
        Fixture {
            job_repo,
            content_repo,
            quota_store,
            client,
            worker,
        }
    }

    async fn insert_job(fx: &Fixture, lines: &[&str]) -> BatchJob {
        let job = BatchJob::new_test("user-1", JobType::KeywordsBatch, lines);
        fx.job_repo.insert(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_all_lines_succeed() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let job = insert_job(&fx, &["a", "b", "c"]).await;
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Completed);
        let done = fx.job_repo.job(&job.id);
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.completed_items, 3);
        assert_eq!(done.failed_items, 0);
        assert_eq!(done.current_item_index, 3);
        assert_eq!(done.produced_ids.len(), 3);
        assert!(done.started_at.is_some());
        assert!(done.finished_at.is_some());
        assert_eq!(fx.content_repo.all().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_line_does_not_stop_job() {
        let fx = fixture(
            MockGenerationClient::new().failing_for_keyword("b"),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let job = insert_job(&fx, &["a", "b", "c"]).await;
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Completed);
        let done = fx.job_repo.job(&job.id);
        assert_eq!(done.completed_items, 2);
        assert_eq!(done.failed_items, 1);
        assert_eq!(done.current_item_index, 3);
        assert!(done.is_progress_consistent());
        assert_eq!(fx.client.keywords_started(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_exhausted_quota_pauses_before_first_line() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 0, 10),
        );
        let job = insert_job(&fx, &["a", "b"]).await;
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Paused);
        let paused = fx.job_repo.job(&job.id);
        assert_eq!(paused.status, JobStatus::Paused);
        assert_eq!(paused.current_item_index, 0);
        assert!(paused
            .error_message
            .unwrap()
            .contains("Token balance exhausted"));
        assert_eq!(fx.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_article_allowance_runs_out_mid_job() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 1),
        );
        let job = insert_job(&fx, &["a", "b", "c"]).await;
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Paused);
        let paused = fx.job_repo.job(&job.id);
        assert_eq!(paused.completed_items, 1);
        assert_eq!(paused.current_item_index, 1);
        assert!(paused
            .error_message
            .unwrap()
            .contains("Article allowance exhausted"));
    }

    #[tokio::test]
    async fn test_missing_user_fails_job() {
        let fx = fixture(MockGenerationClient::new(), InMemoryQuotaStore::new());
        let job = insert_job(&fx, &["a"]).await;
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert!(matches!(outcome, WorkerOutcome::Failed(_)));
        let failed = fx.job_repo.job(&job.id);
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_resume_starts_at_checkpoint() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let mut job = BatchJob::new_test("user-1", JobType::KeywordsBatch, &["a", "b", "c", "d"]);
        job.current_item_index = 2;
        job.completed_items = 2;
        fx.job_repo.insert(&job).await.unwrap();
        let (_tx, token) = shutdown_channel();

        fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(fx.client.keywords_started(), vec!["c", "d"]);
        let done = fx.job_repo.job(&job.id);
        assert_eq!(done.completed_items, 4);
        assert_eq!(done.current_item_index, 4);
    }

    #[tokio::test]
    async fn test_non_pending_job_is_not_claimed() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let job = insert_job(&fx, &["a"]).await;
        fx.job_repo
            .update_status(&job.id, JobStatus::Cancelled, None, 1)
            .await
            .unwrap();
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::NotClaimed);
        assert_eq!(fx.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_hands_job_back() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let job = insert_job(&fx, &["a", "b"]).await;
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::HandedBack);
        let handed = fx.job_repo.job(&job.id);
        assert_eq!(handed.status, JobStatus::Pending);
        assert_eq!(handed.current_item_index, 0);
        assert_eq!(fx.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_does_not_undo_pause() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let job = insert_job(&fx, &["a", "b"]).await;
        fx.job_repo
            .update_status(&job.id, JobStatus::Processing, None, 10_000)
            .await
            .unwrap();
        fx.job_repo
            .update_status(&job.id, JobStatus::Paused, Some("Paused by user"), 10_500)
            .await
            .unwrap();

        let outcome = fx.worker.hand_back(&job).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Paused);
        assert_eq!(fx.job_repo.job(&job.id).status, JobStatus::Paused);
    }

    #[tokio::test]
    async fn test_pause_during_item_survives_flush() {
        let fx = fixture(
            MockGenerationClient::new(),
            InMemoryQuotaStore::new().with_quota("user-1", 10_000, 10),
        );
        let job = insert_job(&fx, &["a", "b"]).await;
        fx.job_repo.interrupt_next_flush(JobStatus::Paused, false);
        let (_tx, token) = shutdown_channel();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Paused);
        let paused = fx.job_repo.job(&job.id);
        assert_eq!(paused.status, JobStatus::Paused);
        assert_eq!(paused.current_item_index, 1);
        assert_eq!(paused.completed_items, 1);
    }

    #[tokio::test]
    async fn test_quota_replenished_then_resumed() {
        let fx = fixture(
            MockGenerationClient::new().failing_on(GenerationStep::Body),
            InMemoryQuotaStore::new().with_quota("user-1", 0, 10),
        );
        let job = insert_job(&fx, &["a"]).await;
        let (_tx, token) = shutdown_channel();
        assert_eq!(
            fx.worker.run(job.clone(), token.clone()).await.unwrap(),
            WorkerOutcome::Paused
        );

        fx.quota_store
            .set_quota(&UserQuota::new("user-1", 100, 10))
            .await
            .unwrap();
        fx.job_repo
            .update_status(&job.id, JobStatus::Pending, None, 2)
            .await
            .unwrap();

        let outcome = fx.worker.run(job.clone(), token).await.unwrap();

        assert_eq!(outcome, WorkerOutcome::Completed);
        let done = fx.job_repo.job(&job.id);
        assert_eq!(done.failed_items, 1);
        // Reason from the quota pause is kept for reporting
        assert!(done.error_message.is_some());
    }
}
