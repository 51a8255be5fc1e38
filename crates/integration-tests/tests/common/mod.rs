//! Shared fixture: the full engine on in-memory SQLite with scripted adapters
#![allow(dead_code)]

use async_trait::async_trait;
use quillforge_core::application::{
    shutdown_channel, ActiveUsers, BatchJobService, CreateJobRequest, Dispatcher,
    DispatcherConfig, ItemPipeline, JobWorker, QuotaAccountant, ShutdownSender, WorkerConfig,
};
use quillforge_core::domain::{BatchJob, GenerationStep, JobSettings, JobType, UserQuota};
use quillforge_core::port::content_fetcher::mocks::MockContentFetcher;
use quillforge_core::port::generation_client::mocks::MockGenerationClient;
use quillforge_core::port::id_provider::UuidProvider;
use quillforge_core::port::time_provider::mocks::ManualTimeProvider;
use quillforge_core::port::{
    ContentFetcher, Generated, GenerationClient, GenerationContext, GenerationError,
    JobRepository, QuotaStore,
};
use quillforge_infra_sqlite::{
    create_pool, run_migrations, SqliteContentRepository, SqliteJobRepository, SqliteQuotaStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub struct Engine {
    pub pool: SqlitePool,
    pub job_repo: Arc<SqliteJobRepository>,
    pub content_repo: Arc<SqliteContentRepository>,
    pub quota_store: Arc<SqliteQuotaStore>,
    pub service: Arc<BatchJobService>,
    pub worker: Arc<JobWorker>,
    pub dispatcher: Dispatcher,
    pub active_users: ActiveUsers,
    pub shutdown: ShutdownSender,
    pub time: Arc<ManualTimeProvider>,
}

impl Engine {
    pub async fn new(
        client: Arc<dyn GenerationClient>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time = Arc::new(ManualTimeProvider::new(1_700_000_000_000));
        let id_provider = Arc::new(UuidProvider);
        let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
        let content_repo = Arc::new(SqliteContentRepository::new(pool.clone()));
        let quota_store = Arc::new(SqliteQuotaStore::new(pool.clone()));

        let accountant = Arc::new(QuotaAccountant::new(job_repo.clone(), quota_store.clone()));
        let pipeline = Arc::new(ItemPipeline::new(
            content_repo.clone(),
            client,
            fetcher,
            accountant.clone(),
            id_provider.clone(),
            time.clone(),
        ));
        let worker = Arc::new(JobWorker::new(
            job_repo.clone(),
            pipeline,
            accountant,
            time.clone(),
            WorkerConfig {
                item_delay: Duration::ZERO,
            },
        ));
        let service = Arc::new(BatchJobService::new(
            job_repo.clone(),
            quota_store.clone(),
            id_provider,
            time.clone(),
        ));

        let (shutdown, shutdown_rx) = shutdown_channel();
        let active_users = ActiveUsers::new();
        let dispatcher = Dispatcher::new(
            job_repo.clone(),
            worker.clone(),
            time.clone(),
            active_users.clone(),
            shutdown_rx,
            DispatcherConfig {
                poll_interval: Duration::from_millis(10),
                batch_limit: 10,
                drain_timeout: Duration::from_secs(10),
            },
        );

        Self {
            pool,
            job_repo,
            content_repo,
            quota_store,
            service,
            worker,
            dispatcher,
            active_users,
            shutdown,
            time,
        }
    }

    pub async fn with_mock(client: Arc<MockGenerationClient>) -> Self {
        Self::new(client, Arc::new(MockContentFetcher::new())).await
    }

    pub async fn seed_user(&self, user_id: &str, tokens: i64, articles: i64) {
        self.quota_store
            .set_quota(&UserQuota::new(user_id, tokens, articles))
            .await
            .unwrap();
    }

    pub async fn submit(&self, user_id: &str, job_type: JobType, lines: &[&str]) -> BatchJob {
        self.service
            .create(CreateJobRequest {
                user_id: user_id.to_string(),
                job_type,
                lines: lines.iter().map(|l| l.to_string()).collect(),
                settings: JobSettings::default(),
            })
            .await
            .unwrap()
    }

    /// One dispatcher tick, then wait for every launched worker
    pub async fn run_pending(&self) -> usize {
        let launched = self.dispatcher.tick().await.unwrap();
        self.dispatcher.drain().await;
        launched
    }

    pub async fn job(&self, id: &str) -> BatchJob {
        self.job_repo
            .find_by_id(&id.to_string())
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn quota(&self, user_id: &str) -> UserQuota {
        self.quota_store
            .get_quota(&user_id.to_string())
            .await
            .unwrap()
            .unwrap()
    }
}

/// Generation client that blocks the body step of one keyword until released
pub struct GatedClient {
    pub inner: MockGenerationClient,
    gate_keyword: String,
    reached: Notify,
    release: Notify,
}

impl GatedClient {
    pub fn new(gate_keyword: &str) -> Self {
        Self {
            inner: MockGenerationClient::new(),
            gate_keyword: gate_keyword.to_string(),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Wait until the gated item is in flight
    pub async fn wait_reached(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.reached.notified())
            .await
            .expect("gated item never started");
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl GenerationClient for GatedClient {
    async fn generate(
        &self,
        step: GenerationStep,
        context: &GenerationContext,
        settings: &JobSettings,
    ) -> Result<Generated, GenerationError> {
        if step == GenerationStep::Body && context.keyword == self.gate_keyword {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.generate(step, context, settings).await
    }
}
