// Dispatcher - polls pending jobs and starts one worker per user
use crate::application::worker::constants::{
    DEFAULT_DISPATCH_LIMIT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
use crate::application::worker::{JobWorker, ShutdownToken, WorkerOutcome};
use crate::domain::UserId;
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    /// Pending jobs fetched per tick
    pub batch_limit: usize,
    /// Grace period for in-flight workers after shutdown
    pub drain_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_limit: DEFAULT_DISPATCH_LIMIT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Users that currently have a worker running
///
/// Cheap to clone; clones share the same set.
#[derive(Clone, Default)]
pub struct ActiveUsers {
    inner: Arc<Mutex<HashSet<UserId>>>,
}

impl ActiveUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `user_id`, or `None` if a worker for that user is already running.
    ///
    /// The reservation is released when the guard drops, including when the
    /// worker task panics.
    pub fn try_acquire(&self, user_id: &UserId) -> Option<ActiveUserGuard> {
        let mut users = self.lock();
        if !users.insert(user_id.clone()) {
            return None;
        }
        Some(ActiveUserGuard {
            users: self.clone(),
            user_id: user_id.clone(),
        })
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.lock().contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<UserId>> {
        // A panic while holding this lock cannot leave the set half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases a user's slot on drop
pub struct ActiveUserGuard {
    users: ActiveUsers,
    user_id: UserId,
}

impl Drop for ActiveUserGuard {
    fn drop(&mut self) {
        self.users.lock().remove(&self.user_id);
    }
}

/// Polls the store and launches job workers
///
/// At most one worker runs per user; other users' jobs run concurrently.
/// A tick never waits for the workers it launched.
pub struct Dispatcher {
    job_repo: Arc<dyn JobRepository>,
    worker: Arc<JobWorker>,
    time_provider: Arc<dyn TimeProvider>,
    active_users: ActiveUsers,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
    shutdown: ShutdownToken,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        worker: Arc<JobWorker>,
        time_provider: Arc<dyn TimeProvider>,
        active_users: ActiveUsers,
        shutdown: ShutdownToken,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            job_repo,
            worker,
            time_provider,
            active_users,
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
            shutdown,
            config,
        }
    }

    pub fn active_users(&self) -> &ActiveUsers {
        &self.active_users
    }

    /// Workers launched and not yet reaped
    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Poll until shutdown, then wait for in-flight workers
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.clone();
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_limit = self.config.batch_limit,
            "Dispatcher started"
        );

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            match self.tick().await {
                Ok(0) => {}
                Ok(launched) => debug!(launched = launched, "Workers launched"),
                Err(e) => error!(error = %e, "Dispatcher tick failed, retrying next interval"),
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {},
                _ = shutdown.wait() => break,
            }
        }

        info!("Dispatcher stopping, draining workers");
        self.drain().await;
        info!("Dispatcher stopped");
    }

    /// One poll: fetch pending jobs and launch a worker for each idle user.
    ///
    /// Returns the number of workers launched.
    ///
    /// # Errors
    /// Store failure while fetching; nothing is launched in that case.
    pub async fn tick(&self) -> Result<usize> {
        self.reap_finished().await;

        if self.shutdown.is_shutdown() {
            return Ok(0);
        }

        let jobs = self.job_repo.fetch_pending(self.config.batch_limit).await?;
        let mut launched = 0;

        for job in jobs {
            let Some(guard) = self.active_users.try_acquire(&job.user_id) else {
                debug!(job_id = %job.id, user_id = %job.user_id, "User busy, job left pending");
                continue;
            };

            let worker = Arc::clone(&self.worker);
            let job_repo = Arc::clone(&self.job_repo);
            let time_provider = Arc::clone(&self.time_provider);
            let shutdown = self.shutdown.clone();
            let job_id = job.id.clone();

            self.tasks.lock().await.spawn(async move {
                let _guard = guard;
                match worker.run(job, shutdown).await {
                    Ok(WorkerOutcome::NotClaimed) => {
                        debug!(job_id = %job_id, "Worker did not claim job")
                    }
                    Ok(outcome) => info!(job_id = %job_id, outcome = ?outcome, "Worker finished"),
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Worker aborted");
                        // Let a later tick pick it up again from the checkpoint
                        let now = time_provider.now_millis();
                        match job_repo.release(&job_id, now).await {
                            Ok(true) => info!(job_id = %job_id, "Job handed back to pending"),
                            Ok(false) => {
                                debug!(job_id = %job_id, "Job no longer processing, left as is")
                            }
                            Err(e) => {
                                error!(job_id = %job_id, error = %e, "Failed to hand job back")
                            }
                        }
                    }
                }
            });
            launched += 1;
        }

        Ok(launched)
    }

    /// Collect finished worker tasks, logging panics
    async fn reap_finished(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "Worker panicked");
                }
            }
        }
    }

    /// Wait for every in-flight worker, up to the drain timeout
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!(error = %e, "Worker panicked");
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "Drain timeout elapsed, aborting remaining workers"
            );
            tasks.abort_all();
        }
    }
}
