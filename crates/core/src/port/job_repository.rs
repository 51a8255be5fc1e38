// Job Repository Port (Interface)

use crate::domain::{BatchJob, ContentId, ItemCheckpoint, ItemOutcome, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for BatchJob persistence
///
/// Every operation touches a single row and is atomic at the granularity it
/// updates. Status writes are compare-and-set against
/// [`JobStatus::allowed_sources`].
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &BatchJob) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<BatchJob>>;

    /// Live status only (cheap read before every item)
    async fn get_status(&self, id: &JobId) -> Result<Option<JobStatus>>;

    /// Up to `limit` pending jobs, oldest first (FIFO)
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<BatchJob>>;

    /// Move a job to `to` if its current status is an allowed source.
    ///
    /// Returns `false` (and writes nothing) when the job is missing or the
    /// transition is not allowed from its current status. `error_message`
    /// replaces the stored reason when given.
    async fn update_status(
        &self,
        id: &JobId,
        to: JobStatus,
        error_message: Option<&str>,
        now_millis: i64,
    ) -> Result<bool>;

    /// Hand a running job back to `pending` (shutdown, worker abort, crash
    /// recovery).
    ///
    /// Only a `processing` job is released; a job the user paused or cancelled
    /// meanwhile keeps its status and `false` is returned. `paused -> pending`
    /// stays reserved for an explicit resume through `update_status`.
    async fn release(&self, id: &JobId, now_millis: i64) -> Result<bool>;

    /// Set the index of the next unprocessed line
    async fn update_checkpoint(&self, id: &JobId, next_index: i64, now_millis: i64)
        -> Result<()>;

    /// Append a content record id to `produced_ids`
    async fn append_produced_id(
        &self,
        id: &JobId,
        record_id: &ContentId,
        now_millis: i64,
    ) -> Result<()>;

    /// Add to the completed / failed counters
    async fn increment_counters(
        &self,
        id: &JobId,
        completed: i64,
        failed: i64,
        now_millis: i64,
    ) -> Result<()>;

    /// Add to the job's running token spend
    async fn add_tokens_used(&self, id: &JobId, tokens: i64) -> Result<()>;

    /// Find all jobs by status (oldest first)
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<BatchJob>>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Persist one processed line: counters, produced id and checkpoint.
    ///
    /// Returns `false` without writing when the job has reached a terminal
    /// status in the meantime. Implementations should override this with a
    /// single atomic write; the default issues the field updates in order.
    async fn flush_item(
        &self,
        id: &JobId,
        checkpoint: &ItemCheckpoint,
        now_millis: i64,
    ) -> Result<bool> {
        match self.get_status(id).await? {
            Some(status) if !status.is_terminal() => {}
            _ => return Ok(false),
        }

        match &checkpoint.outcome {
            ItemOutcome::Completed(record_id) => {
                self.append_produced_id(id, record_id, now_millis).await?;
                self.increment_counters(id, 1, 0, now_millis).await?;
            }
            ItemOutcome::Failed => {
                self.increment_counters(id, 0, 1, now_millis).await?;
            }
        }
        self.update_checkpoint(id, checkpoint.next_index(), now_millis)
            .await?;
        Ok(true)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory JobRepository
    ///
    /// `set_unavailable(true)` makes `fetch_pending` fail, simulating an
    /// unreachable store during polling. `interrupt_next_flush` moves the job
    /// to another status while its item is being flushed, optionally failing
    /// the flush afterwards.
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobId, BatchJob>>,
        unavailable: AtomicBool,
        fetch_calls: AtomicUsize,
        flush_interrupt: Mutex<Option<FlushInterrupt>>,
    }

    #[derive(Debug, Clone, Copy)]
    struct FlushInterrupt {
        status: JobStatus,
        fail: bool,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        pub fn interrupt_next_flush(&self, status: JobStatus, fail: bool) {
            *self.flush_interrupt.lock().unwrap() = Some(FlushInterrupt { status, fail });
        }

        /// Snapshot of a job (panics if missing; tests only)
        pub fn job(&self, id: &str) -> BatchJob {
            self.jobs.lock().unwrap().get(id).cloned().unwrap()
        }

        fn with_job<T>(&self, id: &JobId, f: impl FnOnce(&mut BatchJob) -> T) -> Result<T> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| AppError::job_not_found(id))?;
            Ok(f(job))
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &BatchJob) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Conflict(format!("Job {} already exists", job.id)));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<BatchJob>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn get_status(&self, id: &JobId) -> Result<Option<JobStatus>> {
            Ok(self.jobs.lock().unwrap().get(id).map(|j| j.status))
        }

        async fn fetch_pending(&self, limit: usize) -> Result<Vec<BatchJob>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unreachable".to_string()));
            }
            let mut pending = self.find_by_status(JobStatus::Pending).await?;
            pending.truncate(limit);
            Ok(pending)
        }

        async fn update_status(
            &self,
            id: &JobId,
            to: JobStatus,
            error_message: Option<&str>,
            now_millis: i64,
        ) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            let Some(job) = jobs.get_mut(id) else {
                return Ok(false);
            };
            Ok(job
                .transition(to, now_millis, error_message.map(str::to_string))
                .is_ok())
        }

        async fn release(&self, id: &JobId, now_millis: i64) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(job) if job.status == JobStatus::Processing => Ok(job
                    .transition(JobStatus::Pending, now_millis, None)
                    .is_ok()),
                _ => Ok(false),
            }
        }

        async fn update_checkpoint(
            &self,
            id: &JobId,
            next_index: i64,
            now_millis: i64,
        ) -> Result<()> {
            self.with_job(id, |job| {
                job.current_item_index = next_index;
                job.updated_at = now_millis;
            })
        }

        async fn append_produced_id(
            &self,
            id: &JobId,
            record_id: &ContentId,
            now_millis: i64,
        ) -> Result<()> {
            self.with_job(id, |job| {
                job.produced_ids.push(record_id.clone());
                job.updated_at = now_millis;
            })
        }

        async fn increment_counters(
            &self,
            id: &JobId,
            completed: i64,
            failed: i64,
            now_millis: i64,
        ) -> Result<()> {
            self.with_job(id, |job| {
                job.completed_items += completed;
                job.failed_items += failed;
                job.updated_at = now_millis;
            })
        }

        async fn add_tokens_used(&self, id: &JobId, tokens: i64) -> Result<()> {
            self.with_job(id, |job| job.tokens_used += tokens)
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<BatchJob>> {
            let mut jobs: Vec<BatchJob> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .cloned()
                .collect();
            jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(jobs)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .count() as i64)
        }

        async fn flush_item(
            &self,
            id: &JobId,
            checkpoint: &ItemCheckpoint,
            now_millis: i64,
        ) -> Result<bool> {
            let interrupt = self.flush_interrupt.lock().unwrap().take();
            let mut jobs = self.jobs.lock().unwrap();
            if let Some(interrupt) = interrupt {
                if let Some(job) = jobs.get_mut(id) {
                    let _ = job.transition(interrupt.status, now_millis, None);
                }
                if interrupt.fail {
                    return Err(AppError::Database("database is locked".to_string()));
                }
            }
            match jobs.get_mut(id) {
                Some(job) if !job.status.is_terminal() => {
                    job.apply_checkpoint(checkpoint, now_millis);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }
}
