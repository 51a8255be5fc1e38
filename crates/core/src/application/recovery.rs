// Crash recovery: jobs left in `processing` by a dead worker
use crate::domain::JobStatus;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Crash recovery service
///
/// On daemon startup, moves orphaned `processing` jobs back to `pending`.
/// Their checkpoint is intact, so the next worker continues after the last
/// flushed line; the line in flight at crash time runs again.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_repo` - Job repository
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Minimum age of `updated_at` (default: 0)
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(job_repo, time_provider, None);
    /// recovery.recover_orphaned_jobs().await?;
    /// ```
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Requeue orphaned jobs; must run before the dispatcher starts
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let processing = self.job_repo.find_by_status(JobStatus::Processing).await?;
        let mut recovered_count = 0;

        for job in processing {
            if job.updated_at > cutoff {
                continue;
            }

            if self.job_repo.release(&job.id, now).await? {
                info!(
                    job_id = %job.id,
                    user_id = %job.user_id,
                    next_index = job.current_item_index,
                    total_items = job.total_items,
                    "Orphaned job requeued"
                );
                recovered_count += 1;
            } else {
                warn!(job_id = %job.id, "Orphaned job changed status during recovery, skipped");
            }
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchJob, ItemCheckpoint, JobType};
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;

    #[tokio::test]
    async fn test_processing_jobs_requeued_with_checkpoint() {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let job = BatchJob::new_test("user-1", JobType::KeywordsBatch, &["a", "b", "c"]);
        job_repo.insert(&job).await.unwrap();
        job_repo
            .update_status(&job.id, JobStatus::Processing, None, 5_000)
            .await
            .unwrap();
        job_repo
            .flush_item(&job.id, &ItemCheckpoint::completed(0, "c-1"), 5_000)
            .await
            .unwrap();

        let recovery = RecoveryService::new(
            job_repo.clone(),
            Arc::new(ManualTimeProvider::new(6_000)),
            None,
        );
        let count = recovery.recover_orphaned_jobs().await.unwrap();

        assert_eq!(count, 1);
        let recovered = job_repo.job(&job.id);
        assert_eq!(recovered.status, JobStatus::Pending);
        assert_eq!(recovered.current_item_index, 1);
        assert_eq!(recovered.completed_items, 1);
    }

    #[tokio::test]
    async fn test_recent_jobs_left_alone_within_window() {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let job = BatchJob::new_test("user-1", JobType::KeywordsBatch, &["a"]);
        job_repo.insert(&job).await.unwrap();
        job_repo
            .update_status(&job.id, JobStatus::Processing, None, 5_000)
            .await
            .unwrap();

        let recovery = RecoveryService::new(
            job_repo.clone(),
            Arc::new(ManualTimeProvider::new(6_000)),
            Some(60_000),
        );

        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 0);
        assert_eq!(job_repo.job(&job.id).status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_other_statuses_untouched() {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let paused = BatchJob::new_test("user-1", JobType::KeywordsBatch, &["a"]);
        job_repo.insert(&paused).await.unwrap();
        job_repo
            .update_status(&paused.id, JobStatus::Paused, None, 5_000)
            .await
            .unwrap();

        let recovery = RecoveryService::new(
            job_repo.clone(),
            Arc::new(ManualTimeProvider::new(6_000)),
            None,
        );

        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 0);
        assert_eq!(job_repo.job(&paused.id).status, JobStatus::Paused);
    }
}
