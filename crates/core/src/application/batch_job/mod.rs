// Batch Job Service - user-facing job operations

pub mod create;

pub use create::{validate_request, CreateJobRequest};

use crate::domain::{BatchJob, JobId, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, QuotaStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Job counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: i64,
    pub processing: i64,
    pub paused: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

/// Create, inspect and control batch jobs
///
/// Control operations only write the status; the running worker observes the
/// change before its next line.
pub struct BatchJobService {
    job_repo: Arc<dyn JobRepository>,
    quota_store: Arc<dyn QuotaStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl BatchJobService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        quota_store: Arc<dyn QuotaStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            quota_store,
            id_provider,
            time_provider,
        }
    }

    /// Create a new pending job
    pub async fn create(&self, req: CreateJobRequest) -> Result<BatchJob> {
        create::execute(
            self.job_repo.as_ref(),
            self.quota_store.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Cancel a pending, processing or paused job
    pub async fn cancel(&self, id: &JobId) -> Result<BatchJob> {
        self.control(id, JobStatus::Cancelled, Some("Cancelled by user"))
            .await
    }

    /// Pause a pending or processing job
    pub async fn pause(&self, id: &JobId) -> Result<BatchJob> {
        self.control(id, JobStatus::Paused, None).await
    }

    /// Put a paused job back in the queue; it continues from its checkpoint
    pub async fn resume(&self, id: &JobId) -> Result<BatchJob> {
        let job = self.status(id).await?;
        if job.status != JobStatus::Paused {
            return Err(AppError::InvalidState(format!(
                "Job {} is {}, only paused jobs can be resumed",
                id, job.status
            )));
        }
        self.control(id, JobStatus::Pending, None).await
    }

    /// Current job snapshot
    pub async fn status(&self, id: &JobId) -> Result<BatchJob> {
        self.job_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::job_not_found(id))
    }

    pub async fn stats(&self) -> Result<JobStats> {
        Ok(JobStats {
            pending: self.job_repo.count_by_status(JobStatus::Pending).await?,
            processing: self.job_repo.count_by_status(JobStatus::Processing).await?,
            paused: self.job_repo.count_by_status(JobStatus::Paused).await?,
            completed: self.job_repo.count_by_status(JobStatus::Completed).await?,
            failed: self.job_repo.count_by_status(JobStatus::Failed).await?,
            cancelled: self.job_repo.count_by_status(JobStatus::Cancelled).await?,
        })
    }

    async fn control(&self, id: &JobId, to: JobStatus, reason: Option<&str>) -> Result<BatchJob> {
        let now = self.time_provider.now_millis();
        if !self.job_repo.update_status(id, to, reason, now).await? {
            let current = self.status(id).await?;
            return Err(AppError::InvalidState(format!(
                "Cannot move job {} from {} to {}",
                id, current.status, to
            )));
        }
        info!(job_id = %id, status = %to, "Job status changed by request");
        self.status(id).await
    }
}
