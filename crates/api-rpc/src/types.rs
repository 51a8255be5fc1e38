//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use quillforge_core::application::JobStats;
use quillforge_core::domain::{BatchJob, JobSettings, JobStatus, JobType};
use serde::{Deserialize, Serialize};

/// batch.create.v1 - Submit a batch job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobParams {
    pub user_id: String,
    pub job_type: JobType,
    pub lines: Vec<String>,
    #[serde(default)]
    pub settings: JobSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub total_items: i64,
}

/// batch.cancel.v1 / batch.pause.v1 / batch.resume.v1 / batch.status.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdParams {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobControlResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// batch.status.v1 result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub user_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub total_items: i64,
    pub completed_items: i64,
    pub failed_items: i64,
    pub current_item_index: i64,
    pub progress_percent: u8,
    pub tokens_used: i64,
    pub tokens_at_start: i64,
    pub articles_limit_at_start: i64,
    pub produced_ids: Vec<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl From<BatchJob> for JobStatusResponse {
    fn from(job: BatchJob) -> Self {
        let done = job.completed_items + job.failed_items;
        let progress_percent = if job.total_items > 0 {
            ((done * 100) / job.total_items).clamp(0, 100) as u8
        } else {
            0
        };
        Self {
            job_id: job.id,
            user_id: job.user_id,
            job_type: job.job_type,
            status: job.status,
            total_items: job.total_items,
            completed_items: job.completed_items,
            failed_items: job.failed_items,
            current_item_index: job.current_item_index,
            progress_percent,
            tokens_used: job.tokens_used,
            tokens_at_start: job.tokens_at_start,
            articles_limit_at_start: job.articles_limit_at_start,
            produced_ids: job.produced_ids,
            error_message: job.error_message,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

/// admin.stats.v1 - Get engine statistics
#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub pending_jobs: i64,
    pub processing_jobs: i64,
    pub paused_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub cancelled_jobs: i64,
    /// Users with a worker currently running
    pub active_users: usize,
    pub uptime_seconds: i64,
}

impl StatsResponse {
    pub fn new(stats: JobStats, active_users: usize, uptime_seconds: i64) -> Self {
        Self {
            total_jobs: stats.pending
                + stats.processing
                + stats.paused
                + stats.completed
                + stats.failed
                + stats.cancelled,
            pending_jobs: stats.pending,
            processing_jobs: stats.processing,
            paused_jobs: stats.paused,
            completed_jobs: stats.completed,
            failed_jobs: stats.failed,
            cancelled_jobs: stats.cancelled,
            active_users,
            uptime_seconds,
        }
    }
}
