// Create Job Use Case

use crate::application::worker::constants::{MAX_LINES_PER_JOB, MAX_LINE_BYTES};
use crate::domain::{BatchJob, JobData, JobSettings, JobType};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, QuotaStore, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Create-job request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub user_id: String,
    pub job_type: JobType,
    /// Raw input lines; blank lines are dropped
    pub lines: Vec<String>,

    #[serde(default)]
    pub settings: JobSettings,
}

/// Validate a request and return its non-blank, trimmed lines
pub fn validate_request(req: &CreateJobRequest) -> Result<Vec<String>> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::Validation("User id cannot be empty".to_string()));
    }
    if req.settings.model.trim().is_empty() {
        return Err(AppError::Validation("Model cannot be empty".to_string()));
    }

    let lines: Vec<String> = req
        .lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if lines.is_empty() {
        return Err(AppError::Validation(
            "Job must contain at least one non-empty line".to_string(),
        ));
    }
    if lines.len() > MAX_LINES_PER_JOB {
        return Err(AppError::Validation(format!(
            "Too many lines: {} (max {})",
            lines.len(),
            MAX_LINES_PER_JOB
        )));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.len() > MAX_LINE_BYTES {
            return Err(AppError::Validation(format!(
                "Line {} too long: {} bytes (max {})",
                i + 1,
                line.len(),
                MAX_LINE_BYTES
            )));
        }
        if line.contains('\0') {
            return Err(AppError::Validation(format!(
                "Line {} contains a NUL byte",
                i + 1
            )));
        }
    }

    Ok(lines)
}

/// Execute create use case
///
/// The owner's quota is snapshotted onto the job for reporting. Creation does
/// not check whether the quota suffices; the worker gates every line.
///
/// # Arguments
///
/// * `job_repo` - Job repository
/// * `quota_store` - Quota store (snapshot only)
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Create request
pub async fn execute(
    job_repo: &dyn JobRepository,
    quota_store: &dyn QuotaStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: CreateJobRequest,
) -> Result<BatchJob> {
    let lines = validate_request(&req)?;

    let user_id = req.user_id.trim().to_string();
    let quota = quota_store
        .get_quota(&user_id)
        .await?
        .ok_or_else(|| AppError::user_not_found(&user_id))?;

    let mut job = BatchJob::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        user_id,
        req.job_type,
        JobData::new(lines, req.settings),
    );
    job.snapshot_quota(&quota);

    job_repo.insert(&job).await?;

    info!(
        job_id = %job.id,
        user_id = %job.user_id,
        job_type = %job.job_type,
        total_items = job.total_items,
        "Job created"
    );
    Ok(job)
}
