//! RPC Method Handlers
//!
//! Thin translation between JSON-RPC params and `BatchJobService`.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::UserRateLimiter;
use crate::types::{
    CreateJobParams, CreateJobResponse, JobControlResponse, JobIdParams, JobStatusResponse,
    StatsParams, StatsResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use quillforge_core::application::{ActiveUsers, BatchJobService, CreateJobRequest};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Job creation budget per user
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub burst: u32,
    pub per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 20,
            per_second: 5,
        }
    }
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<BatchJobService>,
    active_users: ActiveUsers,
    rate_limiter: UserRateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        service: Arc<BatchJobService>,
        active_users: ActiveUsers,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            service,
            active_users,
            rate_limiter: UserRateLimiter::new(rate_limit.burst, rate_limit.per_second),
            start_time: Instant::now(),
        }
    }

    /// batch.create.v1
    pub async fn create(
        &self,
        params: CreateJobParams,
    ) -> Result<CreateJobResponse, ErrorObjectOwned> {
        if !self.rate_limiter.check(&params.user_id) {
            warn!(user_id = %params.user_id, "Job creation throttled");
            return Err(throttled(&params.user_id));
        }

        let job = self
            .service
            .create(CreateJobRequest {
                user_id: params.user_id,
                job_type: params.job_type,
                lines: params.lines,
                settings: params.settings,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(CreateJobResponse {
            job_id: job.id,
            status: job.status,
            total_items: job.total_items,
        })
    }

    /// batch.cancel.v1
    pub async fn cancel(
        &self,
        params: JobIdParams,
    ) -> Result<JobControlResponse, ErrorObjectOwned> {
        let job = self
            .service
            .cancel(&params.job_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(JobControlResponse {
            job_id: job.id,
            status: job.status,
        })
    }

    /// batch.pause.v1
    pub async fn pause(&self, params: JobIdParams) -> Result<JobControlResponse, ErrorObjectOwned> {
        let job = self
            .service
            .pause(&params.job_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(JobControlResponse {
            job_id: job.id,
            status: job.status,
        })
    }

    /// batch.resume.v1
    pub async fn resume(
        &self,
        params: JobIdParams,
    ) -> Result<JobControlResponse, ErrorObjectOwned> {
        let job = self
            .service
            .resume(&params.job_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(JobControlResponse {
            job_id: job.id,
            status: job.status,
        })
    }

    /// batch.status.v1
    pub async fn status(&self, params: JobIdParams) -> Result<JobStatusResponse, ErrorObjectOwned> {
        let job = self
            .service
            .status(&params.job_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(job.into())
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsParams) -> Result<StatsResponse, ErrorObjectOwned> {
        let stats = self.service.stats().await.map_err(to_rpc_error)?;
        Ok(StatsResponse::new(
            stats,
            self.active_users.len(),
            self.start_time.elapsed().as_secs() as i64,
        ))
    }
}
