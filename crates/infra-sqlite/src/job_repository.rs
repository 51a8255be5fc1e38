// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use quillforge_core::domain::{
    BatchJob, ContentId, ItemCheckpoint, ItemOutcome, JobData, JobId, JobStatus,
};
use quillforge_core::error::Result;
use quillforge_core::port::JobRepository;
use sqlx::SqlitePool;

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `?, ?, ?` for an IN list of `n` values
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn terminal_list() -> String {
    JobStatus::TERMINAL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &BatchJob) -> Result<()> {
        let job_data = serde_json::to_string(&job.job_data)?;
        let produced_ids = serde_json::to_string(&job.produced_ids)?;

        sqlx::query(
            r#"
            INSERT INTO batch_jobs (
                id, user_id, job_type, status,
                total_items, completed_items, failed_items, current_item_index,
                job_data, produced_ids,
                tokens_at_start, tokens_used, articles_limit_at_start, error_message,
                created_at, started_at, finished_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.user_id)
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(job.total_items)
        .bind(job.completed_items)
        .bind(job.failed_items)
        .bind(job.current_item_index)
        .bind(job_data)
        .bind(produced_ids)
        .bind(job.tokens_at_start)
        .bind(job.tokens_used)
        .bind(job.articles_limit_at_start)
        .bind(&job.error_message)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<BatchJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM batch_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn get_status(&self, id: &JobId) -> Result<Option<JobStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM batch_jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(status.map(|s| s.parse::<JobStatus>()).transpose()?)
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<BatchJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM batch_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn update_status(
        &self,
        id: &JobId,
        to: JobStatus,
        error_message: Option<&str>,
        now_millis: i64,
    ) -> Result<bool> {
        // Compare-and-set: the WHERE clause carries the state machine
        let sources = to.allowed_sources();
        let sql = format!(
            r#"
            UPDATE batch_jobs
            SET status = ?,
                started_at = CASE WHEN ? THEN COALESCE(started_at, ?) ELSE started_at END,
                finished_at = CASE WHEN ? THEN ? ELSE finished_at END,
                error_message = COALESCE(?, error_message),
                updated_at = ?
            WHERE id = ? AND status IN ({})
            "#,
            placeholders(sources.len())
        );

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(to == JobStatus::Processing)
            .bind(now_millis)
            .bind(to.is_terminal())
            .bind(now_millis)
            .bind(error_message)
            .bind(now_millis)
            .bind(id);
        for source in sources {
            query = query.bind(source.as_str());
        }

        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, id: &JobId, now_millis: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE batch_jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(now_millis)
        .bind(id)
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_checkpoint(&self, id: &JobId, next_index: i64, now_millis: i64) -> Result<()> {
        sqlx::query("UPDATE batch_jobs SET current_item_index = ?, updated_at = ? WHERE id = ?")
            .bind(next_index)
            .bind(now_millis)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn append_produced_id(
        &self,
        id: &JobId,
        record_id: &ContentId,
        now_millis: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_jobs
            SET produced_ids = json_insert(produced_ids, '$[#]', ?), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(record_id)
        .bind(now_millis)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn increment_counters(
        &self,
        id: &JobId,
        completed: i64,
        failed: i64,
        now_millis: i64,
    ) -> Result<()> {
        // Optimization: Atomic increment without reading
        sqlx::query(
            r#"
            UPDATE batch_jobs
            SET completed_items = completed_items + ?,
                failed_items = failed_items + ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(completed)
        .bind(failed)
        .bind(now_millis)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn add_tokens_used(&self, id: &JobId, tokens: i64) -> Result<()> {
        sqlx::query("UPDATE batch_jobs SET tokens_used = tokens_used + ? WHERE id = ?")
            .bind(tokens)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<BatchJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM batch_jobs
            WHERE status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batch_jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    /// Single UPDATE: counters, produced id and checkpoint land together or not at all
    async fn flush_item(
        &self,
        id: &JobId,
        checkpoint: &ItemCheckpoint,
        now_millis: i64,
    ) -> Result<bool> {
        let (completed, failed, record_id) = match &checkpoint.outcome {
            ItemOutcome::Completed(record_id) => (1_i64, 0_i64, Some(record_id.as_str())),
            ItemOutcome::Failed => (0, 1, None),
        };

        let sql = format!(
            r#"
            UPDATE batch_jobs
            SET completed_items = completed_items + ?,
                failed_items = failed_items + ?,
                produced_ids = CASE WHEN ? IS NULL THEN produced_ids
                                    ELSE json_insert(produced_ids, '$[#]', ?) END,
                current_item_index = ?,
                updated_at = ?
            WHERE id = ? AND status NOT IN ({})
            "#,
            terminal_list()
        );

        let result = sqlx::query(&sql)
            .bind(completed)
            .bind(failed)
            .bind(record_id)
            .bind(record_id)
            .bind(checkpoint.next_index())
            .bind(now_millis)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    user_id: String,
    job_type: String,
    status: String,
    total_items: i64,
    completed_items: i64,
    failed_items: i64,
    current_item_index: i64,
    job_data: String,
    produced_ids: String,
    tokens_at_start: i64,
    tokens_used: i64,
    articles_limit_at_start: i64,
    error_message: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<BatchJob> {
        let job_data: JobData = serde_json::from_str(&self.job_data)?;
        let produced_ids: Vec<ContentId> = serde_json::from_str(&self.produced_ids)?;

        Ok(BatchJob {
            id: self.id,
            user_id: self.user_id,
            job_type: self.job_type.parse()?,
            status: self.status.parse()?,
            total_items: self.total_items,
            completed_items: self.completed_items,
            failed_items: self.failed_items,
            current_item_index: self.current_item_index,
            job_data,
            produced_ids,
            tokens_at_start: self.tokens_at_start,
            tokens_used: self.tokens_used,
            articles_limit_at_start: self.articles_limit_at_start,
            error_message: self.error_message,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            updated_at: self.updated_at,
        })
    }
}
