// SQLite ContentRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use quillforge_core::domain::{ContentField, ContentId, ContentRecord, ContentStatus, JobId};
use quillforge_core::error::{AppError, Result};
use quillforge_core::port::ContentRepository;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::SqlitePool;

pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn expect_one(result: SqliteQueryResult, id: &ContentId) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(AppError::content_not_found(id));
    }
    Ok(())
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn insert(&self, record: &ContentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content_records (
                id, user_id, job_id, keyword, source_url,
                title, seo_title, meta_description, body,
                status, tokens_used, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.job_id)
        .bind(&record.keyword)
        .bind(&record.source_url)
        .bind(&record.title)
        .bind(&record.seo_title)
        .bind(&record.meta_description)
        .bind(&record.body)
        .bind(record.status.as_str())
        .bind(record.tokens_used)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ContentId) -> Result<Option<ContentRecord>> {
        let row = sqlx::query_as::<_, ContentRow>("SELECT * FROM content_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ContentRow::into_record).transpose()
    }

    async fn update_field(
        &self,
        id: &ContentId,
        field: ContentField,
        text: &str,
        now_millis: i64,
    ) -> Result<()> {
        // Column name comes from a closed enum, never from input
        let sql = format!(
            "UPDATE content_records SET {} = ?, updated_at = ? WHERE id = ?",
            field.column()
        );
        let result = sqlx::query(&sql)
            .bind(text)
            .bind(now_millis)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        expect_one(result, id)
    }

    async fn add_tokens(&self, id: &ContentId, tokens: i64, now_millis: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE content_records SET tokens_used = tokens_used + ?, updated_at = ? WHERE id = ?",
        )
        .bind(tokens)
        .bind(now_millis)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        expect_one(result, id)
    }

    async fn publish(&self, id: &ContentId, now_millis: i64) -> Result<()> {
        let result =
            sqlx::query("UPDATE content_records SET status = ?, updated_at = ? WHERE id = ?")
                .bind(ContentStatus::Published.as_str())
                .bind(now_millis)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        expect_one(result, id)
    }

    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<ContentRecord>> {
        let rows: Vec<ContentRow> = sqlx::query_as(
            r#"
            SELECT * FROM content_records
            WHERE job_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ContentRow::into_record).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: String,
    user_id: String,
    job_id: Option<String>,
    keyword: String,
    source_url: Option<String>,
    title: String,
    seo_title: String,
    meta_description: String,
    body: String,
    status: String,
    tokens_used: i64,
    created_at: i64,
    updated_at: i64,
}

impl ContentRow {
    fn into_record(self) -> Result<ContentRecord> {
        Ok(ContentRecord {
            id: self.id,
            user_id: self.user_id,
            job_id: self.job_id,
            keyword: self.keyword,
            source_url: self.source_url,
            title: self.title,
            seo_title: self.seo_title,
            meta_description: self.meta_description,
            body: self.body,
            status: self.status.parse()?,
            tokens_used: self.tokens_used,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_repo() -> SqliteContentRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteContentRepository::new(pool)
    }

    fn stub(id: &str, job_id: &str) -> ContentRecord {
        ContentRecord::stub(id, 1_000, "user-1", Some(job_id.to_string()), "green tea", None)
    }

    #[tokio::test]
    async fn test_stub_lifecycle() {
        let repo = setup_repo().await;
        let record = stub("c-1", "job-1");
        repo.insert(&record).await.unwrap();

        let found = repo.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Generating: green tea");
        assert_eq!(found.status, ContentStatus::Draft);

        repo.update_field(&record.id, ContentField::Title, "Green Tea Guide", 2_000)
            .await
            .unwrap();
        repo.update_field(&record.id, ContentField::Body, "## Intro", 2_000)
            .await
            .unwrap();
        repo.add_tokens(&record.id, 15, 2_000).await.unwrap();
        repo.add_tokens(&record.id, 10, 2_000).await.unwrap();
        repo.publish(&record.id, 3_000).await.unwrap();

        let done = repo.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(done.title, "Green Tea Guide");
        assert_eq!(done.body, "## Intro");
        assert_eq!(done.tokens_used, 25);
        assert!(done.is_published());
        assert_eq!(done.updated_at, 3_000);
    }

    #[tokio::test]
    async fn test_find_by_job_in_creation_order() {
        let repo = setup_repo().await;
        repo.insert(&stub("c-1", "job-1")).await.unwrap();
        repo.insert(&stub("c-2", "job-2")).await.unwrap();
        repo.insert(&stub("c-3", "job-1")).await.unwrap();

        let records = repo.find_by_job(&"job-1".to_string()).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c-1", "c-3"]);
    }

    #[tokio::test]
    async fn test_update_missing_record_not_found() {
        let repo = setup_repo().await;
        let err = repo
            .publish(&"missing".to_string(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
