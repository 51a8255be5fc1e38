// SQLite QuotaStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use quillforge_core::domain::{UserId, UserQuota};
use quillforge_core::error::{AppError, Result};
use quillforge_core::port::QuotaStore;
use sqlx::SqlitePool;

pub struct SqliteQuotaStore {
    pool: SqlitePool,
}

impl SqliteQuotaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Relative decrement (a negative `amount` adds back); concurrent debits never lose an update
    async fn decrement(&self, user_id: &UserId, column: &str, amount: i64) -> Result<()> {
        let sql = format!(
            "UPDATE user_quotas SET {col} = {col} - ? WHERE user_id = ?",
            col = column
        );
        let result = sqlx::query(&sql)
            .bind(amount)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::user_not_found(user_id));
        }
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn get_quota(&self, user_id: &UserId) -> Result<Option<UserQuota>> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT user_id, tokens_remaining, article_allowance FROM user_quotas WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(user_id, tokens, articles)| UserQuota::new(user_id, tokens, articles)))
    }

    async fn debit(&self, user_id: &UserId, tokens: i64) -> Result<()> {
        self.decrement(user_id, "tokens_remaining", tokens).await
    }

    async fn consume_article(&self, user_id: &UserId) -> Result<()> {
        self.decrement(user_id, "article_allowance", 1).await
    }

    async fn refund_article(&self, user_id: &UserId) -> Result<()> {
        self.decrement(user_id, "article_allowance", -1).await
    }

    async fn set_quota(&self, quota: &UserQuota) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_quotas (user_id, tokens_remaining, article_allowance)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                tokens_remaining = excluded.tokens_remaining,
                article_allowance = excluded.article_allowance
            "#,
        )
        .bind(&quota.user_id)
        .bind(quota.tokens_remaining)
        .bind(quota.article_allowance)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use tokio_test::{assert_err, assert_ok};

    async fn setup_store() -> SqliteQuotaStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteQuotaStore::new(pool)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = setup_store().await;
        let user = "user-1".to_string();
        assert!(store.get_quota(&user).await.unwrap().is_none());

        store
            .set_quota(&UserQuota::new("user-1", 500, 3))
            .await
            .unwrap();
        assert_eq!(
            store.get_quota(&user).await.unwrap(),
            Some(UserQuota::new("user-1", 500, 3))
        );

        // Upsert replaces
        store
            .set_quota(&UserQuota::new("user-1", 50, 1))
            .await
            .unwrap();
        assert_eq!(
            store.get_quota(&user).await.unwrap().unwrap().tokens_remaining,
            50
        );
    }

    #[tokio::test]
    async fn test_debit_may_go_negative() {
        let store = setup_store().await;
        let user = "user-1".to_string();
        store
            .set_quota(&UserQuota::new("user-1", 30, 2))
            .await
            .unwrap();

        assert_ok!(store.debit(&user, 20).await);
        assert_ok!(store.debit(&user, 20).await);
        assert_ok!(store.consume_article(&user).await);

        let quota = store.get_quota(&user).await.unwrap().unwrap();
        assert_eq!(quota.tokens_remaining, -10);
        assert_eq!(quota.article_allowance, 1);
        assert!(quota.is_exhausted());
    }

    #[tokio::test]
    async fn test_refund_article_restores_allowance() {
        let store = setup_store().await;
        let user = "user-1".to_string();
        store
            .set_quota(&UserQuota::new("user-1", 30, 1))
            .await
            .unwrap();

        assert_ok!(store.consume_article(&user).await);
        assert_ok!(store.refund_article(&user).await);

        assert_eq!(
            store.get_quota(&user).await.unwrap().unwrap().article_allowance,
            1
        );
        let err = assert_err!(store.refund_article(&"ghost".to_string()).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_debit_unknown_user() {
        let store = setup_store().await;
        let err = assert_err!(store.debit(&"ghost".to_string(), 1).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
