// User/Quota Store Port (Interface)

use crate::domain::{UserId, UserQuota};
use crate::error::Result;
use async_trait::async_trait;

/// Per-user token balance and article allowance
///
/// Owned by the billing side of the product; the engine only reads it and
/// decrements it.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Current quota, `None` when the user record does not exist
    async fn get_quota(&self, user_id: &UserId) -> Result<Option<UserQuota>>;

    /// Subtract spent tokens (balance may go negative)
    async fn debit(&self, user_id: &UserId, tokens: i64) -> Result<()>;

    /// Subtract one article from the allowance
    async fn consume_article(&self, user_id: &UserId) -> Result<()>;

    /// Add back one article taken by `consume_article`
    async fn refund_article(&self, user_id: &UserId) -> Result<()>;

    /// Create or replace a user's quota (seeding, replenishment)
    async fn set_quota(&self, quota: &UserQuota) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory QuotaStore
    ///
    /// `fail_consume_article(true)` makes allowance consumption fail with a
    /// store error while token debits keep working.
    #[derive(Default)]
    pub struct InMemoryQuotaStore {
        quotas: Mutex<HashMap<UserId, UserQuota>>,
        consume_fails: AtomicBool,
    }

    impl InMemoryQuotaStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_quota(self, user_id: &str, tokens: i64, articles: i64) -> Self {
            self.quotas
                .lock()
                .unwrap()
                .insert(user_id.to_string(), UserQuota::new(user_id, tokens, articles));
            self
        }

        pub fn quota(&self, user_id: &str) -> Option<UserQuota> {
            self.quotas.lock().unwrap().get(user_id).cloned()
        }

        pub fn remove(&self, user_id: &str) {
            self.quotas.lock().unwrap().remove(user_id);
        }

        pub fn fail_consume_article(&self, fail: bool) {
            self.consume_fails.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl QuotaStore for InMemoryQuotaStore {
        async fn get_quota(&self, user_id: &UserId) -> Result<Option<UserQuota>> {
            Ok(self.quotas.lock().unwrap().get(user_id).cloned())
        }

        async fn debit(&self, user_id: &UserId, tokens: i64) -> Result<()> {
            let mut quotas = self.quotas.lock().unwrap();
            let quota = quotas
                .get_mut(user_id)
                .ok_or_else(|| AppError::user_not_found(user_id))?;
            quota.tokens_remaining -= tokens;
            Ok(())
        }

        async fn consume_article(&self, user_id: &UserId) -> Result<()> {
            if self.consume_fails.load(Ordering::SeqCst) {
                return Err(AppError::Database("database is locked".to_string()));
            }
            let mut quotas = self.quotas.lock().unwrap();
            let quota = quotas
                .get_mut(user_id)
                .ok_or_else(|| AppError::user_not_found(user_id))?;
            quota.article_allowance -= 1;
            Ok(())
        }

        async fn refund_article(&self, user_id: &UserId) -> Result<()> {
            let mut quotas = self.quotas.lock().unwrap();
            let quota = quotas
                .get_mut(user_id)
                .ok_or_else(|| AppError::user_not_found(user_id))?;
            quota.article_allowance += 1;
            Ok(())
        }

        async fn set_quota(&self, quota: &UserQuota) -> Result<()> {
            self.quotas
                .lock()
                .unwrap()
                .insert(quota.user_id.clone(), quota.clone());
            Ok(())
        }
    }
}
