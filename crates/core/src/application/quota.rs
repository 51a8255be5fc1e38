// Quota / Token Accounting
use crate::domain::{JobId, UserId, UserQuota};
use crate::error::Result;
use crate::port::{JobRepository, QuotaStore};
use std::sync::Arc;
use tracing::debug;

/// Answer of a quota check before an item runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaCheck {
    /// The item may run
    Available(UserQuota),
    /// Tokens or articles are used up; the job should pause
    Exhausted(String),
    /// No user record at all; the job cannot continue
    MissingUser,
}

/// Reads quota before every item and records spend after every generation call
pub struct QuotaAccountant {
    job_repo: Arc<dyn JobRepository>,
    quota_store: Arc<dyn QuotaStore>,
}

impl QuotaAccountant {
    pub fn new(job_repo: Arc<dyn JobRepository>, quota_store: Arc<dyn QuotaStore>) -> Self {
        Self {
            job_repo,
            quota_store,
        }
    }

    /// Fresh read, never cached
    pub async fn check_quota(&self, user_id: &UserId) -> Result<QuotaCheck> {
        let Some(quota) = self.quota_store.get_quota(user_id).await? else {
            return Ok(QuotaCheck::MissingUser);
        };

        Ok(match quota.exhaustion_reason() {
            Some(reason) => QuotaCheck::Exhausted(reason),
            None => QuotaCheck::Available(quota),
        })
    }

    /// Record the cost of one generation call against both the job and the user.
    ///
    /// Called after every call that returned a cost, so a failure later in the
    /// same item still leaves the true spend behind.
    pub async fn record_spend(
        &self,
        job_id: &JobId,
        user_id: &UserId,
        tokens: i64,
    ) -> Result<()> {
        if tokens <= 0 {
            return Ok(());
        }
        self.job_repo.add_tokens_used(job_id, tokens).await?;
        self.quota_store.debit(user_id, tokens).await?;
        debug!(job_id = %job_id, user_id = %user_id, tokens = tokens, "Recorded token spend");
        Ok(())
    }

    /// One article used by a published record
    pub async fn consume_article(&self, user_id: &UserId) -> Result<()> {
        self.quota_store.consume_article(user_id).await
    }

    /// Give back an article consumed for a record that never got published
    pub async fn refund_article(&self, user_id: &UserId) -> Result<()> {
        self.quota_store.refund_article(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchJob, JobType};
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::quota_store::mocks::InMemoryQuotaStore;

    fn setup(
        tokens: i64,
        articles: i64,
    ) -> (Arc<InMemoryJobRepository>, Arc<InMemoryQuotaStore>, QuotaAccountant) {
        let job_repo = Arc::new(InMemoryJobRepository::new());
        let quota_store =
            Arc::new(InMemoryQuotaStore::new().with_quota("user-1", tokens, articles));
        let accountant = QuotaAccountant::new(job_repo.clone(), quota_store.clone());
        (job_repo, quota_store, accountant)
    }

    #[tokio::test]
    async fn test_check_quota_available() {
        let (_, _, accountant) = setup(100, 5);
        let check = accountant.check_quota(&"user-1".to_string()).await.unwrap();
        assert!(matches!(check, QuotaCheck::Available(q) if q.tokens_remaining == 100));
    }

    #[tokio::test]
    async fn test_check_quota_exhausted_and_missing() {
        let (_, _, accountant) = setup(0, 5);
        let check = accountant.check_quota(&"user-1".to_string()).await.unwrap();
        assert!(matches!(check, QuotaCheck::Exhausted(_)));

        let check = accountant.check_quota(&"ghost".to_string()).await.unwrap();
        assert_eq!(check, QuotaCheck::MissingUser);
    }

    #[tokio::test]
    async fn test_record_spend_is_additive_on_job_and_user() {
        let (job_repo, quota_store, accountant) = setup(100, 5);
        let job = BatchJob::new_test("user-1", JobType::KeywordsBatch, &["k"]);
        job_repo.insert(&job).await.unwrap();

        accountant.record_spend(&job.id, &job.user_id, 15).await.unwrap();
        accountant.record_spend(&job.id, &job.user_id, 25).await.unwrap();

        assert_eq!(job_repo.job(&job.id).tokens_used, 40);
        assert_eq!(quota_store.quota("user-1").unwrap().tokens_remaining, 60);
    }

    #[tokio::test]
    async fn test_fresh_read_sees_replenishment() {
        let (_, quota_store, accountant) = setup(0, 5);
        let user = "user-1".to_string();
        assert!(matches!(accountant.check_quota(&user).await.unwrap(), QuotaCheck::Exhausted(_)));

        quota_store.set_quota(&UserQuota::new("user-1", 50, 5)).await.unwrap();
        assert!(matches!(accountant.check_quota(&user).await.unwrap(), QuotaCheck::Available(_)));
    }
}
