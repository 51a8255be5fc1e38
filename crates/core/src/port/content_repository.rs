// Content Repository Port (Interface)

use crate::domain::{ContentField, ContentId, ContentRecord, JobId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for generated content records
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a record (the pipeline inserts draft stubs)
    async fn insert(&self, record: &ContentRecord) -> Result<()>;

    async fn find_by_id(&self, id: &ContentId) -> Result<Option<ContentRecord>>;

    /// Overwrite one generated text field
    async fn update_field(
        &self,
        id: &ContentId,
        field: ContentField,
        text: &str,
        now_millis: i64,
    ) -> Result<()>;

    /// Add to the record's token spend
    async fn add_tokens(&self, id: &ContentId, tokens: i64, now_millis: i64) -> Result<()>;

    /// Promote a draft to published
    async fn publish(&self, id: &ContentId, now_millis: i64) -> Result<()>;

    /// All records created by a job, oldest first
    async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<ContentRecord>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ContentStatus;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory ContentRepository (insertion ordered)
    #[derive(Default)]
    pub struct InMemoryContentRepository {
        records: Mutex<Vec<ContentRecord>>,
        publish_fails: AtomicBool,
    }

    impl InMemoryContentRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn all(&self) -> Vec<ContentRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn fail_publish(&self, fail: bool) {
            self.publish_fails.store(fail, Ordering::SeqCst);
        }

        fn with_record<T>(
            &self,
            id: &ContentId,
            f: impl FnOnce(&mut ContentRecord) -> T,
        ) -> Result<T> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| AppError::content_not_found(id))?;
            Ok(f(record))
        }
    }

    #[async_trait]
    impl ContentRepository for InMemoryContentRepository {
        async fn insert(&self, record: &ContentRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &ContentId) -> Result<Option<ContentRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| &r.id == id)
                .cloned())
        }

        async fn update_field(
            &self,
            id: &ContentId,
            field: ContentField,
            text: &str,
            now_millis: i64,
        ) -> Result<()> {
            self.with_record(id, |r| {
                r.set_field(field, text);
                r.updated_at = now_millis;
            })
        }

        async fn add_tokens(&self, id: &ContentId, tokens: i64, now_millis: i64) -> Result<()> {
            self.with_record(id, |r| {
                r.tokens_used += tokens;
                r.updated_at = now_millis;
            })
        }

        async fn publish(&self, id: &ContentId, now_millis: i64) -> Result<()> {
            if self.publish_fails.load(Ordering::SeqCst) {
                return Err(AppError::Database("disk I/O error".to_string()));
            }
            self.with_record(id, |r| {
                r.status = ContentStatus::Published;
                r.updated_at = now_millis;
            })
        }

        async fn find_by_job(&self, job_id: &JobId) -> Result<Vec<ContentRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.job_id.as_ref() == Some(job_id))
                .cloned()
                .collect())
        }
    }
}
