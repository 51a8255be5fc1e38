// Quillforge Infrastructure - SQLite Adapter
// Implements: JobRepository, ContentRepository, QuotaStore

mod connection;
mod content_repository;
mod error;
mod job_repository;
mod migration;
mod quota_store;

pub use connection::create_pool;
pub use content_repository::SqliteContentRepository;
pub use job_repository::SqliteJobRepository;
pub use migration::{current_version, run_migrations};
pub use quota_store::SqliteQuotaStore;
