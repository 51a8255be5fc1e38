// Port Layer - Interfaces for external dependencies

pub mod content_fetcher;
pub mod content_repository;
pub mod generation_client;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod quota_store;
pub mod time_provider;

// Re-exports
pub use content_fetcher::{ContentFetcher, FetchError};
pub use content_repository::ContentRepository;
pub use generation_client::{Generated, GenerationClient, GenerationContext, GenerationError};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use quota_store::QuotaStore;
pub use time_provider::TimeProvider;
