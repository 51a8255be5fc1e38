// Domain Layer - Pure business logic and entities

pub mod content;
pub mod error;
pub mod generation;
pub mod input;
pub mod job;
pub mod quota;

// Re-exports
pub use content::{ContentField, ContentRecord, ContentStatus};
pub use error::DomainError;
pub use generation::{GenerationStep, StepRate, TokenPricing};
pub use input::ItemInput;
pub use job::{
    BatchJob, ContentId, ItemCheckpoint, ItemOutcome, JobData, JobId, JobSettings, JobStatus,
    JobType, OutputLength, UserId,
};
pub use quota::UserQuota;
