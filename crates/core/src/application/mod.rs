// Application Layer - Use Cases and Business Logic

pub mod batch_job;
pub mod dispatcher;
pub mod pipeline;
pub mod quota;
pub mod recovery;
pub mod worker;

// Re-exports
pub use batch_job::{BatchJobService, CreateJobRequest, JobStats};
pub use dispatcher::{ActiveUserGuard, ActiveUsers, Dispatcher, DispatcherConfig};
pub use pipeline::{ItemError, ItemPipeline, ItemReport};
pub use quota::{QuotaAccountant, QuotaCheck};
pub use recovery::RecoveryService;
pub use worker::{
    shutdown_channel, JobWorker, ShutdownSender, ShutdownToken, WorkerConfig, WorkerOutcome,
};
