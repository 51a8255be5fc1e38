// Application error type shared by every crate

use thiserror::Error;

/// Application-level error type
///
/// Item-scoped failures use [`crate::application::ItemError`] instead and never
/// surface here; an `AppError` out of a worker means the store itself failed.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Rejected request input (job creation)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A control request the job's current status does not allow
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Generation error: {0}")]
    Generation(#[from] crate::port::GenerationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::port::FetchError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn job_not_found(id: &str) -> Self {
        AppError::NotFound(format!("Job {} not found", id))
    }

    pub fn user_not_found(user_id: &str) -> Self {
        AppError::NotFound(format!("User {} not found", user_id))
    }

    pub fn content_not_found(id: &str) -> Self {
        AppError::NotFound(format!("Content {} not found", id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// sqlx errors are mapped in the infra-sqlite crate (`map_sqlx_error`)

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages() {
        assert_eq!(
            AppError::job_not_found("job-1").to_string(),
            "Not found: Job job-1 not found"
        );
        assert!(AppError::user_not_found("u").is_not_found());
        assert!(!AppError::Validation("x".into()).is_not_found());
    }
}
