// Domain Error Types

use thiserror::Error;

/// Rule violations detected inside the domain model, before any I/O
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Job cannot move from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A stored status string that maps to no known status
    #[error("Unrecognized {kind} status '{value}'")]
    UnknownStatus { kind: &'static str, value: String },

    #[error("Unrecognized job type '{0}'")]
    UnknownJobType(String),

    #[error("Input line is empty")]
    EmptyInputLine,

    #[error("Expected 'keyword|url' with an http(s) url, got '{0}'")]
    MalformedSourceLine(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
