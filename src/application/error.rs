//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add drag, loading and config context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("a drag is already in progress")]
    DragAlreadyActive,

    #[error("no drag in progress")]
    NoActiveDrag,

    #[error("config error: {message}")]
    Config { message: String },

    #[error("loading children at {path} failed: {message}")]
    LazyLoad { path: String, message: String },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
