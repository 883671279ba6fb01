//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::{GatingVerdict, QuestionSetError};
use assess_core::session::SessionError;
use storage::repository::StorageError;

/// Errors from fetching assessments or gating status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("API base URL is not configured")]
    NotConfigured,
    #[error("API request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("API is unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors from the remote grading call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraderError {
    #[error("grader rejected the submission: {0}")]
    Rejected(String),
    #[error("grader request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("grader is unreachable: {0}")]
    Transport(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `GatingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatingServiceError {
    #[error("pre-selection test is not available: {}", .0.as_str())]
    Blocked(GatingVerdict),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while creating or driving a session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error(transparent)]
    Fetch(#[from] ApiError),
    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
    #[error(transparent)]
    Gating(#[from] GatingServiceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Grader(#[from] GraderError),
}
