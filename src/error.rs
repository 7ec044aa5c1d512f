//! Engine error types
//!
//! Input errors are returned synchronously and never leave a submission
//! behind. Faults inside an evaluation are not errors here: they resolve the
//! submission to `system_error` instead.

use crate::core::SubmissionStatus;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid programming language: {0}")]
    UnsupportedLanguage(String),

    #[error("Problem not found: {0}")]
    ProblemNotFound(String),

    #[error("Submission {id} was already evaluated (status: {status})")]
    AlreadyEvaluated { id: i64, status: SubmissionStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
