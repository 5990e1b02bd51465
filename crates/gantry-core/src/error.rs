//! Error types for Gantry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no job registered with name: {0}")]
    UnknownJob(String),

    #[error("job already registered with name: {0}")]
    DuplicateJob(String),

    #[error("stage {stage} failed: job {job} did not succeed")]
    StageFailed { stage: String, job: String },

    #[error("missing secret: {0}")]
    MissingSecret(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
