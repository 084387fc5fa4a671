//! Error taxonomy for the coding pipeline.
//!
//! Per-handler failures inside the fan-out stage never reach this type:
//! they are logged and the handler is dropped from the aggregate. What
//! surfaces here are pipeline-level failures the caller has to act on.

use thiserror::Error;

/// Error type for pipeline-level failures.
#[derive(Debug, Error)]
pub enum CodingError {
    /// The inference collaborator failed at a point where the pipeline
    /// cannot degrade (e.g. topic classification transport failure).
    #[error("inference error: {0}")]
    Inference(String),
    /// The state store failed on read or write. Retryable: both phases of
    /// the pipeline depend on durable state, so the pipeline never
    /// continues with an unpersisted candidate set.
    #[error("storage error: {0}")]
    Storage(String),
    /// Caller input was malformed. Rejected before any side effect.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for CodingError {
    fn from(e: rusqlite::Error) -> Self {
        CodingError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CodingError {
    fn from(e: serde_json::Error) -> Self {
        CodingError::Serde(e.to_string())
    }
}

pub type CodingResult<T> = Result<T, CodingError>;
