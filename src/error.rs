//! Error taxonomy for the recommendation core
//!
//! `RecError` is `Clone` because one failed computation is handed to every
//! request that coalesced onto it.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("encoder unavailable: {0}")]
    EncodingUnavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecError {
    /// HTTP status code used by the server boundary
    pub fn status(&self) -> u16 {
        match self {
            RecError::NotFound(_) => 404,
            RecError::InvalidArgument(_) => 400,
            RecError::Conflict(_) => 409,
            RecError::DimensionMismatch { .. } => 422,
            RecError::EncodingUnavailable(_) => 503,
            RecError::Storage(_) | RecError::Internal(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for RecError {
    fn from(err: rusqlite::Error) -> Self {
        RecError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecError>;
