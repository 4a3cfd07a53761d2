use thiserror::Error;

use crate::historical::StoreError;
use crate::postgres::PostgresError;

#[derive(Error, Debug)]
pub enum PrecomputeError {
    #[error("Volume source error: {0}")]
    Source(String),
    #[error("Fast store error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid precompute request: {0}")]
    InvalidRequest(String),
}

impl From<PostgresError> for PrecomputeError {
    fn from(e: PostgresError) -> Self {
        PrecomputeError::Source(e.to_string())
    }
}
