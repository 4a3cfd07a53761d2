use thiserror::Error;

/// Fast key-value store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Heed error: {0}")]
    Heed(#[from] heed::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Directory creation error: {0}")]
    DirectoryCreation(String),
    #[error("Task join error: {0}")]
    TaskJoin(String),
    #[error("Store is closed")]
    Closed,
}

/// Bulk precompute call failures
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Precompute rejected: {0}")]
    Rejected(String),
    #[error("Connection pool is closed")]
    PoolClosed,
}

/// Why a historical average could not be produced
#[derive(Error, Debug)]
pub enum HistoricalError {
    #[error("Symbol {0} is excluded from historical averages")]
    Filtered(String),
    #[error("No historical average for {symbol} slot {slot}")]
    NotFound { symbol: String, slot: usize },
    #[error("Fast store error: {0}")]
    Store(#[from] StoreError),
    #[error("Bulk precompute failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Bulk precompute for {0} failed while this lookup waited on it")]
    PrecomputeFailed(String),
}
