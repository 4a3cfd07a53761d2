use std::time::Duration;

use thiserror::Error;

use crate::historical::HistoricalError;

/// Why no ratio was produced
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RvolError {
    #[error("Timestamp is outside the trading session")]
    OutsideSession,
    #[error("No volume recorded today for this slot")]
    NoTodayData,
    #[error("No historical average available")]
    NoHistoricalData,
    #[error("Historical average lookup failed: {0}")]
    TransportFailure(String),
    #[error("Historical average lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl From<HistoricalError> for RvolError {
    fn from(e: HistoricalError) -> Self {
        match e {
            HistoricalError::Filtered(_) | HistoricalError::NotFound { .. } => RvolError::NoHistoricalData,
            HistoricalError::Store(e) => RvolError::TransportFailure(e.to_string()),
            HistoricalError::Transport(e) => RvolError::TransportFailure(e.to_string()),
            e @ HistoricalError::PrecomputeFailed(_) => RvolError::TransportFailure(e.to_string()),
        }
    }
}
