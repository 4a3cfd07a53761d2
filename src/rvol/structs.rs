use serde::{Deserialize, Serialize};

use crate::common::constants::{DEFAULT_BATCH_CONCURRENCY, DEFAULT_LOOKBACK_DAYS};
use crate::session::Slot;

/// Calculator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RvolSettings {
    /// Number of prior trading days the historical average covers
    pub lookback_days: u32,
    /// Maximum symbols evaluated concurrently by `calculate_batch`
    pub batch_concurrency: usize,
}

impl Default for RvolSettings {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

/// A computed ratio with its inputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RvolResult {
    pub symbol: String,
    pub slot: Slot,
    pub volume_today: u64,
    pub historical_average: f64,
    pub ratio: f64,
}
