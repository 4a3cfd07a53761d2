use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::historical::HistoricalAverageStore;
use crate::session::{SessionSlotIndexer, Slot};
use crate::today::TodayVolumeCache;

use super::errors::RvolError;
use super::structs::{RvolResult, RvolSettings};

/// Relative volume calculator
///
/// The public operations never fail: every degraded path collapses to "no ratio". The
/// `evaluate*` forms expose the reason for diagnostics.
pub struct RvolCalculator {
    indexer: SessionSlotIndexer,
    today: Arc<TodayVolumeCache>,
    historical: Arc<HistoricalAverageStore>,
    settings: RvolSettings,
}

impl RvolCalculator {
    pub fn new(
        indexer: SessionSlotIndexer,
        today: Arc<TodayVolumeCache>,
        historical: Arc<HistoricalAverageStore>,
        settings: RvolSettings,
    ) -> Self {
        Self {
            indexer,
            today,
            historical,
            settings,
        }
    }

    pub fn indexer(&self) -> &SessionSlotIndexer {
        &self.indexer
    }

    pub fn settings(&self) -> &RvolSettings {
        &self.settings
    }

    pub fn historical(&self) -> &Arc<HistoricalAverageStore> {
        &self.historical
    }

    /// Record the session-cumulative volume seen at `timestamp`. Outside the session this is a no-op.
    pub fn update_volume(&self, symbol: &str, accumulated_volume: u64, timestamp: DateTime<Utc>, vwap: f64) {
        match self.indexer.slot_for_instant(timestamp) {
            Some(slot) => self.today.update(symbol, slot, accumulated_volume, vwap),
            None => debug!(symbol, %timestamp, "Ignoring volume update outside session"),
        }
    }

    pub async fn calculate(&self, symbol: &str, timestamp: DateTime<Utc>) -> Option<f64> {
        match self.evaluate(symbol, timestamp).await {
            Ok(result) => Some(result.ratio),
            Err(reason) => {
                debug!(symbol, %reason, "No RVOL");
                None
            }
        }
    }

    /// Like `calculate` with a caller-supplied volume, bounding the historical lookup by `timeout`
    pub async fn calculate_direct(
        &self,
        symbol: &str,
        volume_today: u64,
        timestamp: DateTime<Utc>,
        timeout: Duration,
    ) -> Option<f64> {
        match self.evaluate_direct(symbol, volume_today, timestamp, timeout).await {
            Ok(result) => Some(result.ratio),
            Err(reason) => {
                debug!(symbol, %reason, "No direct RVOL");
                None
            }
        }
    }

    /// Ratios for every symbol that has one; symbols without data are left out
    pub async fn calculate_batch(&self, symbols: &[String], timestamp: DateTime<Utc>) -> HashMap<String, f64> {
        stream::iter(symbols)
            .map(|symbol| async move { (symbol, self.calculate(symbol, timestamp).await) })
            .buffer_unordered(self.settings.batch_concurrency.max(1))
            .filter_map(|(symbol, ratio)| async move { ratio.map(|ratio| (symbol.clone(), ratio)) })
            .collect()
            .await
    }

    /// Start a new trading day. Historical averages are left alone.
    pub fn reset_for_new_day(&self) {
        self.today.reset();
    }

    pub async fn evaluate(&self, symbol: &str, timestamp: DateTime<Utc>) -> Result<RvolResult, RvolError> {
        let slot = self.indexer.slot_for_instant(timestamp).ok_or(RvolError::OutsideSession)?;
        let volume_today = self.today.get(symbol, slot).accumulated_volume;
        if volume_today == 0 {
            return Err(RvolError::NoTodayData);
        }

        let average = self
            .historical
            .lookup(symbol, slot, self.settings.lookback_days)
            .await?;
        Self::ratio(symbol, slot, volume_today, average)
    }

    pub async fn evaluate_direct(
        &self,
        symbol: &str,
        volume_today: u64,
        timestamp: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<RvolResult, RvolError> {
        let slot = self.indexer.slot_for_instant(timestamp).ok_or(RvolError::OutsideSession)?;
        if volume_today == 0 {
            return Err(RvolError::NoTodayData);
        }

        let historical = self.historical.clone();
        let owned_symbol = symbol.to_string();
        let lookback_days = self.settings.lookback_days;
        // Detached on timeout; a late completion still warms the fast store
        let lookup = tokio::spawn(async move { historical.lookup(&owned_symbol, slot, lookback_days).await });

        let average = match tokio::time::timeout(timeout, lookup).await {
            Err(_) => {
                warn!(symbol, slot, ?timeout, "Historical average lookup timed out");
                return Err(RvolError::Timeout(timeout));
            }
            Ok(Err(join_error)) => return Err(RvolError::TransportFailure(join_error.to_string())),
            Ok(Ok(lookup)) => lookup?,
        };
        Self::ratio(symbol, slot, volume_today, average)
    }

    fn ratio(symbol: &str, slot: Slot, volume_today: u64, historical_average: f64) -> Result<RvolResult, RvolError> {
        if historical_average <= 0.0 {
            return Err(RvolError::NoHistoricalData);
        }
        Ok(RvolResult {
            symbol: symbol.to_string(),
            slot,
            volume_today,
            historical_average,
            ratio: volume_today as f64 / historical_average,
        })
    }
}
