use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::common::constants::historical_average_key;
use crate::historical::FastStore;
use crate::session::Slot;

use super::calculator::compute_slot_averages;
use super::errors::PrecomputeError;
use super::source::VolumeSource;

/// Outcome of one symbol's precompute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecomputeSummary {
    pub symbol: String,
    pub lookback_days: u32,
    pub days_used: usize,
    pub slots_written: usize,
}

/// Builds a symbol's full slot→average mapping and writes it to the fast store in one batch
pub struct HistoricalAveragePrecomputer {
    source: Arc<dyn VolumeSource>,
    fast_store: Arc<dyn FastStore>,
    timezone: Tz,
    session_max_slot: Slot,
    ttl: Duration,
}

impl HistoricalAveragePrecomputer {
    /// `session_max_slot` is the last slot of the configured session; requests beyond it are rejected
    pub fn new(
        source: Arc<dyn VolumeSource>,
        fast_store: Arc<dyn FastStore>,
        timezone: Tz,
        session_max_slot: Slot,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            fast_store,
            timezone,
            session_max_slot,
            ttl,
        }
    }

    pub fn source(&self) -> &Arc<dyn VolumeSource> {
        &self.source
    }

    /// Current date in the exchange timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Precompute from the trading days before today
    pub async fn precompute(
        &self,
        symbol: &str,
        lookback_days: u32,
        max_slot: Slot,
    ) -> Result<PrecomputeSummary, PrecomputeError> {
        self.precompute_as_of(symbol, lookback_days, max_slot, self.today()).await
    }

    /// Precompute from the trading days strictly before `before`
    pub async fn precompute_as_of(
        &self,
        symbol: &str,
        lookback_days: u32,
        max_slot: Slot,
        before: NaiveDate,
    ) -> Result<PrecomputeSummary, PrecomputeError> {
        if symbol.trim().is_empty() {
            return Err(PrecomputeError::InvalidRequest("symbol is empty".to_string()));
        }
        if lookback_days == 0 {
            return Err(PrecomputeError::InvalidRequest("lookback_days must be positive".to_string()));
        }
        if max_slot > self.session_max_slot {
            return Err(PrecomputeError::InvalidRequest(format!(
                "max_slot {} exceeds session max slot {}",
                max_slot, self.session_max_slot
            )));
        }

        let days = self.source.recent_days(symbol, lookback_days, before, max_slot).await?;
        let averages = compute_slot_averages(&days, max_slot);

        let summary = PrecomputeSummary {
            symbol: symbol.to_string(),
            lookback_days,
            days_used: days.len(),
            slots_written: averages.len(),
        };

        if averages.is_empty() {
            debug!(symbol, lookback_days, "No history to precompute");
            return Ok(summary);
        }

        let fields = averages
            .into_iter()
            .map(|(slot, average)| (slot.to_string(), average.to_string()))
            .collect();
        self.fast_store
            .hset_all(&historical_average_key(symbol, lookback_days), fields, self.ttl)
            .await?;

        info!(
            symbol,
            lookback_days,
            days_used = summary.days_used,
            slots_written = summary.slots_written,
            "📊 Precomputed historical averages"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::fast_store::{MemoryFastStore, MockFastStore};
    use crate::precompute::calculator::DayRecordings;
    use crate::precompute::source::{MemoryVolumeSource, MockVolumeSource};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn precomputer(source: Arc<dyn VolumeSource>, store: Arc<dyn FastStore>) -> HistoricalAveragePrecomputer {
        HistoricalAveragePrecomputer::new(source, store, chrono_tz::America::New_York, 191, Duration::from_secs(28_800))
    }

    #[tokio::test]
    async fn test_precompute_writes_filled_averages() {
        let source = Arc::new(MemoryVolumeSource::new());
        source.record_day("AAPL", DayRecordings::with_slots(date(4), [(0, 100), (1, 200), (2, 300)]));
        source.record_day("AAPL", DayRecordings::with_slots(date(5), [(0, 150), (1, 250)]));
        source.record_day("AAPL", DayRecordings::with_slots(date(6), [(0, 120), (2, 310)]));
        // today's partial data must not be used
        source.record_day("AAPL", DayRecordings::with_slots(date(7), [(0, 9_999_999)]));
        let store = Arc::new(MemoryFastStore::new());

        let summary = precomputer(source, store.clone())
            .precompute_as_of("AAPL", 10, 2, date(7))
            .await
            .unwrap();

        assert_eq!(summary.days_used, 3);
        assert_eq!(summary.slots_written, 3);

        let hash = store.hgetall("historical-average:AAPL:10").await.unwrap().unwrap();
        assert_eq!(hash.len(), 3);
        let slot1: f64 = hash["1"].parse().unwrap();
        assert!((slot1 - 190.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_history_writes_nothing() {
        let mut source = MockVolumeSource::new();
        source.expect_recent_days().times(1).returning(|_, _, _, _| Ok(Vec::new()));
        let mut store = MockFastStore::new();
        store.expect_hset_all().times(0);

        let summary = precomputer(Arc::new(source), Arc::new(store))
            .precompute_as_of("NEWCO", 10, 191, date(7))
            .await
            .unwrap();
        assert_eq!(summary.slots_written, 0);
    }

    #[tokio::test]
    async fn test_single_batch_write_with_ttl() {
        let source = Arc::new(MemoryVolumeSource::new());
        source.record("MSFT", date(4), 0, 10);
        let mut store = MockFastStore::new();
        store
            .expect_hset_all()
            .times(1)
            .withf(|key, fields, ttl| {
                key == "historical-average:MSFT:5" && fields.len() == 192 && *ttl == Duration::from_secs(28_800)
            })
            .returning(|_, _, _| Ok(()));

        precomputer(source, Arc::new(store))
            .precompute_as_of("MSFT", 5, 191, date(7))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_requests_rejected() {
        let p = precomputer(Arc::new(MemoryVolumeSource::new()), Arc::new(MemoryFastStore::new()));
        assert!(matches!(
            p.precompute_as_of("", 10, 191, date(7)).await,
            Err(PrecomputeError::InvalidRequest(_))
        ));
        assert!(matches!(
            p.precompute_as_of("AAPL", 0, 191, date(7)).await,
            Err(PrecomputeError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_max_slot_beyond_session_rejected_before_reading() {
        let mut source = MockVolumeSource::new();
        source.expect_recent_days().times(0);
        let mut store = MockFastStore::new();
        store.expect_hset_all().times(0);
        let p = precomputer(Arc::new(source), Arc::new(store));

        for max_slot in [192, 1 << 34, Slot::MAX] {
            assert!(matches!(
                p.precompute_as_of("AAPL", 10, max_slot, date(7)).await,
                Err(PrecomputeError::InvalidRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let mut source = MockVolumeSource::new();
        source
            .expect_recent_days()
            .returning(|_, _, _, _| Err(PrecomputeError::Source("connection reset".to_string())));
        let p = precomputer(Arc::new(source), Arc::new(MemoryFastStore::new()));

        assert!(matches!(
            p.precompute_as_of("AAPL", 10, 191, date(7)).await,
            Err(PrecomputeError::Source(_))
        ));
    }
}
