use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::common::constants::{historical_average_key, DEFAULT_AVERAGE_TTL_SECONDS};
use crate::session::Slot;

use super::client::{BulkPrecomputeClient, PrecomputeRequest};
use super::errors::{HistoricalError, StoreError};
use super::fast_store::FastStore;
use super::filter::InstrumentFilter;

/// Historical average lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalStoreConfig {
    /// After a successful bulk call for a (symbol, lookback), further misses for that key do not
    /// trigger another call until this long has passed. Slots the precompute omitted stay misses.
    pub retrigger_cooldown_seconds: u64,
}

impl Default for HistoricalStoreConfig {
    fn default() -> Self {
        Self {
            retrigger_cooldown_seconds: DEFAULT_AVERAGE_TTL_SECONDS,
        }
    }
}

/// Snapshot of lookup counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub filtered: u64,
    pub bulk_calls: u64,
    pub bulk_failures: u64,
}

#[derive(Default)]
struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    filtered: AtomicU64,
    bulk_calls: AtomicU64,
    bulk_failures: AtomicU64,
}

/// Outcome of the last bulk call for one (symbol, lookback)
#[derive(Debug, Clone, Copy, Default)]
enum TriggerState {
    #[default]
    Idle,
    Succeeded(Instant),
    Failed(Instant),
}

type TriggerSlot = Arc<AsyncMutex<TriggerState>>;

/// Two-tier historical average store
///
/// Checks the fast store, and on a miss triggers one bulk precompute for the whole symbol and
/// re-reads once. Concurrent misses for the same key wait on a shared per-key lock, so a burst
/// of slot queries for one symbol issues a single bulk call.
pub struct HistoricalAverageStore {
    fast_store: Arc<dyn FastStore>,
    client: Arc<dyn BulkPrecomputeClient>,
    filter: InstrumentFilter,
    max_slot: Slot,
    retrigger_cooldown: Duration,
    triggers: DashMap<String, TriggerSlot>,
    counters: StoreCounters,
}

impl HistoricalAverageStore {
    pub fn new(
        fast_store: Arc<dyn FastStore>,
        client: Arc<dyn BulkPrecomputeClient>,
        filter: InstrumentFilter,
        max_slot: Slot,
        config: &HistoricalStoreConfig,
    ) -> Self {
        Self {
            fast_store,
            client,
            filter,
            max_slot,
            retrigger_cooldown: Duration::from_secs(config.retrigger_cooldown_seconds),
            triggers: DashMap::new(),
            counters: StoreCounters::default(),
        }
    }

    pub fn fast_store(&self) -> &Arc<dyn FastStore> {
        &self.fast_store
    }

    /// Average historical accumulated volume, or `None` for any failure
    pub async fn get_average(&self, symbol: &str, slot: Slot, lookback_days: u32) -> Option<f64> {
        match self.lookup(symbol, slot, lookback_days).await {
            Ok(average) => Some(average),
            Err(HistoricalError::Filtered(_)) | Err(HistoricalError::NotFound { .. }) => None,
            Err(e) => {
                warn!(symbol, slot, "Historical average unavailable: {}", e);
                None
            }
        }
    }

    /// Check, else trigger-and-retry-once
    pub async fn lookup(&self, symbol: &str, slot: Slot, lookback_days: u32) -> Result<f64, HistoricalError> {
        if self.filter.is_unreliable(symbol) {
            self.counters.filtered.fetch_add(1, Ordering::Relaxed);
            return Err(HistoricalError::Filtered(symbol.to_string()));
        }

        let key = historical_average_key(symbol, lookback_days);
        let field = slot.to_string();

        if let Some(average) = self.read_average(&key, &field).await? {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(average);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let trigger = self.triggers.entry(key.clone()).or_default().clone();
        let waited_from = Instant::now();
        let mut state = match trigger.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Someone else is precomputing this symbol; their write may satisfy us
                let guard = trigger.lock().await;
                if let Some(average) = self.read_average(&key, &field).await? {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(average);
                }
                if let TriggerState::Failed(at) = *guard {
                    if at >= waited_from {
                        debug!(symbol, slot, "Bulk call failed while waiting, not retrying");
                        return Err(HistoricalError::PrecomputeFailed(symbol.to_string()));
                    }
                }
                guard
            }
        };

        if let TriggerState::Succeeded(at) = *state {
            if at.elapsed() < self.retrigger_cooldown {
                debug!(symbol, slot, "Slot absent from fresh precompute, not re-triggering");
                return Err(HistoricalError::NotFound { symbol: symbol.to_string(), slot });
            }
        }

        let request = PrecomputeRequest {
            symbol: symbol.to_string(),
            lookback_days,
            max_slot: self.max_slot,
        };
        self.counters.bulk_calls.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.client.request_precompute(&request).await {
            self.counters.bulk_failures.fetch_add(1, Ordering::Relaxed);
            *state = TriggerState::Failed(Instant::now());
            return Err(e.into());
        }
        *state = TriggerState::Succeeded(Instant::now());
        drop(state);

        match self.read_average(&key, &field).await? {
            Some(average) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(average)
            }
            None => Err(HistoricalError::NotFound { symbol: symbol.to_string(), slot }),
        }
    }

    /// Fast store read; unparseable or negative values count as absent
    async fn read_average(&self, key: &str, field: &str) -> Result<Option<f64>, StoreError> {
        let raw = self.fast_store.hget(key, field).await?;
        Ok(raw.and_then(|value| {
            value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|average| average.is_finite() && *average >= 0.0)
        }))
    }

    /// Drop idle trigger entries whose outcome no longer affects lookups
    pub fn prune_triggers(&self) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|_, trigger| match trigger.try_lock() {
            Ok(state) => match *state {
                TriggerState::Succeeded(at) => at.elapsed() < self.retrigger_cooldown,
                TriggerState::Idle | TriggerState::Failed(_) => false,
            },
            Err(_) => true,
        });
        before - self.triggers.len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            bulk_calls: self.counters.bulk_calls.load(Ordering::Relaxed),
            bulk_failures: self.counters.bulk_failures.load(Ordering::Relaxed),
        }
    }
}
