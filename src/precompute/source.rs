use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::session::Slot;

use super::calculator::DayRecordings;
use super::errors::PrecomputeError;

/// Persisted per-slot accumulated volume history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VolumeSource: Send + Sync {
    /// The `lookback_days` most recent days strictly before `before` that have any recording
    /// at or below `max_slot`, oldest first, with raw (unfilled) recordings
    async fn recent_days(
        &self,
        symbol: &str,
        lookback_days: u32,
        before: NaiveDate,
        max_slot: Slot,
    ) -> Result<Vec<DayRecordings>, PrecomputeError>;

    /// Symbols with any recording on or after `since`
    async fn active_symbols(&self, since: NaiveDate) -> Result<Vec<String>, PrecomputeError>;
}

/// In-memory volume history
#[derive(Default)]
pub struct MemoryVolumeSource {
    recordings: RwLock<HashMap<String, BTreeMap<NaiveDate, BTreeMap<Slot, u64>>>>,
}

impl MemoryVolumeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, symbol: &str, date: NaiveDate, slot: Slot, accumulated_volume: u64) {
        let mut recordings = self.recordings.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        recordings
            .entry(symbol.to_string())
            .or_default()
            .entry(date)
            .or_default()
            .insert(slot, accumulated_volume);
    }

    pub fn record_day(&self, symbol: &str, day: DayRecordings) {
        for (slot, volume) in day.slots {
            self.record(symbol, day.date, slot, volume);
        }
    }
}

#[async_trait]
impl VolumeSource for MemoryVolumeSource {
    async fn recent_days(
        &self,
        symbol: &str,
        lookback_days: u32,
        before: NaiveDate,
        max_slot: Slot,
    ) -> Result<Vec<DayRecordings>, PrecomputeError> {
        let recordings = self.recordings.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(days) = recordings.get(symbol) else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<DayRecordings> = days
            .range(..before)
            .rev()
            .filter_map(|(date, slots)| {
                let slots: BTreeMap<Slot, u64> = slots.range(..=max_slot).map(|(s, v)| (*s, *v)).collect();
                (!slots.is_empty()).then(|| DayRecordings { date: *date, slots })
            })
            .take(lookback_days as usize)
            .collect();
        selected.reverse();
        Ok(selected)
    }

    async fn active_symbols(&self, since: NaiveDate) -> Result<Vec<String>, PrecomputeError> {
        let recordings = self.recordings.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let symbols: BTreeSet<String> = recordings
            .iter()
            .filter(|(_, days)| days.range(since..).next().is_some())
            .map(|(symbol, _)| symbol.clone())
            .collect();
        Ok(symbols.into_iter().collect())
    }
}
